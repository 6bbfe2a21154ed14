// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::module::Module;

/// Outcome of one health probe against one module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub healthy: bool,
    pub details: String,
}

impl ProbeReport {
    pub fn healthy(details: impl Into<String>) -> Self {
        Self { healthy: true, details: details.into() }
    }

    pub fn unhealthy(details: impl Into<String>) -> Self {
        Self { healthy: false, details: details.into() }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe transport failed: {0}")]
    Transport(String),
    #[error("module exposes no health endpoint")]
    NoEndpoint,
}

/// External collaborator that checks whether a module is serving.
///
/// Implementations must complete promptly; the supervisor additionally
/// bounds every call with its configured timeout, and a timeout is treated
/// the same as an unhealthy report.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, module: &Module) -> Result<ProbeReport, ProbeError>;
}
