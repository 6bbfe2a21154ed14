// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Health probe implementations.
//!
//! `HttpHealthProbe` is the production probe: a GET against the module's
//! declared health endpoint. `StaticHealthProbe` returns fixed verdicts for
//! development and tests. The supervisor owns the timeout; probes here only
//! report transport-level reality.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;

use crate::domain::module::Module;
use crate::domain::probe::{HealthProbe, ProbeError, ProbeReport};

pub struct HttpHealthProbe {
    client: reqwest::Client,
}

impl HttpHealthProbe {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpHealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self, module: &Module) -> Result<ProbeReport, ProbeError> {
        let url = module.health_check_url.as_deref().ok_or(ProbeError::NoEndpoint)?;

        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    Ok(ProbeReport::healthy(format!("HTTP {}", status.as_u16())))
                } else {
                    Ok(ProbeReport::unhealthy(format!("HTTP {}", status.as_u16())))
                }
            }
            // Connection-level failures are an unhealthy verdict, not a
            // probe malfunction: an unreachable module is a failed module.
            Err(e) if e.is_connect() || e.is_timeout() => {
                Ok(ProbeReport::unhealthy(format!("unreachable: {}", e)))
            }
            Err(e) => Err(ProbeError::Transport(e.to_string())),
        }
    }
}

/// Fixed-verdict probe: every module is healthy unless its id has been
/// marked down.
#[derive(Default)]
pub struct StaticHealthProbe {
    down: RwLock<HashSet<String>>,
}

impl StaticHealthProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_down(&self, module_id: &str) {
        self.down.write().insert(module_id.to_string());
    }

    pub fn mark_up(&self, module_id: &str) {
        self.down.write().remove(module_id);
    }
}

#[async_trait]
impl HealthProbe for StaticHealthProbe {
    async fn probe(&self, module: &Module) -> Result<ProbeReport, ProbeError> {
        if self.down.read().contains(module.id.as_str()) {
            Ok(ProbeReport::unhealthy("marked down"))
        } else {
            Ok(ProbeReport::healthy("ok"))
        }
    }
}
