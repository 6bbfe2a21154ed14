// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy for the control plane.
//!
//! Administrative callers get a typed error distinguishable by kind plus a
//! human-readable message. There is no generic retry-later variant: callers
//! re-issue the specific corrective action (activate the dependency first,
//! pick a rollbackable plan, and so on).

use std::time::Duration;
use thiserror::Error;

use crate::domain::migration::PlanId;
use crate::domain::module::{ModuleId, ModuleType};
use crate::domain::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("module not found: {0}")]
    ModuleNotFound(ModuleId),

    #[error("feature flag not found: {0}")]
    FlagNotFound(String),

    #[error("migration plan not found: {0}")]
    PlanNotFound(PlanId),

    #[error("module already registered: {0}")]
    DuplicateModule(ModuleId),

    #[error("cannot activate {module}: dependency {dependency} is not active")]
    DependencyNotActive { module: ModuleId, dependency: ModuleId },

    #[error("modules {old} ({old_type}) and {new} ({new_type}) are not the same capability type")]
    TypeMismatch {
        old: ModuleId,
        old_type: ModuleType,
        new: ModuleId,
        new_type: ModuleType,
    },

    #[error("unknown migration strategy: {0}")]
    InvalidStrategy(String),

    #[error("migration plan {0} cannot be rolled back")]
    NotRollbackable(PlanId),

    #[error("health probe for {module} timed out after {timeout:?}")]
    ProbeTimeout { module: ModuleId, timeout: Duration },

    #[error("migration plan {plan} is not executable from status {status:?}")]
    PlanNotExecutable { plan: PlanId, status: crate::domain::migration::MigrationStatus },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ControlError {
    /// Stable machine-readable discriminator for API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlError::ModuleNotFound(_)
            | ControlError::FlagNotFound(_)
            | ControlError::PlanNotFound(_) => "not_found",
            ControlError::DuplicateModule(_) => "duplicate_module",
            ControlError::DependencyNotActive { .. } => "dependency_not_active",
            ControlError::TypeMismatch { .. } => "type_mismatch",
            ControlError::InvalidStrategy(_) => "invalid_strategy",
            ControlError::NotRollbackable(_) => "not_rollbackable",
            ControlError::ProbeTimeout { .. } => "probe_timeout",
            ControlError::PlanNotExecutable { .. } => "plan_not_executable",
            ControlError::Repository(_) => "repository",
        }
    }
}
