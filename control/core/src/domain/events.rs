// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events emitted by the control plane.
//!
//! Every state transition the engine performs is published to the event bus
//! for external observability collaborators. The engine keeps no audit log
//! of its own; these events are the audit surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::migration::{MigrationStrategy, PlanId};
use crate::domain::module::{ModuleId, ModuleType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModuleEvent {
    ModuleRegistered {
        module_id: ModuleId,
        module_type: ModuleType,
        version: String,
        registered_at: DateTime<Utc>,
    },
    ModuleActivated {
        module_id: ModuleId,
        module_type: ModuleType,
        activated_at: DateTime<Utc>,
    },
    ModuleDeactivated {
        module_id: ModuleId,
        module_type: ModuleType,
        deactivated_at: DateTime<Utc>,
    },
    ModuleSwapped {
        old_module_id: ModuleId,
        new_module_id: ModuleId,
        module_type: ModuleType,
        swapped_at: DateTime<Utc>,
    },
    /// The post-warm-up deactivation of the old module failed. Both modules
    /// are left active and operator attention is required.
    SwapDegraded {
        old_module_id: ModuleId,
        new_module_id: ModuleId,
        module_type: ModuleType,
        error: String,
        degraded_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HealthEvent {
    CheckFailed {
        module_id: ModuleId,
        module_type: ModuleType,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    BackupActivated {
        failed_module_id: ModuleId,
        backup_module_id: ModuleId,
        module_type: ModuleType,
        activated_at: DateTime<Utc>,
    },
    /// Alert condition: a type lost its active module and no inactive
    /// backup exists. Recovery waits for operator action.
    NoBackupAvailable {
        failed_module_id: ModuleId,
        module_type: ModuleType,
        raised_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FlagEvent {
    FlagCreated {
        flag_id: String,
        enabled: bool,
        rollout_percentage: u8,
        created_at: DateTime<Utc>,
    },
    FlagUpdated {
        flag_id: String,
        enabled: bool,
        rollout_percentage: u8,
        updated_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MigrationEvent {
    PlanCreated {
        plan_id: PlanId,
        from_module: ModuleId,
        to_module: ModuleId,
        strategy: MigrationStrategy,
        created_at: DateTime<Utc>,
    },
    PhaseStarted {
        plan_id: PlanId,
        phase_index: usize,
        phase_name: String,
        started_at: DateTime<Utc>,
    },
    PhaseCompleted {
        plan_id: PlanId,
        phase_index: usize,
        phase_name: String,
        completed_at: DateTime<Utc>,
    },
    MigrationCompleted {
        plan_id: PlanId,
        completed_at: DateTime<Utc>,
    },
    MigrationFailed {
        plan_id: PlanId,
        error: String,
        failed_at: DateTime<Utc>,
    },
    MigrationRolledBack {
        plan_id: PlanId,
        rolled_back_at: DateTime<Utc>,
    },
}
