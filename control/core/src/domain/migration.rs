// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Migration plan aggregate: an ordered, strategy-tagged sequence of phases
//! moving activation from one module to another of the same type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::module::ModuleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(pub Uuid);

impl PlanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStrategy {
    /// Progressive traffic shift driven by a plan-scoped feature flag.
    Canary,
    /// Single full hot-swap after the new module is reachable.
    BlueGreen,
    /// Activate the target while the source drains.
    Rolling,
    /// One immediate swap; extra declared phases are pauses only.
    BigBang,
}

impl MigrationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStrategy::Canary => "canary",
            MigrationStrategy::BlueGreen => "blue_green",
            MigrationStrategy::Rolling => "rolling",
            MigrationStrategy::BigBang => "big_bang",
        }
    }
}

impl std::str::FromStr for MigrationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "canary" => Ok(MigrationStrategy::Canary),
            "blue_green" => Ok(MigrationStrategy::BlueGreen),
            "rolling" => Ok(MigrationStrategy::Rolling),
            "big_bang" => Ok(MigrationStrategy::BigBang),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for MigrationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Planned,
    InProgress,
    Completed,
    Failed,
    RolledBack,
}

impl MigrationStatus {
    /// Terminal states accept no further phase execution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationStatus::Completed | MigrationStatus::RolledBack)
    }
}

/// One step of a migration plan. Phases run strictly in declared order; a
/// phase is marked completed before the plan sleeps out its duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationPhase {
    pub name: String,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub rollout_percentage: u8,
    #[serde(default)]
    pub completed: bool,
}

impl MigrationPhase {
    pub fn new(name: impl Into<String>, duration: Duration, rollout_percentage: u8) -> Self {
        Self {
            name: name.into(),
            duration,
            rollout_percentage: rollout_percentage.min(100),
            completed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub id: PlanId,
    pub name: String,
    pub from_module: ModuleId,
    pub to_module: ModuleId,
    pub strategy: MigrationStrategy,
    pub phases: Vec<MigrationPhase>,
    pub status: MigrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub can_rollback: bool,
    /// Last phase error, recorded when the plan transitions to `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MigrationPlan {
    pub fn new(
        name: impl Into<String>,
        from_module: ModuleId,
        to_module: ModuleId,
        strategy: MigrationStrategy,
        phases: Vec<MigrationPhase>,
        can_rollback: bool,
    ) -> Self {
        Self {
            id: PlanId::new(),
            name: name.into(),
            from_module,
            to_module,
            strategy,
            phases,
            status: MigrationStatus::Planned,
            started_at: None,
            completed_at: None,
            can_rollback,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Id of the feature flag the orchestrator manages for this plan.
    /// Scoped to the plan (not the phase) so canary phases update one flag
    /// in place rather than accumulating a flag per phase.
    pub fn scoped_flag_id(&self) -> String {
        format!("migration-{}", self.id)
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = MigrationStatus::InProgress;
        self.started_at = Some(now);
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = MigrationStatus::Completed;
        self.completed_at = Some(now);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = MigrationStatus::Failed;
        self.error = Some(error.into());
    }

    pub fn mark_rolled_back(&mut self) {
        self.status = MigrationStatus::RolledBack;
    }

    /// Index of the first incomplete phase, if any.
    pub fn next_phase(&self) -> Option<usize> {
        self.phases.iter().position(|p| !p.completed)
    }
}
