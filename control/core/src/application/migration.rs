// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Migration Orchestrator Application Service
//!
//! Executes multi-phase migration plans between two modules of the same
//! capability type, sequencing lifecycle operations and feature flag
//! updates over time. Execution runs as a cancellable background task:
//! phase durations can be hours, and an operator abort must interrupt the
//! inter-phase sleep instead of being ignored until the next phase.

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::flags::FeatureFlagService;
use crate::application::lifecycle::LifecycleController;
use crate::application::registry::ModuleRegistry;
use crate::domain::errors::ControlError;
use crate::domain::events::MigrationEvent;
use crate::domain::migration::{
    MigrationPhase, MigrationPlan, MigrationStatus, MigrationStrategy, PlanId,
};
use crate::domain::repository::MigrationRepository;
use crate::infrastructure::event_bus::EventBus;

/// Operator request for a new migration plan. The strategy arrives as a
/// string from the admin surface and is validated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMigrationPlan {
    pub name: String,
    pub from_module: String,
    pub to_module: String,
    pub strategy: String,
    pub phases: Vec<NewMigrationPhase>,
    #[serde(default = "default_true")]
    pub can_rollback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMigrationPhase {
    pub name: String,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    #[serde(default)]
    pub rollout_percentage: u8,
}

fn default_true() -> bool {
    true
}

#[derive(Clone)]
pub struct MigrationOrchestrator {
    repository: Arc<dyn MigrationRepository>,
    registry: Arc<ModuleRegistry>,
    lifecycle: Arc<LifecycleController>,
    flags: Arc<FeatureFlagService>,
    event_bus: Arc<EventBus>,
    /// Cancellation tokens for in-flight executions, keyed by plan.
    executions: Arc<DashMap<PlanId, CancellationToken>>,
}

impl MigrationOrchestrator {
    pub fn new(
        repository: Arc<dyn MigrationRepository>,
        registry: Arc<ModuleRegistry>,
        lifecycle: Arc<LifecycleController>,
        flags: Arc<FeatureFlagService>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            repository,
            registry,
            lifecycle,
            flags,
            event_bus,
            executions: Arc::new(DashMap::new()),
        }
    }

    /// Validate and store a plan in `planned` status.
    pub async fn create_plan(&self, request: NewMigrationPlan) -> Result<MigrationPlan, ControlError> {
        let strategy: MigrationStrategy = request
            .strategy
            .parse()
            .map_err(|_| ControlError::InvalidStrategy(request.strategy.clone()))?;

        let from_id = crate::domain::module::ModuleId::new(request.from_module.clone());
        let to_id = crate::domain::module::ModuleId::new(request.to_module.clone());
        let from = self.registry.get(&from_id).await?;
        let to = self.registry.get(&to_id).await?;

        if from.module_type != to.module_type {
            return Err(ControlError::TypeMismatch {
                old: from.id,
                old_type: from.module_type,
                new: to.id,
                new_type: to.module_type,
            });
        }

        let phases = request
            .phases
            .into_iter()
            .map(|p| MigrationPhase::new(p.name, p.duration, p.rollout_percentage))
            .collect();

        let plan = MigrationPlan::new(
            request.name,
            from.id.clone(),
            to.id.clone(),
            strategy,
            phases,
            request.can_rollback,
        );
        self.repository.save(&plan).await?;

        info!(plan = %plan.id, from = %from.id, to = %to.id, strategy = %strategy, "migration plan created");
        self.event_bus.publish_migration_event(MigrationEvent::PlanCreated {
            plan_id: plan.id,
            from_module: plan.from_module.clone(),
            to_module: plan.to_module.clone(),
            strategy,
            created_at: plan.created_at,
        });

        Ok(plan)
    }

    pub async fn get_plan(&self, id: PlanId) -> Result<MigrationPlan, ControlError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(ControlError::PlanNotFound(id))
    }

    pub async fn list_plans(&self) -> Result<Vec<MigrationPlan>, ControlError> {
        Ok(self.repository.list_all().await?)
    }

    /// Start executing a planned migration as a background task.
    ///
    /// Returns the join handle of the execution task; administrative
    /// callers normally discard it and observe progress through events and
    /// `get_plan`.
    pub async fn execute(&self, id: PlanId) -> Result<JoinHandle<()>, ControlError> {
        let mut plan = self.get_plan(id).await?;
        if plan.status != MigrationStatus::Planned {
            return Err(ControlError::PlanNotExecutable { plan: id, status: plan.status });
        }

        plan.start(Utc::now());
        self.repository.save(&plan).await?;

        let cancel = CancellationToken::new();
        self.executions.insert(id, cancel.clone());
        metrics::counter!("control_migrations_started_total").increment(1);

        let orchestrator = self.clone();
        let handle = tokio::spawn(async move {
            orchestrator.run(id, cancel).await;
            orchestrator.executions.remove(&id);
        });
        Ok(handle)
    }

    /// Cancel an in-flight execution. The execution task observes the
    /// token, transitions the plan to `failed`, and applies the usual
    /// automatic-rollback policy.
    pub async fn abort(&self, id: PlanId) -> Result<(), ControlError> {
        let plan = self.get_plan(id).await?;
        match self.executions.get(&id) {
            Some(entry) => {
                warn!(plan = %id, "migration abort requested");
                entry.value().cancel();
                Ok(())
            }
            None => Err(ControlError::PlanNotExecutable { plan: id, status: plan.status }),
        }
    }

    /// Roll a plan back by hot-swapping in the inverse direction.
    ///
    /// Idempotent: rolling back an already rolled-back plan is a no-op so
    /// retry-driven operator tooling can call it safely.
    pub async fn rollback(&self, id: PlanId) -> Result<MigrationPlan, ControlError> {
        let plan = self.get_plan(id).await?;
        if plan.status == MigrationStatus::RolledBack {
            return Ok(plan);
        }
        if !plan.can_rollback {
            return Err(ControlError::NotRollbackable(id));
        }
        self.rollback_inner(plan).await
    }

    async fn rollback_inner(&self, mut plan: MigrationPlan) -> Result<MigrationPlan, ControlError> {
        self.lifecycle.hot_swap(&plan.to_module, &plan.from_module).await?;

        plan.mark_rolled_back();
        self.repository.save(&plan).await?;

        info!(plan = %plan.id, "migration rolled back");
        metrics::counter!("control_migrations_rolled_back_total").increment(1);
        self.event_bus.publish_migration_event(MigrationEvent::MigrationRolledBack {
            plan_id: plan.id,
            rolled_back_at: Utc::now(),
        });

        Ok(plan)
    }

    /// Phase loop. Phases run strictly in declared order; each phase is
    /// dispatched, marked completed, then slept out before the next phase
    /// starts. The sleep races against the cancellation token.
    async fn run(&self, id: PlanId, cancel: CancellationToken) {
        loop {
            let plan = match self.get_plan(id).await {
                Ok(plan) => plan,
                Err(e) => {
                    error!(plan = %id, "migration execution halted: {}", e);
                    return;
                }
            };

            let Some(index) = plan.next_phase() else {
                self.finish(plan).await;
                return;
            };

            if cancel.is_cancelled() {
                self.fail(plan, "aborted by operator").await;
                return;
            }

            let phase = plan.phases[index].clone();
            info!(plan = %id, phase = %phase.name, index, "migration phase started");
            self.event_bus.publish_migration_event(MigrationEvent::PhaseStarted {
                plan_id: id,
                phase_index: index,
                phase_name: phase.name.clone(),
                started_at: Utc::now(),
            });

            if let Err(e) = self.dispatch_phase(&plan, index).await {
                self.fail(plan, e.to_string()).await;
                return;
            }

            let mut plan = match self.get_plan(id).await {
                Ok(plan) => plan,
                Err(e) => {
                    error!(plan = %id, "migration execution halted: {}", e);
                    return;
                }
            };
            plan.phases[index].completed = true;
            if let Err(e) = self.repository.save(&plan).await {
                self.fail(plan, e.to_string()).await;
                return;
            }

            info!(plan = %id, phase = %phase.name, index, "migration phase completed");
            self.event_bus.publish_migration_event(MigrationEvent::PhaseCompleted {
                plan_id: id,
                phase_index: index,
                phase_name: phase.name.clone(),
                completed_at: Utc::now(),
            });

            // Hold the phase open for its declared duration, unless this
            // was the final phase. The only wall-clock wait in the
            // orchestrator, and it must stay interruptible.
            if index + 1 < plan.phases.len() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        self.fail(plan, "aborted by operator").await;
                        return;
                    }
                    _ = tokio::time::sleep(phase.duration) => {}
                }
            }
        }
    }

    /// Strategy-specific step for one phase.
    async fn dispatch_phase(&self, plan: &MigrationPlan, index: usize) -> Result<(), ControlError> {
        let phase = &plan.phases[index];
        match plan.strategy {
            MigrationStrategy::Canary => {
                // Traffic selection consults this flag elsewhere; the
                // orchestrator only moves the plan-scoped percentage.
                self.flags
                    .upsert_percentage(
                        &plan.scoped_flag_id(),
                        &format!("Migration {} - {}", plan.name, phase.name),
                        phase.rollout_percentage,
                        [
                            ("migration_id".to_string(), serde_json::json!(plan.id.to_string())),
                            ("phase".to_string(), serde_json::json!(phase.name)),
                        ],
                    )
                    .await?;
                Ok(())
            }
            MigrationStrategy::BlueGreen => {
                self.lifecycle.hot_swap(&plan.from_module, &plan.to_module).await
            }
            MigrationStrategy::Rolling => {
                self.lifecycle.activate(&plan.to_module).await.map(|_| ())
            }
            MigrationStrategy::BigBang => {
                // One immediate swap; any further declared phases are
                // pauses, not repeated swaps.
                if index == 0 {
                    self.lifecycle.hot_swap(&plan.from_module, &plan.to_module).await
                } else {
                    Ok(())
                }
            }
        }
    }

    async fn finish(&self, mut plan: MigrationPlan) {
        plan.complete(Utc::now());
        if let Err(e) = self.repository.save(&plan).await {
            error!(plan = %plan.id, "failed to persist completed migration: {}", e);
            return;
        }

        info!(plan = %plan.id, "migration completed");
        metrics::counter!("control_migrations_completed_total").increment(1);
        self.event_bus.publish_migration_event(MigrationEvent::MigrationCompleted {
            plan_id: plan.id,
            completed_at: Utc::now(),
        });
    }

    /// Transition to `failed`, record the error, and attempt the automatic
    /// rollback when the plan allows it. Never silently swallowed: the
    /// failure is persisted and published even when rollback succeeds.
    async fn fail(&self, mut plan: MigrationPlan, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(plan = %plan.id, "migration failed: {}", reason);
        metrics::counter!("control_migrations_failed_total").increment(1);

        plan.fail(reason.clone());
        if let Err(e) = self.repository.save(&plan).await {
            error!(plan = %plan.id, "failed to persist failed migration: {}", e);
        }
        self.event_bus.publish_migration_event(MigrationEvent::MigrationFailed {
            plan_id: plan.id,
            error: reason,
            failed_at: Utc::now(),
        });

        if plan.can_rollback {
            if let Err(e) = self.rollback_inner(plan).await {
                error!("automatic rollback failed: {}", e);
            }
        }
    }
}
