// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lifecycle Controller Application Service
//!
//! Enforces the module state machine and the per-type exclusivity
//! invariant: at most one active module per capability type at any instant,
//! except inside a hot swap's warm-up window.
//!
//! Every mutation of a given type (activate, deactivate, hot swap,
//! health-triggered failover) runs under that type's async lock, so a
//! failover can never interleave with an operator-initiated swap on the
//! same type. Reads go through the registry and never take these locks.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::application::registry::ModuleRegistry;
use crate::domain::errors::ControlError;
use crate::domain::events::ModuleEvent;
use crate::domain::module::{Module, ModuleId, ModuleType};
use crate::infrastructure::event_bus::EventBus;

pub struct LifecycleController {
    registry: Arc<ModuleRegistry>,
    event_bus: Arc<EventBus>,
    /// Both-modules-reachable window during a hot swap.
    warm_up: Duration,
    type_locks: DashMap<ModuleType, Arc<Mutex<()>>>,
}

impl LifecycleController {
    pub fn new(registry: Arc<ModuleRegistry>, event_bus: Arc<EventBus>, warm_up: Duration) -> Self {
        Self {
            registry,
            event_bus,
            warm_up,
            type_locks: DashMap::new(),
        }
    }

    fn type_lock(&self, module_type: ModuleType) -> Arc<Mutex<()>> {
        self.type_locks
            .entry(module_type)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Activate a module, displacing the currently active module of the
    /// same type (deactivated first, so both are never active together).
    ///
    /// Fails with `DependencyNotActive` unless every declared dependency is
    /// itself active; any failure aborts with no partial state change.
    pub async fn activate(&self, id: &ModuleId) -> Result<Module, ControlError> {
        let module = self.registry.get(id).await?;
        let lock = self.type_lock(module.module_type);
        let _guard = lock.lock().await;
        self.activate_locked(id).await
    }

    /// Deactivate a module and clear its type's active pointer if it holds
    /// it.
    pub async fn deactivate(&self, id: &ModuleId) -> Result<Module, ControlError> {
        let module = self.registry.get(id).await?;
        let lock = self.type_lock(module.module_type);
        let _guard = lock.lock().await;
        self.deactivate_locked(id).await
    }

    /// Zero-downtime replacement of `old_id` by `new_id` (same type).
    ///
    /// Ordering guarantee: the new module is activated *before* the old one
    /// is deactivated, with a warm-up sleep in between during which both
    /// are reachable. A failure in the post-warm-up deactivation leaves
    /// both modules active — a degraded state surfaced to the operator, not
    /// retried.
    pub async fn hot_swap(&self, old_id: &ModuleId, new_id: &ModuleId) -> Result<(), ControlError> {
        let old = self.registry.get(old_id).await?;
        let new = self.registry.get(new_id).await?;

        if old.module_type != new.module_type {
            return Err(ControlError::TypeMismatch {
                old: old.id,
                old_type: old.module_type,
                new: new.id,
                new_type: new.module_type,
            });
        }

        // Swapping a module for itself has nothing to do; running the
        // sequence would deactivate the module it just activated.
        if old_id == new_id {
            return Ok(());
        }

        let module_type = old.module_type;
        let lock = self.type_lock(module_type);
        let _guard = lock.lock().await;

        // Bring the new module up while the old one keeps serving. This is
        // the one sanctioned exception to the exclusivity invariant.
        self.activate_both_reachable(new_id).await?;

        tokio::time::sleep(self.warm_up).await;

        if let Err(e) = self.deactivate_locked(old_id).await {
            warn!(
                old = %old_id, new = %new_id,
                "hot swap degraded: new module active but old module failed to deactivate: {}", e
            );
            self.event_bus.publish_module_event(ModuleEvent::SwapDegraded {
                old_module_id: old_id.clone(),
                new_module_id: new_id.clone(),
                module_type,
                error: e.to_string(),
                degraded_at: Utc::now(),
            });
            return Err(e);
        }

        info!(old = %old_id, new = %new_id, module_type = %module_type, "hot swap completed");
        metrics::counter!("control_hot_swaps_total").increment(1);

        self.event_bus.publish_module_event(ModuleEvent::ModuleSwapped {
            old_module_id: old_id.clone(),
            new_module_id: new_id.clone(),
            module_type,
            swapped_at: Utc::now(),
        });

        Ok(())
    }

    /// Health-triggered failover: mark `failed_id` failed and activate the
    /// backup of the same type with the lowest `installed_at`, if one
    /// exists. Runs as one critical section so an operator operation on the
    /// same type cannot slot in between the two steps.
    pub(crate) async fn fail_over(&self, failed_id: &ModuleId) -> Result<Option<Module>, ControlError> {
        let failed = self.registry.get(failed_id).await?;
        let module_type = failed.module_type;
        let lock = self.type_lock(module_type);
        let _guard = lock.lock().await;

        let mut failed = self.registry.get(failed_id).await?;
        failed.mark_failed(Utc::now());
        self.registry.save(&failed).await?;
        self.registry.clear_active_pointer(module_type, failed_id);
        metrics::counter!("control_failovers_total").increment(1);

        // list_all ordering makes the lowest installed_at the stable
        // tie-break; deprecated and failed modules are never auto-selected.
        let backup = self
            .registry
            .find_by_type(module_type)
            .await?
            .into_iter()
            .find(|m| m.status.can_serve_as_backup());

        match backup {
            Some(candidate) => {
                let activated = self.activate_locked(&candidate.id).await?;
                Ok(Some(activated))
            }
            None => Ok(None),
        }
    }

    /// Activation without displacing the current active module. Hot-swap
    /// internal: leaves the previous module's status untouched while moving
    /// the pointer to the new module.
    async fn activate_both_reachable(&self, id: &ModuleId) -> Result<Module, ControlError> {
        let mut module = self.registry.get(id).await?;
        self.check_dependencies(&module).await?;

        let now = Utc::now();
        module.mark_active(now);
        self.registry.save(&module).await?;
        self.registry.set_active_pointer(module.module_type, module.id.clone());

        info!(module = %module.id, module_type = %module.module_type, "module activated");
        metrics::counter!("control_modules_activated_total").increment(1);

        self.event_bus.publish_module_event(ModuleEvent::ModuleActivated {
            module_id: module.id.clone(),
            module_type: module.module_type,
            activated_at: now,
        });

        Ok(module)
    }

    /// Core activation path. Caller must hold the type lock.
    async fn activate_locked(&self, id: &ModuleId) -> Result<Module, ControlError> {
        let module = self.registry.get(id).await?;
        self.check_dependencies(&module).await?;

        // Displace the current holder first: exclusivity must hold at every
        // observation point of this operation.
        if let Some(current_id) = self.registry.active_id(module.module_type) {
            if current_id != *id {
                self.deactivate_locked(&current_id).await?;
            }
        }

        self.activate_both_reachable(id).await
    }

    /// Core deactivation path. Caller must hold the type lock.
    async fn deactivate_locked(&self, id: &ModuleId) -> Result<Module, ControlError> {
        let mut module = self.registry.get(id).await?;
        let now = Utc::now();
        module.mark_inactive(now);
        self.registry.save(&module).await?;
        self.registry.clear_active_pointer(module.module_type, id);

        info!(module = %module.id, module_type = %module.module_type, "module deactivated");

        self.event_bus.publish_module_event(ModuleEvent::ModuleDeactivated {
            module_id: module.id.clone(),
            module_type: module.module_type,
            deactivated_at: now,
        });

        Ok(module)
    }

    async fn check_dependencies(&self, module: &Module) -> Result<(), ControlError> {
        for dep_id in &module.dependencies {
            let dep_active = self
                .registry
                .get(dep_id)
                .await
                .map(|dep| dep.is_active())
                .unwrap_or(false);
            if !dep_active {
                return Err(ControlError::DependencyNotActive {
                    module: module.id.clone(),
                    dependency: dep_id.clone(),
                });
            }
        }
        Ok(())
    }
}
