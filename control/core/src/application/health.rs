// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Health Supervisor Application Service
//!
//! Periodic prober for active modules. One shared tick covers every active
//! module regardless of each module's own declared interval (that field is
//! informational metadata); probe failures trigger failover through the
//! lifecycle controller, which serializes against operator-initiated
//! mutations of the same type.
//!
//! Probe failures are expected and handled here, never surfaced to the
//! loop's owner. There are no retries within a tick: a module that stays
//! unhealthy is caught again on the next tick or by operator action.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::lifecycle::LifecycleController;
use crate::application::registry::ModuleRegistry;
use crate::domain::events::HealthEvent;
use crate::domain::module::Module;
use crate::domain::probe::HealthProbe;
use crate::infrastructure::event_bus::EventBus;

pub struct HealthSupervisor {
    registry: Arc<ModuleRegistry>,
    lifecycle: Arc<LifecycleController>,
    probe: Arc<dyn HealthProbe>,
    event_bus: Arc<EventBus>,
    tick_interval: Duration,
    probe_timeout: Duration,
}

impl HealthSupervisor {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        lifecycle: Arc<LifecycleController>,
        probe: Arc<dyn HealthProbe>,
        event_bus: Arc<EventBus>,
        tick_interval: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            lifecycle,
            probe,
            event_bus,
            tick_interval,
            probe_timeout,
        }
    }

    /// Start the supervision loop as a background task. The loop runs until
    /// the token is cancelled; an unexpected error inside a tick is logged
    /// and the loop proceeds to the next tick.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval's first tick fires immediately; supervision starts
            // one full interval after init.
            ticker.tick().await;

            info!(interval = ?self.tick_interval, "health supervisor started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("health supervisor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_tick().await;
                    }
                }
            }
        })
    }

    /// One supervision pass over every active module.
    pub async fn run_tick(&self) {
        let modules = match self.registry.list_all().await {
            Ok(modules) => modules,
            Err(e) => {
                error!("health tick skipped: failed to list modules: {}", e);
                return;
            }
        };

        for module in modules.into_iter().filter(|m| m.is_active()) {
            match self.check_one(&module).await {
                Ok(()) => {}
                Err(reason) => self.handle_failure(&module, &reason).await,
            }
        }
    }

    /// Probe one module, bounded by the configured timeout. A probe that
    /// never returns counts as a failure rather than stalling the tick.
    async fn check_one(&self, module: &Module) -> Result<(), String> {
        let started = tokio::time::Instant::now();
        let outcome = tokio::time::timeout(self.probe_timeout, self.probe.probe(module)).await;

        match outcome {
            Err(_) => {
                metrics::counter!("control_probe_timeouts_total").increment(1);
                let err = crate::domain::errors::ControlError::ProbeTimeout {
                    module: module.id.clone(),
                    timeout: self.probe_timeout,
                };
                Err(err.to_string())
            }
            Ok(Err(e)) => Err(format!("health probe failed: {}", e)),
            Ok(Ok(report)) if !report.healthy => Err(report.details),
            Ok(Ok(_)) => {
                debug!(module = %module.id, "health probe passed");
                // Informational metrics only; no lifecycle decision reads
                // these values.
                let mut m = module.metrics.clone();
                m.latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                if let Err(e) = self.registry.record_metrics(&module.id, m).await {
                    warn!(module = %module.id, "failed to record probe metrics: {}", e);
                }
                Ok(())
            }
        }
    }

    async fn handle_failure(&self, module: &Module, reason: &str) {
        warn!(module = %module.id, module_type = %module.module_type, "health check failed: {}", reason);
        metrics::counter!("control_health_check_failures_total").increment(1);

        self.event_bus.publish_health_event(HealthEvent::CheckFailed {
            module_id: module.id.clone(),
            module_type: module.module_type,
            reason: reason.to_string(),
            failed_at: chrono::Utc::now(),
        });

        match self.lifecycle.fail_over(&module.id).await {
            Ok(Some(backup)) => {
                info!(
                    failed = %module.id, backup = %backup.id, module_type = %module.module_type,
                    "backup module activated"
                );
                self.event_bus.publish_health_event(HealthEvent::BackupActivated {
                    failed_module_id: module.id.clone(),
                    backup_module_id: backup.id,
                    module_type: module.module_type,
                    activated_at: chrono::Utc::now(),
                });
            }
            Ok(None) => {
                error!(
                    module_type = %module.module_type,
                    "no backup available, capability type left without an active module"
                );
                self.event_bus.publish_health_event(HealthEvent::NoBackupAvailable {
                    failed_module_id: module.id.clone(),
                    module_type: module.module_type,
                    raised_at: chrono::Utc::now(),
                });
            }
            Err(e) => {
                // Failover itself failing is unexpected; leave recovery to
                // the next tick or the operator rather than retrying here.
                error!(module = %module.id, "failover failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::module::{
        Compatibility, ModuleId, ModuleSpec, ModuleStatus, ModuleType, TechGeneration,
    };
    use crate::domain::probe::{ProbeError, ProbeReport};
    use crate::infrastructure::event_bus::DomainEvent;
    use crate::infrastructure::repositories::InMemoryModuleRepository;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Clone, Copy)]
    enum Behavior {
        Healthy,
        Unhealthy,
        Hang,
    }

    struct ScriptedProbe {
        behaviors: Mutex<HashMap<String, Behavior>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProbe {
        fn new() -> Self {
            Self { behaviors: Mutex::new(HashMap::new()), calls: Mutex::new(Vec::new()) }
        }

        fn set(&self, id: &str, behavior: Behavior) {
            self.behaviors.lock().insert(id.to_string(), behavior);
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        async fn probe(&self, module: &Module) -> Result<ProbeReport, ProbeError> {
            self.calls.lock().push(module.id.0.clone());
            let behavior =
                self.behaviors.lock().get(module.id.as_str()).copied().unwrap_or(Behavior::Healthy);
            match behavior {
                Behavior::Healthy => Ok(ProbeReport::healthy("ok")),
                Behavior::Unhealthy => Ok(ProbeReport::unhealthy("connection refused")),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(ProbeReport::healthy("late"))
                }
            }
        }
    }

    struct Harness {
        registry: Arc<ModuleRegistry>,
        probe: Arc<ScriptedProbe>,
        supervisor: Arc<HealthSupervisor>,
        event_bus: Arc<EventBus>,
    }

    fn harness() -> Harness {
        let event_bus = Arc::new(EventBus::with_default_capacity());
        let registry = Arc::new(ModuleRegistry::new(
            Arc::new(InMemoryModuleRepository::new()),
            event_bus.clone(),
            "1.0.0".to_string(),
        ));
        let lifecycle = Arc::new(LifecycleController::new(
            registry.clone(),
            event_bus.clone(),
            Duration::ZERO,
        ));
        let probe = Arc::new(ScriptedProbe::new());
        let supervisor = Arc::new(HealthSupervisor::new(
            registry.clone(),
            lifecycle,
            probe.clone(),
            event_bus.clone(),
            Duration::from_secs(60),
            Duration::from_secs(10),
        ));
        Harness { registry, probe, supervisor, event_bus }
    }

    fn spec(id: &str, module_type: ModuleType, status: ModuleStatus) -> ModuleSpec {
        ModuleSpec {
            id: ModuleId::new(id),
            name: id.to_string(),
            module_type,
            version: "1.0.0".to_string(),
            generation: TechGeneration::Current,
            status,
            capabilities: vec![],
            dependencies: vec![],
            compatibility: Compatibility::default(),
            config: HashMap::new(),
            health_check_url: None,
            health_check_interval: Duration::from_secs(60),
            previous_version: None,
            can_rollback: true,
        }
    }

    #[tokio::test]
    async fn test_healthy_modules_keep_their_status() {
        let h = harness();
        h.registry
            .register(spec("cache-primary", ModuleType::Cache, ModuleStatus::Active))
            .await
            .unwrap();

        h.supervisor.run_tick().await;

        let module = h.registry.get(&ModuleId::new("cache-primary")).await.unwrap();
        assert!(module.is_active());
        assert_eq!(h.probe.call_count(), 1);
    }

    #[tokio::test]
    async fn test_inactive_modules_are_not_probed() {
        let h = harness();
        h.registry
            .register(spec("cache-spare", ModuleType::Cache, ModuleStatus::Inactive))
            .await
            .unwrap();

        h.supervisor.run_tick().await;
        assert_eq!(h.probe.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_probe_triggers_failover_to_backup() {
        let h = harness();
        h.registry
            .register(spec("cache-primary", ModuleType::Cache, ModuleStatus::Active))
            .await
            .unwrap();
        h.registry
            .register(spec("cache-backup", ModuleType::Cache, ModuleStatus::Inactive))
            .await
            .unwrap();
        h.probe.set("cache-primary", Behavior::Unhealthy);

        let mut receiver = h.event_bus.subscribe();
        h.supervisor.run_tick().await;

        let primary = h.registry.get(&ModuleId::new("cache-primary")).await.unwrap();
        assert_eq!(primary.status, ModuleStatus::Failed);
        let active = h.registry.get_active(ModuleType::Cache).await.unwrap();
        assert_eq!(active.unwrap().id.as_str(), "cache-backup");

        // CheckFailed precedes BackupActivated in the stream.
        let mut saw_failed = false;
        loop {
            match receiver.try_recv() {
                Ok(DomainEvent::Health(HealthEvent::CheckFailed { module_id, .. })) => {
                    assert_eq!(module_id.as_str(), "cache-primary");
                    saw_failed = true;
                }
                Ok(DomainEvent::Health(HealthEvent::BackupActivated {
                    backup_module_id, ..
                })) => {
                    assert!(saw_failed, "BackupActivated before CheckFailed");
                    assert_eq!(backup_module_id.as_str(), "cache-backup");
                    break;
                }
                Ok(_) => {}
                Err(e) => panic!("event stream ended early: {}", e),
            }
        }
    }

    #[tokio::test]
    async fn test_no_backup_raises_alert() {
        let h = harness();
        h.registry
            .register(spec("pay-primary", ModuleType::PaymentProcessor, ModuleStatus::Active))
            .await
            .unwrap();
        h.probe.set("pay-primary", Behavior::Unhealthy);

        let mut receiver = h.event_bus.subscribe();
        h.supervisor.run_tick().await;

        assert!(h.registry.get_active(ModuleType::PaymentProcessor).await.unwrap().is_none());

        let mut saw_alert = false;
        while let Ok(event) = receiver.try_recv() {
            if let DomainEvent::Health(HealthEvent::NoBackupAvailable { module_type, .. }) = event {
                assert_eq!(module_type, ModuleType::PaymentProcessor);
                saw_alert = true;
            }
        }
        assert!(saw_alert);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_counts_as_failure_after_timeout() {
        let h = harness();
        h.registry
            .register(spec("db-primary", ModuleType::Database, ModuleStatus::Active))
            .await
            .unwrap();
        h.registry
            .register(spec("db-backup", ModuleType::Database, ModuleStatus::Inactive))
            .await
            .unwrap();
        h.probe.set("db-primary", Behavior::Hang);

        h.supervisor.run_tick().await;

        let primary = h.registry.get(&ModuleId::new("db-primary")).await.unwrap();
        assert_eq!(primary.status, ModuleStatus::Failed);
        let active = h.registry.get_active(ModuleType::Database).await.unwrap();
        assert_eq!(active.unwrap().id.as_str(), "db-backup");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_does_not_starve_other_modules() {
        let h = harness();
        h.registry
            .register(spec("db-primary", ModuleType::Database, ModuleStatus::Active))
            .await
            .unwrap();
        h.registry
            .register(spec("cache-primary", ModuleType::Cache, ModuleStatus::Active))
            .await
            .unwrap();
        h.probe.set("db-primary", Behavior::Hang);

        h.supervisor.run_tick().await;

        // the cache module was still probed within the same tick
        assert_eq!(h.probe.call_count(), 2);
        let cache = h.registry.get(&ModuleId::new("cache-primary")).await.unwrap();
        assert!(cache.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_ticks_and_stops_on_cancel() {
        let h = harness();
        h.registry
            .register(spec("cache-primary", ModuleType::Cache, ModuleStatus::Active))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let handle = h.supervisor.clone().spawn(cancel.clone());

        // two full intervals under virtual time
        tokio::time::sleep(Duration::from_secs(121)).await;
        assert!(h.probe.call_count() >= 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_probe_rtt_recorded_as_latency_metric() {
        let h = harness();
        h.registry
            .register(spec("cache-primary", ModuleType::Cache, ModuleStatus::Active))
            .await
            .unwrap();

        h.supervisor.run_tick().await;

        let module = h.registry.get(&ModuleId::new("cache-primary")).await.unwrap();
        assert!(module.metrics.latency_ms >= 0.0);
    }
}
