// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Control Plane Engine
//!
//! Composition root for the module lifecycle engine. Constructed once at
//! process start and passed by handle to every caller; there are no global
//! singletons and no import-time side effects. `init` starts the health
//! supervision loop, `shutdown` cancels all background work.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::flags::FeatureFlagService;
use crate::application::health::HealthSupervisor;
use crate::application::lifecycle::LifecycleController;
use crate::application::migration::MigrationOrchestrator;
use crate::application::registry::{ModuleRegistry, RegistryStats};
use crate::domain::config::{EngineConfig, StorageConfig};
use crate::domain::module::ModuleStatus;
use crate::domain::probe::HealthProbe;
use crate::domain::repository::{FlagRepository, MigrationRepository, ModuleRepository};
use crate::infrastructure::db::Database;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::repositories::postgres::{
    PostgresFlagRepository, PostgresMigrationRepository, PostgresModuleRepository,
};
use crate::infrastructure::repositories::{
    InMemoryFlagRepository, InMemoryMigrationRepository, InMemoryModuleRepository,
};

/// Aggregate engine snapshot for the stats surface.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineStats {
    #[serde(flatten)]
    pub registry: RegistryStats,
    pub feature_flags: usize,
    pub migration_plans: usize,
}

pub struct ControlPlane {
    config: EngineConfig,
    event_bus: Arc<EventBus>,
    registry: Arc<ModuleRegistry>,
    lifecycle: Arc<LifecycleController>,
    flags: Arc<FeatureFlagService>,
    migrations: Arc<MigrationOrchestrator>,
    supervisor: Arc<HealthSupervisor>,
    shutdown: CancellationToken,
    supervisor_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ControlPlane {
    /// Build the engine, selecting repositories from the configured storage
    /// backend.
    pub async fn build(config: EngineConfig, probe: Arc<dyn HealthProbe>) -> Result<Self> {
        match &config.storage {
            StorageConfig::InMemory => {
                let modules = Arc::new(InMemoryModuleRepository::new());
                let flags = Arc::new(InMemoryFlagRepository::new());
                let plans = Arc::new(InMemoryMigrationRepository::new());
                Self::with_repositories(config, probe, modules, flags, plans).await
            }
            StorageConfig::Postgres { connection_string } => {
                let db = Database::new(connection_string)
                    .await
                    .context("failed to connect to PostgreSQL")?;
                db.ensure_schema().await.context("failed to prepare control-plane schema")?;

                let modules = Arc::new(PostgresModuleRepository::new(db.get_pool().clone()));
                let flags = Arc::new(PostgresFlagRepository::new(db.get_pool().clone()));
                let plans = Arc::new(PostgresMigrationRepository::new(db.get_pool().clone()));
                Self::with_repositories(config, probe, modules, flags, plans).await
            }
        }
    }

    /// Wire the engine over explicit repositories. Restores the per-type
    /// active pointers from persisted module records, so a restarted engine
    /// resumes with the same serving topology.
    pub async fn with_repositories(
        config: EngineConfig,
        probe: Arc<dyn HealthProbe>,
        modules: Arc<dyn ModuleRepository>,
        flag_store: Arc<dyn FlagRepository>,
        plans: Arc<dyn MigrationRepository>,
    ) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.events.capacity));

        let registry = Arc::new(ModuleRegistry::new(
            modules,
            event_bus.clone(),
            config.platform_version.clone(),
        ));

        for module in registry.list_all().await? {
            if module.status == ModuleStatus::Active {
                registry.set_active_pointer(module.module_type, module.id.clone());
            }
        }

        let lifecycle = Arc::new(LifecycleController::new(
            registry.clone(),
            event_bus.clone(),
            config.lifecycle.warm_up,
        ));
        let flags = Arc::new(FeatureFlagService::new(flag_store, event_bus.clone()));
        let migrations = Arc::new(MigrationOrchestrator::new(
            plans,
            registry.clone(),
            lifecycle.clone(),
            flags.clone(),
            event_bus.clone(),
        ));
        let supervisor = Arc::new(HealthSupervisor::new(
            registry.clone(),
            lifecycle.clone(),
            probe,
            event_bus.clone(),
            config.health.tick_interval,
            config.health.probe_timeout,
        ));

        Ok(Self {
            config,
            event_bus,
            registry,
            lifecycle,
            flags,
            migrations,
            supervisor,
            shutdown: CancellationToken::new(),
            supervisor_handle: tokio::sync::Mutex::new(None),
        })
    }

    /// Start background work. Idempotent: a second call is a no-op while
    /// the supervisor is running.
    pub async fn init(&self) {
        let mut handle = self.supervisor_handle.lock().await;
        if handle.is_none() {
            *handle = Some(self.supervisor.clone().spawn(self.shutdown.child_token()));
            info!(platform_version = %self.config.platform_version, "control plane initialized");
        }
    }

    /// Cancel background work and wait for it to wind down.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.supervisor_handle.lock().await.take() {
            let _ = handle.await;
        }
        info!("control plane shut down");
    }

    pub async fn stats(&self) -> Result<EngineStats, crate::domain::errors::ControlError> {
        Ok(EngineStats {
            registry: self.registry.stats().await?,
            feature_flags: self.flags.list_all().await?.len(),
            migration_plans: self.migrations.list_plans().await?.len(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub fn registry(&self) -> Arc<ModuleRegistry> {
        self.registry.clone()
    }

    pub fn lifecycle(&self) -> Arc<LifecycleController> {
        self.lifecycle.clone()
    }

    pub fn flags(&self) -> Arc<FeatureFlagService> {
        self.flags.clone()
    }

    pub fn migrations(&self) -> Arc<MigrationOrchestrator> {
        self.migrations.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::module::{
        Compatibility, ModuleId, ModuleSpec, ModuleType, TechGeneration,
    };
    use crate::infrastructure::probes::StaticHealthProbe;
    use std::collections::HashMap;
    use std::time::Duration;

    fn spec(id: &str, status: ModuleStatus) -> ModuleSpec {
        ModuleSpec {
            id: ModuleId::new(id),
            name: id.to_string(),
            module_type: ModuleType::Cache,
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
    async fn test_build_in_memory_and_stats() {
        let engine = ControlPlane::build(EngineConfig::default(), Arc::new(StaticHealthProbe::new()))
            .await
            .unwrap();

        engine.registry().register(spec("cache-a", ModuleStatus::Active)).await.unwrap();
        engine.registry().register(spec("cache-b", ModuleStatus::Inactive)).await.unwrap();

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.registry.total_modules, 2);
        assert_eq!(stats.registry.active_modules, 1);
        assert_eq!(stats.feature_flags, 0);
        assert_eq!(stats.migration_plans, 0);
    }

    #[tokio::test]
    async fn test_active_pointers_restored_from_storage() {
        let modules = Arc::new(InMemoryModuleRepository::new());
        // records persisted by a previous engine incarnation
        let module = spec("cache-a", ModuleStatus::Active).into_module(chrono::Utc::now());
        crate::domain::repository::ModuleRepository::save(modules.as_ref(), &module)
            .await
            .unwrap();

        let engine = ControlPlane::with_repositories(
            EngineConfig::default(),
            Arc::new(StaticHealthProbe::new()),
            modules,
            Arc::new(InMemoryFlagRepository::new()),
            Arc::new(InMemoryMigrationRepository::new()),
        )
        .await
        .unwrap();

        let active = engine.registry().get_active(ModuleType::Cache).await.unwrap();
        assert_eq!(active.unwrap().id.as_str(), "cache-a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_and_shutdown_round_trip() {
        let engine = ControlPlane::build(EngineConfig::default(), Arc::new(StaticHealthProbe::new()))
            .await
            .unwrap();

        engine.init().await;
        engine.init().await; // idempotent
        engine.shutdown().await;
    }
}
