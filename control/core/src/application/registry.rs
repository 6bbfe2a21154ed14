// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Module Registry Application Service
//!
//! Source of truth for module records and the active-pointer bookkeeping
//! per capability type. Holds no lifecycle logic: exclusivity is enforced
//! by the lifecycle controller, the registry only tracks which module each
//! type currently points at.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::domain::errors::ControlError;
use crate::domain::events::ModuleEvent;
use crate::domain::module::{Module, ModuleId, ModuleMetrics, ModuleSpec, ModuleStatus, ModuleType};
use crate::domain::repository::ModuleRepository;
use crate::infrastructure::event_bus::EventBus;

pub struct ModuleRegistry {
    repository: Arc<dyn ModuleRepository>,
    event_bus: Arc<EventBus>,
    /// Active module per type. A plain read lock so `get_active` never waits
    /// on lifecycle mutations of unrelated types.
    active: RwLock<HashMap<ModuleType, ModuleId>>,
    platform_version: String,
}

/// Aggregate module counts, reported through `stats()`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegistryStats {
    pub platform_version: String,
    pub total_modules: usize,
    pub active_modules: usize,
    pub testing_modules: usize,
    pub deprecated_modules: usize,
    pub failed_modules: usize,
}

impl ModuleRegistry {
    pub fn new(
        repository: Arc<dyn ModuleRepository>,
        event_bus: Arc<EventBus>,
        platform_version: String,
    ) -> Self {
        Self {
            repository,
            event_bus,
            active: RwLock::new(HashMap::new()),
            platform_version,
        }
    }

    /// Register a new module.
    ///
    /// If the spec declares an initial `active` status the module becomes
    /// the active pointer for its type, evicting any previous mapping; the
    /// caller is responsible for having deactivated the previous module.
    pub async fn register(&self, spec: ModuleSpec) -> Result<Module, ControlError> {
        if self.repository.find_by_id(&spec.id).await?.is_some() {
            return Err(ControlError::DuplicateModule(spec.id));
        }

        let module = spec.into_module(chrono::Utc::now());
        self.repository.save(&module).await?;

        if module.status == ModuleStatus::Active {
            self.active.write().insert(module.module_type, module.id.clone());
        }

        info!(
            module = %module.id,
            module_type = %module.module_type,
            version = %module.version,
            min_platform = %module.compatibility.min_platform_version,
            "module registered"
        );
        metrics::counter!("control_modules_registered_total").increment(1);

        self.event_bus.publish_module_event(ModuleEvent::ModuleRegistered {
            module_id: module.id.clone(),
            module_type: module.module_type,
            version: module.version.clone(),
            registered_at: module.installed_at,
        });

        Ok(module)
    }

    pub async fn get(&self, id: &ModuleId) -> Result<Module, ControlError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ControlError::ModuleNotFound(id.clone()))
    }

    /// Currently active module for a type, if any.
    pub async fn get_active(&self, module_type: ModuleType) -> Result<Option<Module>, ControlError> {
        let id = self.active.read().get(&module_type).cloned();
        match id {
            Some(id) => Ok(self.repository.find_by_id(&id).await?),
            None => Ok(None),
        }
    }

    /// Snapshot of the active pointer without touching storage.
    pub fn active_id(&self, module_type: ModuleType) -> Option<ModuleId> {
        self.active.read().get(&module_type).cloned()
    }

    /// All modules, stable order by installation time.
    pub async fn list_all(&self) -> Result<Vec<Module>, ControlError> {
        Ok(self.repository.list_all().await?)
    }

    pub async fn find_by_type(&self, module_type: ModuleType) -> Result<Vec<Module>, ControlError> {
        Ok(self.repository.find_by_type(module_type).await?)
    }

    /// Persist a module mutated by the lifecycle controller or supervisor.
    pub(crate) async fn save(&self, module: &Module) -> Result<(), ControlError> {
        self.repository.save(module).await?;
        Ok(())
    }

    /// Point a type at a module. Lifecycle-controller use only.
    pub(crate) fn set_active_pointer(&self, module_type: ModuleType, id: ModuleId) {
        self.active.write().insert(module_type, id);
    }

    /// Clear a type's pointer if it still references `id`.
    pub(crate) fn clear_active_pointer(&self, module_type: ModuleType, id: &ModuleId) {
        let mut active = self.active.write();
        if active.get(&module_type) == Some(id) {
            active.remove(&module_type);
        }
    }

    /// Supervisor-only write path for runtime metrics. Informational; no
    /// lifecycle decision reads these values.
    pub async fn record_metrics(
        &self,
        id: &ModuleId,
        metrics: ModuleMetrics,
    ) -> Result<(), ControlError> {
        let mut module = self.get(id).await?;
        module.metrics = metrics;
        module.last_updated = chrono::Utc::now();
        self.repository.save(&module).await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<RegistryStats, ControlError> {
        let modules = self.repository.list_all().await?;
        let count = |status: ModuleStatus| modules.iter().filter(|m| m.status == status).count();
        Ok(RegistryStats {
            platform_version: self.platform_version.clone(),
            total_modules: modules.len(),
            active_modules: count(ModuleStatus::Active),
            testing_modules: count(ModuleStatus::Testing),
            deprecated_modules: count(ModuleStatus::Deprecated),
            failed_modules: count(ModuleStatus::Failed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::module::{Compatibility, TechGeneration};
    use crate::infrastructure::repositories::InMemoryModuleRepository;
    use std::time::Duration;

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new(
            Arc::new(InMemoryModuleRepository::new()),
            Arc::new(EventBus::with_default_capacity()),
            "1.0.0".to_string(),
        )
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
    async fn test_register_and_get() {
        let registry = registry();
        let module = registry
            .register(spec("pay-a", ModuleType::PaymentProcessor, ModuleStatus::Inactive))
            .await
            .unwrap();
        assert_eq!(module.status, ModuleStatus::Inactive);

        let fetched = registry.get(&ModuleId::new("pay-a")).await.unwrap();
        assert_eq!(fetched.id, module.id);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let registry = registry();
        registry
            .register(spec("pay-a", ModuleType::PaymentProcessor, ModuleStatus::Inactive))
            .await
            .unwrap();
        let err = registry
            .register(spec("pay-a", ModuleType::PaymentProcessor, ModuleStatus::Inactive))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::DuplicateModule(_)));
    }

    #[tokio::test]
    async fn test_get_unknown_module_is_not_found() {
        let registry = registry();
        let err = registry.get(&ModuleId::new("ghost")).await.unwrap_err();
        assert!(matches!(err, ControlError::ModuleNotFound(_)));
    }

    #[tokio::test]
    async fn test_active_initial_status_claims_pointer() {
        let registry = registry();
        registry
            .register(spec("pay-a", ModuleType::PaymentProcessor, ModuleStatus::Active))
            .await
            .unwrap();

        let active = registry.get_active(ModuleType::PaymentProcessor).await.unwrap();
        assert_eq!(active.unwrap().id.as_str(), "pay-a");
        assert!(registry.get_active(ModuleType::Cache).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_registration_emits_event() {
        let registry = registry();
        let mut receiver = registry.event_bus.subscribe();
        registry
            .register(spec("pay-a", ModuleType::PaymentProcessor, ModuleStatus::Inactive))
            .await
            .unwrap();

        match receiver.recv().await.unwrap() {
            crate::infrastructure::event_bus::DomainEvent::Module(
                ModuleEvent::ModuleRegistered { module_id, .. },
            ) => assert_eq!(module_id.as_str(), "pay-a"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stats_counts_statuses() {
        let registry = registry();
        registry
            .register(spec("pay-a", ModuleType::PaymentProcessor, ModuleStatus::Active))
            .await
            .unwrap();
        registry
            .register(spec("pay-b", ModuleType::PaymentProcessor, ModuleStatus::Inactive))
            .await
            .unwrap();
        registry
            .register(spec("ai-x", ModuleType::AiModel, ModuleStatus::Testing))
            .await
            .unwrap();

        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.total_modules, 3);
        assert_eq!(stats.active_modules, 1);
        assert_eq!(stats.testing_modules, 1);
        assert_eq!(stats.failed_modules, 0);
    }

    #[tokio::test]
    async fn test_record_metrics_touches_only_metrics() {
        let registry = registry();
        registry
            .register(spec("pay-a", ModuleType::PaymentProcessor, ModuleStatus::Active))
            .await
            .unwrap();

        let m = ModuleMetrics { uptime_percent: 99.9, latency_ms: 12.0, ..Default::default() };
        registry.record_metrics(&ModuleId::new("pay-a"), m).await.unwrap();

        let module = registry.get(&ModuleId::new("pay-a")).await.unwrap();
        assert_eq!(module.metrics.uptime_percent, 99.9);
        assert_eq!(module.status, ModuleStatus::Active);
    }
}
