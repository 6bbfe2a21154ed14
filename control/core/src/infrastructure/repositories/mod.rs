// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory repository implementations, used for development and testing.
//! Production deployments select the PostgreSQL implementations in
//! [`postgres`] via `StorageConfig`.

pub mod postgres;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::flag::FeatureFlag;
use crate::domain::migration::{MigrationPlan, PlanId};
use crate::domain::module::{Module, ModuleId, ModuleType};
use crate::domain::repository::{
    FlagRepository, MigrationRepository, ModuleRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryModuleRepository {
    modules: RwLock<HashMap<ModuleId, Module>>,
    /// Registration order, the tie-break behind `list_all`'s stable
    /// `installed_at` ordering.
    insertion_order: RwLock<Vec<ModuleId>>,
}

impl InMemoryModuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModuleRepository for InMemoryModuleRepository {
    async fn save(&self, module: &Module) -> Result<(), RepositoryError> {
        let mut modules = self.modules.write();
        if !modules.contains_key(&module.id) {
            self.insertion_order.write().push(module.id.clone());
        }
        modules.insert(module.id.clone(), module.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &ModuleId) -> Result<Option<Module>, RepositoryError> {
        Ok(self.modules.read().get(id).cloned())
    }

    async fn find_by_type(&self, module_type: ModuleType) -> Result<Vec<Module>, RepositoryError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|m| m.module_type == module_type)
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Module>, RepositoryError> {
        let modules = self.modules.read();
        let order = self.insertion_order.read();
        let mut all: Vec<Module> = order.iter().filter_map(|id| modules.get(id).cloned()).collect();
        // Insertion order already breaks installed_at ties; the sort is
        // stable so it stays that way.
        all.sort_by_key(|m| m.installed_at);
        Ok(all)
    }
}

#[derive(Default)]
pub struct InMemoryFlagRepository {
    flags: RwLock<HashMap<String, FeatureFlag>>,
}

impl InMemoryFlagRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlagRepository for InMemoryFlagRepository {
    async fn save(&self, flag: &FeatureFlag) -> Result<(), RepositoryError> {
        self.flags.write().insert(flag.id.clone(), flag.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<FeatureFlag>, RepositoryError> {
        Ok(self.flags.read().get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<FeatureFlag>, RepositoryError> {
        let mut all: Vec<FeatureFlag> = self.flags.read().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

#[derive(Default)]
pub struct InMemoryMigrationRepository {
    plans: RwLock<HashMap<PlanId, MigrationPlan>>,
}

impl InMemoryMigrationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MigrationRepository for InMemoryMigrationRepository {
    async fn save(&self, plan: &MigrationPlan) -> Result<(), RepositoryError> {
        self.plans.write().insert(plan.id, plan.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: PlanId) -> Result<Option<MigrationPlan>, RepositoryError> {
        Ok(self.plans.read().get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<MigrationPlan>, RepositoryError> {
        let mut all: Vec<MigrationPlan> = self.plans.read().values().cloned().collect();
        all.sort_by_key(|p| p.created_at);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::module::{Compatibility, ModuleSpec, ModuleStatus, TechGeneration};
    use chrono::Utc;
    use std::time::Duration;

    fn module(id: &str) -> Module {
        ModuleSpec {
            id: ModuleId::new(id),
            name: id.to_string(),
            module_type: ModuleType::Cache,
            version: "1.0.0".to_string(),
            generation: TechGeneration::Current,
            status: ModuleStatus::Inactive,
            capabilities: vec![],
            dependencies: vec![],
            compatibility: Compatibility::default(),
            config: HashMap::new(),
            health_check_url: None,
            health_check_interval: Duration::from_secs(60),
            previous_version: None,
            can_rollback: true,
        }
        .into_module(Utc::now())
    }

    #[tokio::test]
    async fn test_module_save_and_find() {
        let repo = InMemoryModuleRepository::new();
        let m = module("cache-redis");
        repo.save(&m).await.unwrap();

        let found = repo.find_by_id(&ModuleId::new("cache-redis")).await.unwrap();
        assert!(found.is_some());
        assert!(repo.find_by_id(&ModuleId::new("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_all_keeps_registration_order() {
        let repo = InMemoryModuleRepository::new();
        // Same timestamps are possible at registration granularity; the
        // insertion order must hold as the tie-break.
        for id in ["cache-a", "cache-b", "cache-c"] {
            repo.save(&module(id)).await.unwrap();
        }
        let ids: Vec<String> =
            repo.list_all().await.unwrap().into_iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec!["cache-a", "cache-b", "cache-c"]);
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let repo = InMemoryModuleRepository::new();
        let mut m = module("cache-a");
        repo.save(&m).await.unwrap();
        m.mark_active(Utc::now());
        repo.save(&m).await.unwrap();

        assert_eq!(repo.list_all().await.unwrap().len(), 1);
        let found = repo.find_by_id(&m.id).await.unwrap().unwrap();
        assert!(found.is_active());
    }

    #[tokio::test]
    async fn test_find_by_type_filters() {
        let repo = InMemoryModuleRepository::new();
        repo.save(&module("cache-a")).await.unwrap();
        let mut other = module("pay-a");
        other.module_type = ModuleType::PaymentProcessor;
        repo.save(&other).await.unwrap();

        let caches = repo.find_by_type(ModuleType::Cache).await.unwrap();
        assert_eq!(caches.len(), 1);
        assert_eq!(caches[0].id.as_str(), "cache-a");
    }

    #[tokio::test]
    async fn test_flag_repository_round_trip() {
        let repo = InMemoryFlagRepository::new();
        let flag = FeatureFlag::new("new-checkout", "New checkout", true, 25);
        repo.save(&flag).await.unwrap();

        let found = repo.find_by_id("new-checkout").await.unwrap().unwrap();
        assert_eq!(found.rollout_percentage, 25);
    }

    #[tokio::test]
    async fn test_migration_repository_round_trip() {
        use crate::domain::migration::{MigrationPhase, MigrationStrategy};

        let repo = InMemoryMigrationRepository::new();
        let plan = MigrationPlan::new(
            "upgrade",
            ModuleId::new("pay-a"),
            ModuleId::new("pay-b"),
            MigrationStrategy::BigBang,
            vec![MigrationPhase::new("switch", Duration::from_secs(0), 100)],
            true,
        );
        repo.save(&plan).await.unwrap();

        let found = repo.find_by_id(plan.id).await.unwrap().unwrap();
        assert_eq!(found.name, "upgrade");
        assert!(repo.find_by_id(PlanId::new()).await.unwrap().is_none());
    }
}
