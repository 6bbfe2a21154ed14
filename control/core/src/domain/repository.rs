// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root, following the DDD
//! Repository pattern: one repository per aggregate, interface defined in
//! the domain layer, implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `ModuleRepository` | `Module` | `InMemoryModuleRepository`, `PostgresModuleRepository` |
//! | `FlagRepository` | `FeatureFlag` | `InMemoryFlagRepository`, `PostgresFlagRepository` |
//! | `MigrationRepository` | `MigrationPlan` | `InMemoryMigrationRepository`, `PostgresMigrationRepository` |
//!
//! Concrete implementations are selected at engine startup from
//! configuration. In-memory implementations serve development and testing;
//! PostgreSQL serves production. Writes to a module's status and a plan's
//! phase-completion flags are single-record upserts, atomic with respect to
//! concurrent readers.

use async_trait::async_trait;

use crate::domain::flag::FeatureFlag;
use crate::domain::migration::{MigrationPlan, PlanId};
use crate::domain::module::{Module, ModuleId, ModuleType};

/// Repository interface for Module aggregates.
#[async_trait]
pub trait ModuleRepository: Send + Sync {
    /// Save module (create or update).
    async fn save(&self, module: &Module) -> Result<(), RepositoryError>;

    /// Find module by id.
    async fn find_by_id(&self, id: &ModuleId) -> Result<Option<Module>, RepositoryError>;

    /// All modules of one capability type.
    async fn find_by_type(&self, module_type: ModuleType) -> Result<Vec<Module>, RepositoryError>;

    /// List all modules, stable order by `installed_at` (registration order
    /// breaks ties).
    async fn list_all(&self) -> Result<Vec<Module>, RepositoryError>;
}

/// Repository interface for FeatureFlag aggregates.
#[async_trait]
pub trait FlagRepository: Send + Sync {
    async fn save(&self, flag: &FeatureFlag) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<FeatureFlag>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<FeatureFlag>, RepositoryError>;
}

/// Repository interface for MigrationPlan aggregates.
#[async_trait]
pub trait MigrationRepository: Send + Sync {
    async fn save(&self, plan: &MigrationPlan) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: PlanId) -> Result<Option<MigrationPlan>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<MigrationPlan>, RepositoryError>;
}

/// Repository errors.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        RepositoryError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
