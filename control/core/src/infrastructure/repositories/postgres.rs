// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Repositories
//!
//! Production repository implementations over `sqlx`. Each aggregate is
//! stored as a JSONB record beside the columns the queries filter and sort
//! on; writes are single-row upserts, so status changes and phase
//! completion flags are atomic with respect to concurrent readers.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::flag::FeatureFlag;
use crate::domain::migration::{MigrationPlan, PlanId};
use crate::domain::module::{Module, ModuleId, ModuleType};
use crate::domain::repository::{
    FlagRepository, MigrationRepository, ModuleRepository, RepositoryError,
};

pub struct PostgresModuleRepository {
    pool: PgPool,
}

impl PostgresModuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode<T: serde::de::DeserializeOwned>(row: &sqlx::postgres::PgRow) -> Result<T, RepositoryError> {
    let record: serde_json::Value = row.try_get("record").map_err(RepositoryError::from)?;
    serde_json::from_value(record).map_err(RepositoryError::from)
}

#[async_trait]
impl ModuleRepository for PostgresModuleRepository {
    async fn save(&self, module: &Module) -> Result<(), RepositoryError> {
        let record = serde_json::to_value(module)?;

        sqlx::query(
            r#"
            INSERT INTO modules (id, module_type, status, record, installed_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                module_type = EXCLUDED.module_type,
                status = EXCLUDED.status,
                record = EXCLUDED.record
            "#,
        )
        .bind(module.id.as_str())
        .bind(module.module_type.as_str())
        .bind(serde_json::to_value(module.status)?.as_str().unwrap_or_default().to_string())
        .bind(record)
        .bind(module.installed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &ModuleId) -> Result<Option<Module>, RepositoryError> {
        let row = sqlx::query("SELECT record FROM modules WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(decode).transpose()
    }

    async fn find_by_type(&self, module_type: ModuleType) -> Result<Vec<Module>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT record FROM modules WHERE module_type = $1 ORDER BY installed_at, id",
        )
        .bind(module_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode).collect()
    }

    async fn list_all(&self) -> Result<Vec<Module>, RepositoryError> {
        let rows = sqlx::query("SELECT record FROM modules ORDER BY installed_at, id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(decode).collect()
    }
}

pub struct PostgresFlagRepository {
    pool: PgPool,
}

impl PostgresFlagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FlagRepository for PostgresFlagRepository {
    async fn save(&self, flag: &FeatureFlag) -> Result<(), RepositoryError> {
        let record = serde_json::to_value(flag)?;

        sqlx::query(
            r#"
            INSERT INTO feature_flags (id, record, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET record = EXCLUDED.record
            "#,
        )
        .bind(&flag.id)
        .bind(record)
        .bind(flag.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<FeatureFlag>, RepositoryError> {
        let row = sqlx::query("SELECT record FROM feature_flags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(decode).transpose()
    }

    async fn list_all(&self) -> Result<Vec<FeatureFlag>, RepositoryError> {
        let rows = sqlx::query("SELECT record FROM feature_flags ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(decode).collect()
    }
}

pub struct PostgresMigrationRepository {
    pool: PgPool,
}

impl PostgresMigrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MigrationRepository for PostgresMigrationRepository {
    async fn save(&self, plan: &MigrationPlan) -> Result<(), RepositoryError> {
        let record = serde_json::to_value(plan)?;

        sqlx::query(
            r#"
            INSERT INTO migration_plans (id, status, record, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                record = EXCLUDED.record
            "#,
        )
        .bind(plan.id.0)
        .bind(serde_json::to_value(plan.status)?.as_str().unwrap_or_default().to_string())
        .bind(record)
        .bind(plan.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: PlanId) -> Result<Option<MigrationPlan>, RepositoryError> {
        let row = sqlx::query("SELECT record FROM migration_plans WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(decode).transpose()
    }

    async fn list_all(&self) -> Result<Vec<MigrationPlan>, RepositoryError> {
        let rows = sqlx::query("SELECT record FROM migration_plans ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(decode).collect()
    }
}
