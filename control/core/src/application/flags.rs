// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Feature Flag Application Service
//!
//! Stores flags and answers `evaluate` queries. Evaluation is read-only and
//! never waits on lifecycle locks; determinism comes from the hash-based
//! bucketing in the domain model.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::domain::errors::ControlError;
use crate::domain::events::FlagEvent;
use crate::domain::flag::FeatureFlag;
use crate::domain::repository::FlagRepository;
use crate::infrastructure::event_bus::EventBus;

pub struct FeatureFlagService {
    repository: Arc<dyn FlagRepository>,
    event_bus: Arc<EventBus>,
}

impl FeatureFlagService {
    pub fn new(repository: Arc<dyn FlagRepository>, event_bus: Arc<EventBus>) -> Self {
        Self { repository, event_bus }
    }

    /// Create or replace a flag.
    pub async fn create(&self, flag: FeatureFlag) -> Result<FeatureFlag, ControlError> {
        self.repository.save(&flag).await?;

        info!(flag = %flag.id, enabled = flag.enabled, pct = flag.rollout_percentage, "feature flag created");
        self.event_bus.publish_flag_event(FlagEvent::FlagCreated {
            flag_id: flag.id.clone(),
            enabled: flag.enabled,
            rollout_percentage: flag.rollout_percentage,
            created_at: flag.created_at,
        });

        Ok(flag)
    }

    pub async fn get(&self, id: &str) -> Result<FeatureFlag, ControlError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ControlError::FlagNotFound(id.to_string()))
    }

    pub async fn list_all(&self) -> Result<Vec<FeatureFlag>, ControlError> {
        Ok(self.repository.list_all().await?)
    }

    /// Update an existing flag in place via the supplied closure.
    pub async fn update<F>(&self, id: &str, mutate: F) -> Result<FeatureFlag, ControlError>
    where
        F: FnOnce(&mut FeatureFlag),
    {
        let mut flag = self.get(id).await?;
        mutate(&mut flag);
        flag.rollout_percentage = flag.rollout_percentage.min(100);
        flag.updated_at = Utc::now();
        self.repository.save(&flag).await?;

        self.event_bus.publish_flag_event(FlagEvent::FlagUpdated {
            flag_id: flag.id.clone(),
            enabled: flag.enabled,
            rollout_percentage: flag.rollout_percentage,
            updated_at: flag.updated_at,
        });

        Ok(flag)
    }

    /// Set a flag's rollout percentage, creating the flag when missing.
    /// This is the migration orchestrator's canary path: one plan-scoped
    /// flag whose percentage moves phase by phase.
    pub async fn upsert_percentage(
        &self,
        id: &str,
        name: &str,
        percentage: u8,
        metadata: impl IntoIterator<Item = (String, serde_json::Value)>,
    ) -> Result<FeatureFlag, ControlError> {
        match self.repository.find_by_id(id).await? {
            Some(_) => self.update(id, |flag| flag.set_percentage(percentage, Utc::now())).await,
            None => {
                let mut flag = FeatureFlag::new(id, name, true, percentage);
                flag.metadata.extend(metadata);
                self.create(flag).await
            }
        }
    }

    /// Evaluate a flag for a subject. A missing flag evaluates to false
    /// rather than erroring: callers gate behavior, they do not handle
    /// lookup failures.
    pub async fn evaluate(
        &self,
        id: &str,
        subject: Option<&str>,
        tier: Option<&str>,
    ) -> Result<bool, ControlError> {
        match self.repository.find_by_id(id).await? {
            Some(flag) => Ok(flag.evaluate(Utc::now(), subject, tier)),
            None => Ok(false),
        }
    }
}
