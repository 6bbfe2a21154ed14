// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Feature flags and the deterministic rollout evaluator.
//!
//! Evaluation must be stable: for a fixed flag configuration the same
//! subject always gets the same verdict, across calls and across process
//! restarts. The percentage gate therefore hashes `flag_id + subject_id`
//! with SHA-256 (a pure function of its inputs) instead of drawing any
//! randomness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// A named boolean capability gate with percentage rollout, audience
/// targeting, and optional expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    /// 0–100. Values above 100 are clamped at construction.
    pub rollout_percentage: u8,
    /// Allow-list of subject ids. Empty means no subject restriction.
    #[serde(default)]
    pub target_subjects: Vec<String>,
    /// Allow-list of account tiers. Empty means no tier restriction.
    #[serde(default)]
    pub target_tiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeatureFlag {
    pub fn new(id: impl Into<String>, name: impl Into<String>, enabled: bool, rollout_percentage: u8) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            enabled,
            rollout_percentage: rollout_percentage.min(100),
            target_subjects: Vec::new(),
            target_tiers: Vec::new(),
            expires_at: None,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_percentage(&mut self, percentage: u8, now: DateTime<Utc>) {
        self.rollout_percentage = percentage.min(100);
        self.updated_at = now;
    }

    /// Evaluate the flag for a subject at `now`.
    ///
    /// Decision ladder, first failure wins:
    /// master switch → expiry → subject allow-list → tier allow-list →
    /// percentage bucket.
    pub fn evaluate(&self, now: DateTime<Utc>, subject: Option<&str>, tier: Option<&str>) -> bool {
        if !self.enabled {
            return false;
        }

        if let Some(expires_at) = self.expires_at {
            if now > expires_at {
                return false;
            }
        }

        if !self.target_subjects.is_empty() {
            match subject {
                Some(s) if self.target_subjects.iter().any(|t| t == s) => {}
                _ => return false,
            }
        }

        if !self.target_tiers.is_empty() {
            match tier {
                Some(t) if self.target_tiers.iter().any(|x| x == t) => {}
                _ => return false,
            }
        }

        if self.rollout_percentage < 100 {
            let bucket = rollout_bucket(&self.id, subject.unwrap_or(""));
            if bucket >= self.rollout_percentage {
                return false;
            }
        }

        true
    }
}

/// Deterministic position of a subject in [0, 100) for a flag.
///
/// SHA-256 over the concatenation, first eight bytes as a big-endian u64,
/// reduced modulo 100. Subjects keep their bucket as long as the flag id is
/// unchanged, so raising the percentage only ever adds subjects.
pub fn rollout_bucket(flag_id: &str, subject_id: &str) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(flag_id.as_bytes());
    hasher.update(subject_id.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % 100) as u8
}
