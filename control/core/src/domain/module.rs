// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Operator-assigned module identifier (e.g. "payments-stripe-v2").
///
/// Unlike execution-scoped ids elsewhere in the platform, module ids are
/// stable strings chosen at registration time and never reissued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability category a module fills. Exclusivity is enforced per type:
/// at most one active module per variant at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    AiModel,
    BlockchainConsensus,
    PaymentProcessor,
    StorageBackend,
    Authentication,
    ContentModeration,
    TradingEngine,
    SmartContractVm,
    Database,
    Cache,
    Messaging,
    Analytics,
    Custom,
}

impl ModuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleType::AiModel => "ai_model",
            ModuleType::BlockchainConsensus => "blockchain_consensus",
            ModuleType::PaymentProcessor => "payment_processor",
            ModuleType::StorageBackend => "storage_backend",
            ModuleType::Authentication => "authentication",
            ModuleType::ContentModeration => "content_moderation",
            ModuleType::TradingEngine => "trading_engine",
            ModuleType::SmartContractVm => "smart_contract_vm",
            ModuleType::Database => "database",
            ModuleType::Cache => "cache",
            ModuleType::Messaging => "messaging",
            ModuleType::Analytics => "analytics",
            ModuleType::Custom => "custom",
        }
    }
}

impl std::str::FromStr for ModuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai_model" => Ok(ModuleType::AiModel),
            "blockchain_consensus" => Ok(ModuleType::BlockchainConsensus),
            "payment_processor" => Ok(ModuleType::PaymentProcessor),
            "storage_backend" => Ok(ModuleType::StorageBackend),
            "authentication" => Ok(ModuleType::Authentication),
            "content_moderation" => Ok(ModuleType::ContentModeration),
            "trading_engine" => Ok(ModuleType::TradingEngine),
            "smart_contract_vm" => Ok(ModuleType::SmartContractVm),
            "database" => Ok(ModuleType::Database),
            "cache" => Ok(ModuleType::Cache),
            "messaging" => Ok(ModuleType::Messaging),
            "analytics" => Ok(ModuleType::Analytics),
            "custom" => Ok(ModuleType::Custom),
            other => Err(format!("unknown module type '{}'", other)),
        }
    }
}

impl std::fmt::Display for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Module lifecycle status.
///
/// `Deprecated` and `Failed` are not terminal: a failed module may be
/// reactivated by an operator after remediation, and deprecated modules can
/// still be force-activated. Both are excluded from automatic backup
/// selection during failover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Active,
    Inactive,
    Testing,
    Deprecated,
    Failed,
}

impl ModuleStatus {
    /// Whether the health supervisor may pick this module as a failover
    /// target for its type.
    pub fn can_serve_as_backup(&self) -> bool {
        matches!(self, ModuleStatus::Inactive)
    }
}

/// Technology generation tag. Used for eligibility filtering and reporting,
/// never for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechGeneration {
    Current,
    NextGen,
    Quantum,
    Neural,
    Experimental,
}

/// Runtime metrics for a module. Informational only: written by the health
/// supervisor, never consulted by lifecycle or migration decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleMetrics {
    pub uptime_percent: f64,
    pub latency_ms: f64,
    pub throughput_rps: f64,
    pub error_rate: f64,
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

/// Declared platform compatibility range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compatibility {
    pub min_platform_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_platform_version: Option<String>,
    pub backward_compatible: bool,
}

impl Default for Compatibility {
    fn default() -> Self {
        Self {
            min_platform_version: "1.0.0".to_string(),
            max_platform_version: None,
            backward_compatible: true,
        }
    }
}

/// A registered, versioned implementation of one capability type.
///
/// Modules are never physically deleted; deprecation is a status change so
/// that rollback targets and audit history stay resolvable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    pub version: String,
    pub generation: TechGeneration,
    pub status: ModuleStatus,

    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<ModuleId>,

    #[serde(default)]
    pub metrics: ModuleMetrics,
    #[serde(default)]
    pub compatibility: Compatibility,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,

    pub installed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,

    /// Health probe endpoint, when the module exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_url: Option<String>,
    /// Informational metadata: the supervisor runs one shared tick for all
    /// active modules regardless of this value.
    #[serde(with = "humantime_serde")]
    pub health_check_interval: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    pub can_rollback: bool,
}

impl Module {
    /// Stamp the module active.
    pub fn mark_active(&mut self, now: DateTime<Utc>) {
        self.status = ModuleStatus::Active;
        self.activated_at = Some(now);
        self.last_updated = now;
    }

    /// Stamp the module inactive.
    pub fn mark_inactive(&mut self, now: DateTime<Utc>) {
        self.status = ModuleStatus::Inactive;
        self.last_updated = now;
    }

    /// Stamp the module failed (health probe verdict).
    pub fn mark_failed(&mut self, now: DateTime<Utc>) {
        self.status = ModuleStatus::Failed;
        self.last_updated = now;
    }

    pub fn is_active(&self) -> bool {
        self.status == ModuleStatus::Active
    }
}

/// Registration payload: everything the operator declares about a module.
/// The registry turns this into a [`Module`] record with lifecycle stamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub id: ModuleId,
    pub name: String,
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    pub version: String,
    #[serde(default = "default_generation")]
    pub generation: TechGeneration,
    /// Initial status. `active` installs the module as the serving default
    /// for its type; anything else leaves activation to the lifecycle
    /// controller.
    #[serde(default = "default_status")]
    pub status: ModuleStatus,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<ModuleId>,
    #[serde(default)]
    pub compatibility: Compatibility,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_url: Option<String>,
    #[serde(default = "default_health_check_interval", with = "humantime_serde")]
    pub health_check_interval: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    #[serde(default = "default_true")]
    pub can_rollback: bool,
}

fn default_generation() -> TechGeneration {
    TechGeneration::Current
}

fn default_status() -> ModuleStatus {
    ModuleStatus::Inactive
}

fn default_health_check_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_true() -> bool {
    true
}

impl ModuleSpec {
    /// Materialize a module record, stamping installation time.
    pub fn into_module(self, now: DateTime<Utc>) -> Module {
        let activated_at = if self.status == ModuleStatus::Active {
            Some(now)
        } else {
            None
        };
        Module {
            id: self.id,
            name: self.name,
            module_type: self.module_type,
            version: self.version,
            generation: self.generation,
            status: self.status,
            capabilities: self.capabilities,
            dependencies: self.dependencies,
            metrics: ModuleMetrics::default(),
            compatibility: self.compatibility,
            config: self.config,
            installed_at: now,
            activated_at,
            last_updated: now,
            health_check_url: self.health_check_url,
            health_check_interval: self.health_check_interval,
            previous_version: self.previous_version,
            can_rollback: self.can_rollback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str) -> ModuleSpec {
        ModuleSpec {
            id: ModuleId::new(id),
            name: id.to_string(),
            module_type: ModuleType::PaymentProcessor,
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
    }

    #[test]
    fn test_into_module_stamps_installation() {
        let now = Utc::now();
        let module = spec("pay-a").into_module(now);
        assert_eq!(module.installed_at, now);
        assert_eq!(module.last_updated, now);
        assert!(module.activated_at.is_none());
        assert_eq!(module.status, ModuleStatus::Inactive);
    }

    #[test]
    fn test_active_initial_status_stamps_activation() {
        let mut s = spec("pay-a");
        s.status = ModuleStatus::Active;
        let now = Utc::now();
        let module = s.into_module(now);
        assert_eq!(module.activated_at, Some(now));
    }

    #[test]
    fn test_status_stamping() {
        let mut module = spec("pay-a").into_module(Utc::now());
        let later = Utc::now();
        module.mark_active(later);
        assert!(module.is_active());
        assert_eq!(module.activated_at, Some(later));

        module.mark_failed(later);
        assert_eq!(module.status, ModuleStatus::Failed);
        // activated_at is retained as history
        assert_eq!(module.activated_at, Some(later));
    }

    #[test]
    fn test_backup_eligibility() {
        assert!(ModuleStatus::Inactive.can_serve_as_backup());
        assert!(!ModuleStatus::Deprecated.can_serve_as_backup());
        assert!(!ModuleStatus::Failed.can_serve_as_backup());
        assert!(!ModuleStatus::Active.can_serve_as_backup());
        assert!(!ModuleStatus::Testing.can_serve_as_backup());
    }

    #[test]
    fn test_module_type_round_trip() {
        for t in [
            ModuleType::AiModel,
            ModuleType::PaymentProcessor,
            ModuleType::SmartContractVm,
            ModuleType::Custom,
        ] {
            assert_eq!(t.as_str().parse::<ModuleType>().unwrap(), t);
        }
        assert!("warp_drive".parse::<ModuleType>().is_err());
    }

    #[test]
    fn test_module_serde_uses_snake_case_type_tag() {
        let module = spec("pay-a").into_module(Utc::now());
        let json = serde_json::to_value(&module).unwrap();
        assert_eq!(json["type"], "payment_processor");
        assert_eq!(json["status"], "inactive");
    }
}
