// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # AEGIS Control Core
//!
//! Module lifecycle and migration orchestration engine: pluggable platform
//! capabilities managed as versioned, hot-swappable modules, rolled out
//! through feature flags and staged migrations.
//!
//! # Architecture
//!
//! - **domain** — aggregates, events, errors, repository contracts
//! - **application** — registry, lifecycle controller, health supervisor,
//!   flag service, migration orchestrator
//! - **infrastructure** — event bus, repositories, probes
//! - **presentation** — HTTP admin surface

pub mod application;
pub mod domain;
pub mod engine;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
pub use engine::{ControlPlane, EngineStats};
