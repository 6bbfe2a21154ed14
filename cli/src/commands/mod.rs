// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod flag;
mod migration;
mod module;

pub use flag::FlagCommand;
pub use migration::MigrationCommand;
pub use module::ModuleCommand;

use crate::client::ApiClient;
use aegis_control_core::engine::EngineStats;
use anyhow::Result;
use colored::Colorize;

pub async fn stats(client: &ApiClient) -> Result<()> {
    let stats: EngineStats = client.get("/stats").await?;

    println!("{}", "Engine".bold());
    println!("  platform version   {}", stats.registry.platform_version);
    println!("  modules            {}", stats.registry.total_modules);
    println!("    active           {}", stats.registry.active_modules.to_string().green());
    println!("    testing          {}", stats.registry.testing_modules);
    println!("    deprecated       {}", stats.registry.deprecated_modules);
    println!("    failed           {}", stats.registry.failed_modules.to_string().red());
    println!("  feature flags      {}", stats.feature_flags);
    println!("  migration plans    {}", stats.migration_plans);
    Ok(())
}
