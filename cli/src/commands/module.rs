// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::client::ApiClient;
use aegis_control_core::domain::module::{Module, ModuleStatus};

#[derive(Subcommand)]
pub enum ModuleCommand {
    /// Register a module from a YAML or JSON spec file
    Register {
        /// Module spec file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },

    /// List all registered modules
    List,

    /// Show one module
    Get { id: String },

    /// Activate a module (displaces the active module of its type)
    Activate { id: String },

    /// Deactivate a module
    Deactivate { id: String },

    /// Hot-swap the active module of a type with zero downtime
    Swap {
        /// Currently active module
        old: String,
        /// Replacement module of the same type
        new: String,
    },
}

impl ModuleCommand {
    pub async fn run(self, client: &ApiClient) -> Result<()> {
        match self {
            ModuleCommand::Register { file } => {
                let raw = std::fs::read_to_string(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?;
                let spec: Value = serde_yaml::from_str(&raw)
                    .with_context(|| format!("invalid module spec in {}", file.display()))?;

                let module: Module = client.post("/modules", &spec).await?;
                println!("{} module {} registered", "ok".green().bold(), module.id);
                Ok(())
            }
            ModuleCommand::List => {
                let modules: Vec<Module> = client.get("/modules").await?;
                if modules.is_empty() {
                    println!("no modules registered");
                    return Ok(());
                }
                for module in modules {
                    println!(
                        "{:<28} {:<20} {:<8} {}",
                        module.id.to_string().bold(),
                        module.module_type,
                        module.version,
                        status_label(module.status),
                    );
                }
                Ok(())
            }
            ModuleCommand::Get { id } => {
                let module: Module = client.get(&format!("/modules/{}", id)).await?;
                println!("{}", serde_json::to_string_pretty(&module)?);
                Ok(())
            }
            ModuleCommand::Activate { id } => {
                let module: Module = client.post(&format!("/modules/{}/activate", id), &json!({})).await?;
                println!("{} module {} active", "ok".green().bold(), module.id);
                Ok(())
            }
            ModuleCommand::Deactivate { id } => {
                let module: Module =
                    client.post(&format!("/modules/{}/deactivate", id), &json!({})).await?;
                println!("{} module {} inactive", "ok".green().bold(), module.id);
                Ok(())
            }
            ModuleCommand::Swap { old, new } => {
                let _: Value = client
                    .post("/modules/swap", &json!({ "old": old, "new": new }))
                    .await?;
                println!("{} {} swapped out for {}", "ok".green().bold(), old, new);
                Ok(())
            }
        }
    }
}

fn status_label(status: ModuleStatus) -> colored::ColoredString {
    match status {
        ModuleStatus::Active => "active".green(),
        ModuleStatus::Inactive => "inactive".normal(),
        ModuleStatus::Testing => "testing".yellow(),
        ModuleStatus::Deprecated => "deprecated".dimmed(),
        ModuleStatus::Failed => "failed".red(),
    }
}
