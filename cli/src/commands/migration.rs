// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::client::ApiClient;
use aegis_control_core::domain::migration::{MigrationPlan, MigrationStatus};

#[derive(Subcommand)]
pub enum MigrationCommand {
    /// Create a migration plan from a YAML or JSON file
    Create {
        /// Plan file: name, from_module, to_module, strategy, phases
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },

    /// List all migration plans
    List,

    /// Show one plan with phase progress
    Status { id: String },

    /// Start executing a planned migration
    Execute { id: String },

    /// Abort an in-flight migration
    Abort { id: String },

    /// Roll a migration back (inverse hot-swap)
    Rollback { id: String },
}

impl MigrationCommand {
    pub async fn run(self, client: &ApiClient) -> Result<()> {
        match self {
            MigrationCommand::Create { file } => {
                let raw = std::fs::read_to_string(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?;
                let request: Value = serde_yaml::from_str(&raw)
                    .with_context(|| format!("invalid migration plan in {}", file.display()))?;

                let plan: MigrationPlan = client.post("/migrations", &request).await?;
                println!(
                    "{} plan {} created ({} -> {}, {})",
                    "ok".green().bold(),
                    plan.id,
                    plan.from_module,
                    plan.to_module,
                    plan.strategy
                );
                Ok(())
            }
            MigrationCommand::List => {
                let plans: Vec<MigrationPlan> = client.get("/migrations").await?;
                if plans.is_empty() {
                    println!("no migration plans");
                    return Ok(());
                }
                for plan in plans {
                    println!(
                        "{} {:<24} {} -> {} {}",
                        plan.id,
                        plan.name.bold(),
                        plan.from_module,
                        plan.to_module,
                        status_label(plan.status),
                    );
                }
                Ok(())
            }
            MigrationCommand::Status { id } => {
                let plan: MigrationPlan = client.get(&format!("/migrations/{}", id)).await?;
                println!("{} ({})", plan.name.bold(), status_label(plan.status));
                for (index, phase) in plan.phases.iter().enumerate() {
                    let mark = if phase.completed { "✓".green() } else { "·".normal() };
                    println!(
                        "  {} phase {} {:<20} {:>3}% {:?}",
                        mark, index, phase.name, phase.rollout_percentage, phase.duration
                    );
                }
                if let Some(error) = &plan.error {
                    println!("  {} {}", "error:".red().bold(), error);
                }
                Ok(())
            }
            MigrationCommand::Execute { id } => {
                let _: Value = client.post(&format!("/migrations/{}/execute", id), &json!({})).await?;
                println!("{} migration {} executing", "ok".green().bold(), id);
                Ok(())
            }
            MigrationCommand::Abort { id } => {
                let _: Value = client.post(&format!("/migrations/{}/abort", id), &json!({})).await?;
                println!("{} migration {} aborting", "ok".yellow().bold(), id);
                Ok(())
            }
            MigrationCommand::Rollback { id } => {
                let plan: MigrationPlan =
                    client.post(&format!("/migrations/{}/rollback", id), &json!({})).await?;
                println!("{} migration {} rolled back", "ok".green().bold(), plan.id);
                Ok(())
            }
        }
    }
}

fn status_label(status: MigrationStatus) -> colored::ColoredString {
    match status {
        MigrationStatus::Planned => "planned".normal(),
        MigrationStatus::InProgress => "in progress".yellow(),
        MigrationStatus::Completed => "completed".green(),
        MigrationStatus::Failed => "failed".red(),
        MigrationStatus::RolledBack => "rolled back".cyan(),
    }
}
