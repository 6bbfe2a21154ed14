// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde_json::{json, Value};

use crate::client::ApiClient;
use aegis_control_core::domain::flag::FeatureFlag;

#[derive(Subcommand)]
pub enum FlagCommand {
    /// Create or replace a feature flag
    Create {
        id: String,
        /// Human-readable name (defaults to the id)
        #[arg(long)]
        name: Option<String>,
        /// Rollout percentage, 0-100
        #[arg(long, default_value = "100")]
        percentage: u8,
        /// Create the flag disabled
        #[arg(long)]
        disabled: bool,
        /// Restrict to specific subject ids (repeatable)
        #[arg(long = "subject")]
        subjects: Vec<String>,
        /// Restrict to specific account tiers (repeatable)
        #[arg(long = "tier")]
        tiers: Vec<String>,
        /// Expiry timestamp (RFC 3339)
        #[arg(long)]
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    },

    /// List all flags
    List,

    /// Show one flag
    Get { id: String },

    /// Evaluate a flag for a subject
    Evaluate {
        id: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        tier: Option<String>,
    },
}

impl FlagCommand {
    pub async fn run(self, client: &ApiClient) -> Result<()> {
        match self {
            FlagCommand::Create {
                id,
                name,
                percentage,
                disabled,
                subjects,
                tiers,
                expires_at,
            } => {
                let flag: FeatureFlag = client
                    .post(
                        "/flags",
                        &json!({
                            "id": id,
                            "name": name.unwrap_or_else(|| id.clone()),
                            "enabled": !disabled,
                            "rollout_percentage": percentage,
                            "target_subjects": subjects,
                            "target_tiers": tiers,
                            "expires_at": expires_at,
                        }),
                    )
                    .await?;
                println!(
                    "{} flag {} at {}%",
                    "ok".green().bold(),
                    flag.id,
                    flag.rollout_percentage
                );
                Ok(())
            }
            FlagCommand::List => {
                let flags: Vec<FeatureFlag> = client.get("/flags").await?;
                if flags.is_empty() {
                    println!("no flags defined");
                    return Ok(());
                }
                for flag in flags {
                    let state = if flag.enabled { "on".green() } else { "off".red() };
                    println!("{:<32} {:>4} {:>3}%", flag.id.bold(), state, flag.rollout_percentage);
                }
                Ok(())
            }
            FlagCommand::Get { id } => {
                let flag: FeatureFlag = client.get(&format!("/flags/{}", id)).await?;
                println!("{}", serde_json::to_string_pretty(&flag)?);
                Ok(())
            }
            FlagCommand::Evaluate { id, subject, tier } => {
                let mut query = Vec::new();
                if let Some(subject) = &subject {
                    query.push(format!("subject={}", subject));
                }
                if let Some(tier) = &tier {
                    query.push(format!("tier={}", tier));
                }
                let path = if query.is_empty() {
                    format!("/flags/{}/evaluate", id)
                } else {
                    format!("/flags/{}/evaluate?{}", id, query.join("&"))
                };

                let result: Value = client.get(&path).await?;
                let enabled = result["enabled"].as_bool().unwrap_or(false);
                let verdict = if enabled { "enabled".green() } else { "disabled".red() };
                println!("{} is {} for {}", id, verdict, subject.as_deref().unwrap_or("<anonymous>"));
                Ok(())
            }
        }
    }
}
