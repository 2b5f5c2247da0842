use crate::cmd::{actor, open_desk};
use crate::output::{print_json, print_table, timestamp, truncate};
use anyhow::Context;
use clap::Subcommand;
use incident_core::config::Config;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand tree
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum RunbookSubcommand {
    /// List registered runbooks
    List,

    /// Show the steps of one runbook
    Show {
        /// Runbook category (e.g. database_outage)
        category: String,
    },

    /// Execute a runbook against an incident, recording every step
    Run {
        /// Incident ID
        id: String,

        /// Runbook category (e.g. database_outage)
        category: String,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    subcommand: RunbookSubcommand,
    actor_flag: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    match subcommand {
        RunbookSubcommand::List => {
            let registry = Config::load(root)
                .context("failed to load config")?
                .registry()?;
            if json {
                return print_json(&registry.iter().collect::<Vec<_>>());
            }
            print_table(
                &["CATEGORY", "STEPS", "TITLE"],
                registry
                    .iter()
                    .map(|rb| {
                        vec![
                            rb.key.to_string(),
                            rb.len().to_string(),
                            truncate(&rb.title, 50),
                        ]
                    })
                    .collect(),
            );
            Ok(())
        }

        RunbookSubcommand::Show { category } => {
            let registry = Config::load(root)
                .context("failed to load config")?
                .registry()?;
            let runbook = registry.lookup(&category)?;
            if json {
                return print_json(runbook);
            }
            println!("{} ({})", runbook.title, runbook.key);
            for (i, step) in runbook.steps.iter().enumerate() {
                println!("  {}. {step}", i + 1);
            }
            Ok(())
        }

        RunbookSubcommand::Run { id, category } => {
            let (config, desk) = open_desk(root)?;
            let who = actor(actor_flag, &config);
            let execution = desk
                .execute_runbook(&id, &category, &who)
                .with_context(|| format!("failed to run '{category}' on {id}"))?;
            if json {
                return print_json(&execution);
            }
            println!(
                "ran runbook {} on {id} ({} steps)",
                execution.category,
                execution.steps.len()
            );
            for marker in &execution.steps {
                println!(
                    "  [{}] #{} {}",
                    timestamp(marker.completed_at),
                    marker.event_seq,
                    marker.step
                );
            }
            Ok(())
        }
    }
}
