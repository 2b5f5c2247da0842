use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use incident_core::config::Config;
use std::path::Path;

#[derive(Subcommand)]
pub enum SeveritySubcommand {
    /// Show response, escalation and update targets per severity
    List,
}

pub fn run(root: &Path, subcommand: SeveritySubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        SeveritySubcommand::List => list(root, json),
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let catalog = config.catalog()?;

    if json {
        return print_json(&catalog.levels());
    }

    print_table(
        &["SEVERITY", "LABEL", "RESPONSE", "ESCALATION", "UPDATES", "STAKEHOLDERS"],
        catalog
            .levels()
            .iter()
            .map(|l| {
                vec![
                    l.severity.to_string(),
                    l.severity.label().to_string(),
                    minutes(l.response_minutes),
                    minutes(l.escalation_minutes),
                    minutes(l.update_interval_minutes),
                    l.stakeholders.iter().cloned().collect::<Vec<_>>().join(", "),
                ]
            })
            .collect(),
    );
    Ok(())
}

fn minutes(m: i64) -> String {
    if m >= 60 && m % 60 == 0 {
        format!("{}h", m / 60)
    } else {
        format!("{m}m")
    }
}
