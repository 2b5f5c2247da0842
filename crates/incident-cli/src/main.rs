mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, incident::Transition, runbook::RunbookSubcommand,
    severity::SeveritySubcommand,
};
use incident_core::IncidentError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "incident",
    about = "Incident commander: timelines, runbooks and SLA tracking",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .incident/)
    #[arg(long, global = true, env = "INCIDENT_ROOT")]
    root: Option<PathBuf>,

    /// Who is acting (default: config default_actor)
    #[arg(long, global = true, env = "INCIDENT_ACTOR")]
    actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .incident/ and a default config
    Init,

    /// Open a new incident
    Open {
        /// Incident ID (e.g. INC-42)
        id: String,

        /// Severity: sev1 | sev2 | sev3 | sev4
        #[arg(long, short = 's')]
        severity: String,
    },

    /// Record that a responder has picked up the incident
    Ack { id: String },

    /// Change the severity of an incident
    Escalate {
        id: String,

        /// New severity: sev1 | sev2 | sev3 | sev4
        #[arg(long, short = 's')]
        severity: String,
    },

    /// Move an open incident to MITIGATED
    Mitigate { id: String },

    /// Move a mitigated incident to RESOLVED
    Resolve { id: String },

    /// Move a mitigated incident back to OPEN
    Reopen { id: String },

    /// Append a free-form note to the timeline
    Note {
        id: String,

        /// Note text
        text: String,

        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Show an incident and its timeline
    Show { id: String },

    /// List incidents
    List {
        /// Filter: active | all | open | mitigated | resolved
        #[arg(long, default_value = "active")]
        status: String,
    },

    /// Check an incident against its response and escalation targets
    Sla {
        id: String,

        /// Evaluate at this RFC 3339 time instead of now
        #[arg(long)]
        at: Option<String>,
    },

    /// Browse and execute runbooks
    Runbook {
        #[command(subcommand)]
        subcommand: RunbookSubcommand,
    },

    /// Inspect the severity catalog
    Severity {
        #[command(subcommand)]
        subcommand: SeveritySubcommand,
    },

    /// Validate or print the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let actor = cli.actor.as_deref();
    let json = cli.json;

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Open { id, severity } => cmd::incident::open(&root, &id, &severity, actor, json),
        Commands::Ack { id } => {
            cmd::incident::transition(&root, &id, Transition::Acknowledge, actor, json)
        }
        Commands::Escalate { id, severity } => {
            cmd::incident::escalate(&root, &id, &severity, actor, json)
        }
        Commands::Mitigate { id } => {
            cmd::incident::transition(&root, &id, Transition::Mitigate, actor, json)
        }
        Commands::Resolve { id } => {
            cmd::incident::transition(&root, &id, Transition::Resolve, actor, json)
        }
        Commands::Reopen { id } => {
            cmd::incident::transition(&root, &id, Transition::Reopen, actor, json)
        }
        Commands::Note { id, text, tags } => {
            cmd::incident::note(&root, &id, &text, tags, actor, json)
        }
        Commands::Show { id } => cmd::incident::show(&root, &id, json),
        Commands::List { status } => cmd::incident::list(&root, &status, json),
        Commands::Sla { id, at } => cmd::incident::sla(&root, &id, at.as_deref(), json),
        Commands::Runbook { subcommand } => cmd::runbook::run(&root, subcommand, actor, json),
        Commands::Severity { subcommand } => cmd::severity::run(&root, subcommand, json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

/// Distinct exit codes for the domain errors scripts care about.
fn exit_code(err: &anyhow::Error) -> i32 {
    let Some(domain) = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<IncidentError>())
    else {
        return 1;
    };
    match domain {
        IncidentError::UnknownSeverity(_) => 2,
        IncidentError::InvalidEvent(_) => 3,
        IncidentError::DuplicateIncident(_) => 4,
        IncidentError::InvalidTransition { .. } => 5,
        IncidentError::UnknownRunbook(_) => 6,
        IncidentError::IncidentNotFound(_) => 7,
        _ => 1,
    }
}
