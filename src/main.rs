use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use complaint_moderator::config::{self, ModerationConfig};
use complaint_moderator::db::{self, NewComplaint, SqliteComplaintStore};
use complaint_moderator::pipeline::batch::{
    run_batch, BatchOptions, BatchStatusEvent, Collaborators, FsArchiveStore, ModerationError,
    Notifier, RunFailure, RunMetrics, TracingNotifier, WebhookNotifier,
};
use complaint_moderator::pipeline::moderation::ModerationEngine;
use complaint_moderator::pipeline::normalize::XmlTextNormalizer;
use complaint_moderator::pipeline::secondary::{OllamaAnalyzer, OllamaClient};
use complaint_moderator::pipeline::signals;

/// Batch moderation of stored complaints
#[derive(Parser, Debug)]
#[command(name = "complaint-moderator", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Moderate one batch of pending complaints and print the run summary
    Run {
        /// Complaints to take in this run (at most 200)
        #[arg(long, default_value_t = 50)]
        batch_size: u32,

        /// Complaint workflow status to select
        #[arg(long, default_value = "pending")]
        status_filter: String,

        /// Let the secondary analyzer decide every complaint
        #[arg(long)]
        force_secondary: bool,

        /// Invocation options as a JSON event; overrides the flags above
        #[arg(long)]
        event: Option<String>,
    },

    /// Insert a complaint from an XML file
    Seed {
        xml_file: PathBuf,

        #[arg(long)]
        user: String,

        /// Defaults to the document's <priority>, then "normal"
        #[arg(long)]
        priority: Option<String>,

        /// Defaults to the document's <category>, then "general"
        #[arg(long)]
        category: Option<String>,
    },

    /// Create or upgrade the database schema
    Migrate,
}

fn main() -> ExitCode {
    complaint_moderator::init_tracing();
    let cli = Cli::parse();

    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let config = match ModerationConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            print_json(&RunFailure::new(e, RunMetrics::default()));
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Run {
            batch_size,
            status_filter,
            force_secondary,
            event,
        } => {
            let options = match event {
                Some(json) => BatchOptions::from_event(&json)
                    .map_err(|e| ModerationError::Configuration(format!("invalid event: {e}"))),
                None => Ok(BatchOptions {
                    batch_size,
                    status_filter,
                    force_secondary_analysis: force_secondary,
                }
                .clamped()),
            };
            options.and_then(|options| run(&config, &options))
        }
        Command::Seed {
            xml_file,
            user,
            priority,
            category,
        } => seed(&config, &xml_file, &user, priority, category),
        Command::Migrate => migrate(&config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            print_json(&RunFailure::new(e, RunMetrics::default()));
            ExitCode::FAILURE
        }
    }
}

fn run(config: &ModerationConfig, options: &BatchOptions) -> Result<ExitCode, ModerationError> {
    let conn = db::open_database(&config.db_path)?;
    let store = SqliteComplaintStore::new(&conn);

    let loaded = signals::warm_up();
    tracing::debug!(entries = loaded, "Detector lexicons loaded");

    let client = OllamaClient::new(&config.ollama_url, config.secondary_timeout_secs)
        .map_err(|e| ModerationError::Configuration(e.to_string()))?;
    if !client.is_reachable() {
        tracing::warn!(url = %config.ollama_url, "Secondary analyzer not reachable; escalations will fall back");
    }
    let analyzer = OllamaAnalyzer::new(client, config.secondary_model_id.clone());

    let notifier: Box<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Box::new(
            WebhookNotifier::new(url, config.secondary_timeout_secs)
                .map_err(|e| ModerationError::Configuration(e.to_string()))?,
        ),
        None => Box::new(TracingNotifier),
    };
    let archive = FsArchiveStore::new(&config.archive_dir);
    let normalizer = XmlTextNormalizer;

    let collaborators = Collaborators {
        source: &store,
        normalizer: &normalizer,
        contexts: &store,
        analyzer: &analyzer,
        sink: &store,
        archive: &archive,
        notifier: notifier.as_ref(),
    };
    let engine = ModerationEngine::standard(config.severity_threshold);

    let progress = |event: BatchStatusEvent| {
        if let BatchStatusEvent::Progress { completed, total, record_id } = event {
            tracing::debug!(completed, total, complaint_id = record_id, "Batch progress");
        }
    };

    match run_batch(&engine, &collaborators, config, options, Some(&progress)) {
        Ok(summary) => {
            print_json(&summary);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            print_json(&failure);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn seed(
    config: &ModerationConfig,
    xml_file: &Path,
    user: &str,
    priority: Option<String>,
    category: Option<String>,
) -> Result<ExitCode, ModerationError> {
    let xml = std::fs::read_to_string(xml_file).map_err(|e| {
        ModerationError::Configuration(format!("cannot read {}: {e}", xml_file.display()))
    })?;

    let document = XmlTextNormalizer.parse_document(&xml);
    if document.is_none() {
        tracing::warn!(file = %xml_file.display(), "Document has no usable complaint text; it will fail processing");
    }

    let mut complaint = NewComplaint::new(user, &xml);
    if let Some(p) = priority.or_else(|| document.as_ref().map(|d| d.priority.clone())) {
        complaint.priority = p;
    }
    if let Some(c) = category.or_else(|| document.as_ref().map(|d| d.category.clone())) {
        complaint.category = c;
    }

    let conn = db::open_database(&config.db_path)?;
    let id = db::insert_complaint(&conn, &complaint)?;
    tracing::info!(complaint_id = id, "Complaint inserted");
    print_json(&serde_json::json!({ "id": id }));
    Ok(ExitCode::SUCCESS)
}

fn migrate(config: &ModerationConfig) -> Result<ExitCode, ModerationError> {
    let conn = db::open_database(&config.db_path)?;
    let tables = db::count_tables(&conn)?;
    print_json(&serde_json::json!({
        "database": config.db_path.display().to_string(),
        "tables": tables,
    }));
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Failed to encode output"),
    }
}
