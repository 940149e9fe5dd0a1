//! CLI command definitions and handlers

use crate::local::{discover_platforms, LocalProfileCapability, LocalProfileConnector};
use crate::render::{render_actions, render_history, render_report};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use footprint_core::config::AuditConfig;
use footprint_core::model::{ActionState, Platform, RemediationAction};
use footprint_engine::{AuditEngine, ConnectorRegistry};
use footprint_inference::{KeywordProvider, ProviderRegistry};
use footprint_remediation::CapabilityRegistry;
use footprint_store::{PersistenceBackend, ReportStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Main CLI structure
#[derive(Parser)]
#[command(name = "footprint")]
#[command(about = "Privacy audit of a subject's public digital footprint")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Scan local profiles, score the risk and plan remediation
    Scan {
        /// Subject being audited
        #[arg(short, long)]
        subject: String,

        /// Directory containing <platform>.json profiles
        #[arg(short, long)]
        profiles: PathBuf,

        /// Platforms to scan (default: every profile present in the directory)
        #[arg(long = "platform")]
        platforms: Vec<Platform>,

        /// YAML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report database (sqlite URL or path, "memory" for none)
        #[arg(short, long, default_value = "memory")]
        database: String,

        /// Schedule and execute the planned actions
        #[arg(long)]
        remediate: bool,

        /// Modify the profile files instead of a dry run
        #[arg(long, requires = "remediate")]
        live: bool,

        /// Seconds to wait before planned actions run
        #[arg(long, default_value = "0")]
        delay_secs: u64,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show stored reports for a subject
    History {
        /// Subject being audited
        #[arg(short, long)]
        subject: String,

        /// Report database (sqlite URL or path)
        #[arg(short, long)]
        database: String,

        /// Maximum number of reports
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show version and default configuration
    Info,
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    JsonPretty,
}

/// Command execution result
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Options for [`CommandExecutor::scan`]
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub subject: String,
    pub profiles: PathBuf,
    pub platforms: Vec<Platform>,
    pub config: Option<PathBuf>,
    pub database: String,
    pub remediate: bool,
    pub live: bool,
    pub delay_secs: u64,
    pub format: OutputFormat,
}

/// Load configuration from YAML or JSON; no file means defaults
pub fn load_config(path: Option<&Path>) -> Result<AuditConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_yaml::from_str::<AuditConfig>(&raw)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => AuditConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Execute CLI commands
#[derive(Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: Commands) -> Result<CommandResult> {
        match command {
            Commands::Scan {
                subject,
                profiles,
                platforms,
                config,
                database,
                remediate,
                live,
                delay_secs,
                format,
            } => {
                self.scan(ScanOptions {
                    subject,
                    profiles,
                    platforms,
                    config,
                    database,
                    remediate,
                    live,
                    delay_secs,
                    format,
                })
                .await
            }
            Commands::History {
                subject,
                database,
                limit,
                format,
            } => self.history(&subject, &database, limit, format).await,
            Commands::Info => self.info(),
        }
    }

    pub async fn scan(&self, options: ScanOptions) -> Result<CommandResult> {
        let mut config = load_config(options.config.as_deref())?;
        if options.remediate {
            config.remediation.auto_schedule = true;
            config.remediation.dry_run = !options.live;
            config.remediation.default_delay_secs = options.delay_secs;
        }

        let platforms = if options.platforms.is_empty() {
            discover_platforms(&options.profiles)
        } else {
            options.platforms.clone()
        };
        if platforms.is_empty() {
            return Ok(CommandResult {
                success: false,
                message: format!("No profiles found in {}", options.profiles.display()),
                data: None,
            });
        }

        let mut connectors = ConnectorRegistry::new();
        let mut capabilities = CapabilityRegistry::new();
        for platform in &platforms {
            connectors.register(Arc::new(LocalProfileConnector::new(&options.profiles, *platform)));
            capabilities.register(Arc::new(LocalProfileCapability::new(&options.profiles, *platform)));
        }
        let providers = ProviderRegistry::new().with_provider(Arc::new(KeywordProvider::new()));
        let store = PersistenceBackend::from_url(&options.database).open().await?;

        let engine = AuditEngine::new(config, connectors, providers, capabilities, store)?;
        let report = engine.run_scan(&options.subject, &platforms).await?;

        let executed = if options.remediate {
            drive_remediation(&engine, &options.subject).await
        } else {
            Vec::new()
        };

        let output = match options.format {
            OutputFormat::Text => {
                let mut text = render_report(&report);
                if !executed.is_empty() {
                    text.push_str("\nExecuted:\n");
                    text.push_str(&render_actions(&executed));
                }
                text
            }
            OutputFormat::Json => serde_json::to_string(&serde_json::json!({
                "report": report,
                "executed": executed,
            }))?,
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&serde_json::json!({
                "report": report,
                "executed": executed,
            }))?,
        };
        println!("{}", output);

        let failed = executed
            .iter()
            .filter(|a| a.state == ActionState::Failed)
            .count();
        Ok(CommandResult {
            success: failed == 0,
            message: format!(
                "Scanned {} platform(s), {} action(s) executed, {} failed",
                platforms.len(),
                executed.len(),
                failed
            ),
            data: Some(serde_json::json!({ "report": report, "executed": executed })),
        })
    }

    pub async fn history(
        &self,
        subject: &str,
        database: &str,
        limit: usize,
        format: OutputFormat,
    ) -> Result<CommandResult> {
        let store = PersistenceBackend::from_url(database).open().await?;
        let reports = store.load(subject, limit).await?;

        let output = match format {
            OutputFormat::Text => render_history(&reports),
            OutputFormat::Json => serde_json::to_string(&reports)?,
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&reports)?,
        };
        println!("{}", output);

        Ok(CommandResult {
            success: true,
            message: format!("Found {} report(s)", reports.len()),
            data: Some(serde_json::json!({ "reports": reports })),
        })
    }

    pub fn info(&self) -> Result<CommandResult> {
        let config = AuditConfig::default();
        println!("footprint {}", env!("CARGO_PKG_VERSION"));
        println!("\nDefault configuration:");
        println!("{}", serde_yaml::to_string(&config)?);

        Ok(CommandResult {
            success: true,
            message: "System information".to_string(),
            data: Some(serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "config": config,
            })),
        })
    }
}

/// Run scheduled actions for `subject` as they come due, until none remain scheduled
async fn drive_remediation(engine: &AuditEngine, subject: &str) -> Vec<RemediationAction> {
    let mut executed = Vec::new();
    loop {
        let next_due = engine
            .executor()
            .actions_for(subject)
            .await
            .into_iter()
            .filter(|a| a.state == ActionState::Scheduled)
            .filter_map(|a| a.scheduled_for)
            .min();
        let Some(next_due) = next_due else {
            break;
        };

        let wait = (next_due - Utc::now()).to_std().unwrap_or_default();
        if !wait.is_zero() {
            info!("Waiting {}s for the next scheduled action", wait.as_secs());
            tokio::time::sleep(wait).await;
        }
        let batch = engine.execute_due_actions(Utc::now()).await;
        debug!("Executed {} action(s)", batch.len());
        executed.extend(batch);
    }
    executed
}
