//! disk-heal: grow EBS volumes and filesystems when a disk usage alert fires.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cloud::aws::{Aws, AwsConnector};
use disk_heal::config::RemediationConfig;
use disk_heal::server::{build_router, handle_body, ServerState};
use disk_heal::workflow::Remediator;
use notify::SlackChannel;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "disk-heal")]
#[command(about = "Automated remediation of low disk space alerts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Slack bot token used for the remediation thread
    #[arg(long, env = "SLACK_BOT_TOKEN", global = true, hide_env_values = true)]
    slack_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the alert webhook
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,

        /// Bearer token callers must present
        #[arg(long, env = "TRIGGER_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Handle one webhook payload and print the response
    Run {
        /// Payload file, or `-` for stdin
        #[arg(long)]
        payload: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let config = Arc::new(RemediationConfig::from_env().context("invalid configuration")?);
    let remediator = build_remediator(config, cli.slack_token).await;

    match cli.command {
        Commands::Serve { port, token } => serve(remediator, token, port).await,
        Commands::Run { payload } => {
            let body = read_payload(&payload)?;
            let response = handle_body(&remediator, &body).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

async fn build_remediator(
    config: Arc<RemediationConfig>,
    slack_token: Option<String>,
) -> Remediator {
    let aws = Arc::new(Aws::from_env().await);
    let chat = Arc::new(SlackChannel::new(slack_token, config.chat_channel.clone()));

    info!(
        alert = %config.expected_alert_name,
        device = %config.target_device,
        threshold = config.threshold_percent,
        increase_gib = config.increase_gib,
        "Loaded remediation config"
    );

    Remediator::new(config, aws.clone(), Arc::new(AwsConnector), chat, aws)
}

async fn serve(remediator: Remediator, token: String, port: u16) -> Result<()> {
    anyhow::ensure!(!token.trim().is_empty(), "TRIGGER_TOKEN must not be empty");

    let app = build_router(Arc::new(ServerState { remediator, token }));
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(addr = %addr, "Starting disk alert webhook server");
    axum::serve(listener, app).await.context("server error")
}

fn read_payload(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut body = Vec::new();
        std::io::stdin()
            .read_to_end(&mut body)
            .context("failed to read payload from stdin")?;
        return Ok(body);
    }
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}
