use crate::api::{FetchError, StatusClient};
use crate::config::Config;
use crate::error::PollError;
use crate::output::{emit_data, error_payload, OutputFormat};
use crate::poller::{PollConfig, Poller};
use crate::proj::{project, StatusMatcher};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "repoll",
    about = "Poll an endpoint with exponential backoff until it reaches a terminal state",
    disable_help_subcommand = true,
    after_help = r#"Examples:
  repoll watch https://api.example.com/jobs/42
  repoll watch https://api.example.com/jobs/42 --field job.state --pending queued --pending running
  repoll watch https://api.example.com/jobs/42 --max-duration-ms 60000 --json --fields job.result
  REPOLL_TOKEN=... repoll util inspect
  repoll config set max_delay_ms 30000"#
)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// JSON output
    #[arg(long, global = true)]
    pub json: bool,
    /// Raw output (compact JSON body)
    #[arg(long, global = true)]
    pub raw: bool,
    /// Fields selection (dot paths)
    #[arg(long, global = true)]
    pub fields: Vec<String>,
    /// Per-request timeout seconds
    #[arg(long, global = true, default_value_t = crate::config::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
    /// Bearer token sent with every request
    #[arg(long, global = true)]
    pub token: Option<String>,
    /// Verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,
    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,
    /// Color control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ColorChoice {
    Always,
    Auto,
    Never,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll a JSON endpoint until its status leaves the pending set
    Watch(WatchArgs),
    Config(ConfigCmd),
    Util(UtilCmd),
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Status endpoint
    pub url: String,
    /// Dot path of the status field in the response body
    #[arg(long, default_value = "status")]
    pub field: String,
    /// Status value that means "keep polling" (repeatable)
    #[arg(long = "pending", default_value = "pending")]
    pub pending: Vec<String>,
    #[arg(long = "initial-delay-ms")]
    pub initial_delay_ms: Option<u64>,
    #[arg(long = "max-delay-ms")]
    pub max_delay_ms: Option<u64>,
    #[arg(long = "max-duration-ms")]
    pub max_duration_ms: Option<u64>,
    /// Upper bound of the random delay added to every wait; 0 disables it
    #[arg(long = "max-jitter-ms")]
    pub max_jitter_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ConfigCmd {
    #[command(subcommand)]
    sub: ConfigSub,
}
#[derive(Subcommand, Debug)]
pub enum ConfigSub {
    Set { key: String, value: String },
    Get { key: String },
    Path,
}

#[derive(Args, Debug)]
pub struct UtilCmd {
    #[command(subcommand)]
    sub: UtilSub,
}
#[derive(Subcommand, Debug)]
pub enum UtilSub {
    /// Show effective settings
    Inspect,
}

pub async fn run(cli: Cli) -> Result<()> {
    let cfg = Config::load().context("load config")?;

    match &cli.command {
        // Edits the file as stored; env and flag overrides are never persisted.
        Commands::Config(cmd) => run_config(cmd, cfg).await,
        Commands::Watch(args) => run_watch(args, effective(cfg, &cli), &cli).await,
        Commands::Util(cmd) => run_util(cmd, effective(cfg, &cli), &cli).await,
    }
}

fn effective(mut cfg: Config, cli: &Cli) -> Config {
    cfg.apply_env();
    cfg.apply_cli(cli);
    cfg
}

fn fmt_from_cli(cli: &Cli) -> OutputFormat {
    if cli.raw {
        OutputFormat::Raw
    } else if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Yaml
    }
}

async fn run_watch(args: &WatchArgs, cfg: Config, cli: &Cli) -> Result<()> {
    let url = Url::parse(&args.url).with_context(|| format!("invalid url: {}", args.url))?;
    let client = StatusClient::new(&cfg)?;
    let matcher = StatusMatcher::new(args.field.clone(), args.pending.clone());
    let poll_cfg = PollConfig::new(|body: &JsonValue| matcher.is_pending(body))
        .with_backoff(cfg.backoff());

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping poll");
                cancel.cancel();
            }
        }
    });

    info!(%url, field = matcher.path(), "polling");
    let poller = Poller::new().with_cancellation(cancel);
    let result = poller.poll(|| client.fetch_json(&url), &poll_cfg).await;
    interrupt.abort();

    match result {
        Ok(body) => emit_projected(cli, body),
        Err(err) => Err(poll_failure(&err)),
    }
}

/// Maps a poll failure to the structured error the CLI prints.
pub fn poll_failure(err: &PollError<FetchError>) -> anyhow::Error {
    let message = match err {
        PollError::Operation(_) => "could not check status",
        PollError::Timeout { .. } => "operation did not complete in time",
        PollError::Cancelled { .. } => "polling was cancelled",
        PollError::InvalidConfig(_) => "invalid poll settings",
    };
    error_payload(err.kind(), message, &err.to_string())
}

async fn run_config(cmd: &ConfigCmd, mut cfg: Config) -> Result<()> {
    match &cmd.sub {
        ConfigSub::Set { key, value } => {
            cfg.set(key, value)?;
            cfg.save()?;
            emit_data(&OutputFormat::Yaml, &serde_json::json!({"status":"ok"}))
        }
        ConfigSub::Get { key } => {
            let v = cfg.get(key).unwrap_or_default();
            emit_data(&OutputFormat::Raw, &JsonValue::String(v))
        }
        ConfigSub::Path => {
            emit_data(&OutputFormat::Raw, &JsonValue::String(cfg.path()?.display().to_string()))
        }
    }
}

async fn run_util(cmd: &UtilCmd, cfg: Config, cli: &Cli) -> Result<()> {
    match &cmd.sub {
        UtilSub::Inspect => emit_data(&fmt_from_cli(cli), &build_inspect(&cfg)),
    }
}

pub fn build_inspect(cfg: &Config) -> JsonValue {
    let (source, present) = cfg.token_source_with_presence();
    let b = cfg.backoff();
    serde_json::json!({
        "config_path": cfg.path().ok().map(|p| p.display().to_string()),
        "token": { "source": source, "present": present },
        "timeout": cfg.timeout_secs,
        "initial_delay_ms": b.initial_delay.as_millis() as u64,
        "max_delay_ms": b.max_delay.as_millis() as u64,
        "max_duration_ms": b.max_duration.as_millis() as u64,
        "max_jitter_ms": b.max_jitter.as_millis() as u64,
    })
}

fn emit_projected(cli: &Cli, data: JsonValue) -> Result<()> {
    let fmt = fmt_from_cli(cli);
    let projected = project(&data, &cli.fields);
    emit_data(&fmt, &projected)
}
