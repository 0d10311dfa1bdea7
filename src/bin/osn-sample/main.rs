//! Binary entry point for the OSN sampler.
#![forbid(unsafe_code)]

mod config;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use osn_sampler::{
    cli::{load_tokens, open_client, open_recorder, run_job, CliError, SamplingJob},
    client::{ClientMetrics, ClientOptions, HttpOptions, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE},
    sampler::{SampleReport, SamplerKind, StopSignal, UniformOptions, DEFAULT_ITERATIONS},
    types::UserId,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use config::{CliConfig, ConfigSummary};

const DEFAULT_OUTPUT: &str = "samples.txt";

#[derive(Parser, Debug)]
#[command(
    name = "osn-sample",
    version,
    about = "Sample a social network graph through its rate-limited API",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "OSN_SAMPLE_CONFIG",
        value_name = "FILE",
        help = "Config file (defaults to the user config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        value_name = "FILTER",
        help = "Log filter when RUST_LOG is unset (e.g. info, osn_sampler=debug)"
    )]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct RunCmd {
    #[arg(long, value_enum, help = "Sampling strategy")]
    sampler: SamplerArg,

    #[arg(long, value_name = "USER", help = "Root user ID (UNI: first ID or range start)")]
    root: u64,

    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_ITERATIONS,
        help = "Number of samples to collect"
    )]
    iterations: u64,

    #[arg(
        long,
        value_name = "USER",
        help = "Inclusive range end; switches UNI to uniform draws over [root, end]"
    )]
    end: Option<u64>,

    #[arg(
        long,
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set,
        help = "UNI: advance the counter on probes that find no user"
    )]
    count_misses: bool,

    #[arg(long, short, value_name = "FILE", help = "Output file for sample records")]
    output: Option<PathBuf>,

    #[arg(long, help = "Append to the output file instead of truncating it")]
    append: bool,

    #[arg(long, help = "Seed for reproducible random choices")]
    seed: Option<u64>,

    #[arg(
        long,
        env = "OSN_SAMPLE_TOKENS",
        value_name = "TOKEN,TOKEN",
        value_delimiter = ',',
        hide_env_values = true,
        help = "Access tokens in rotation order"
    )]
    tokens: Vec<String>,

    #[arg(long, value_name = "FILE", help = "File with one access token per line")]
    tokens_file: Option<PathBuf>,

    #[arg(long, value_name = "URL", help = "API base URL")]
    base_url: Option<String>,

    #[arg(long, value_name = "SECS", help = "Per-request timeout")]
    timeout_secs: Option<u64>,

    #[arg(long, value_name = "N", help = "Retries after transient network failures")]
    max_transient_retries: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    #[command(about = "Print the config file location")]
    Path,
    #[command(about = "Print the resolved config with tokens hidden")]
    Show,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Run a sampler and record what it finds")]
    Run(RunCmd),

    #[command(subcommand, about = "Inspect the config file")]
    Config(ConfigCmd),
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SamplerArg {
    Bfs,
    Rw,
    Mhrw,
    Uni,
}

impl From<SamplerArg> for SamplerKind {
    fn from(value: SamplerArg) -> Self {
        match value {
            SamplerArg::Bfs => SamplerKind::Bfs,
            SamplerArg::Rw => SamplerKind::Rw,
            SamplerArg::Mhrw => SamplerKind::Mhrw,
            SamplerArg::Uni => SamplerKind::Uni,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    report: SampleReport,
    client: ClientMetrics,
    output: PathBuf,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.clone())?;
    install_tracing_subscriber(cli.log_level.as_deref().or(config.log_level()))?;

    match cli.command {
        Command::Run(cmd) => {
            let summary = run_sampling(cmd, &config).await?;
            emit(cli.format, &summary, || print_run_text(&summary))?;
        }
        Command::Config(ConfigCmd::Path) => match config.path() {
            Some(path) => println!("{}", path.display()),
            None => println!("no config directory available"),
        },
        Command::Config(ConfigCmd::Show) => {
            let summary = config.redacted();
            emit(cli.format, &summary, || print_config_text(&summary))?;
        }
    }
    Ok(())
}

async fn run_sampling(cmd: RunCmd, config: &CliConfig) -> Result<RunSummary, Box<dyn Error>> {
    let tokens = resolve_tokens(&cmd, config)?;
    let http = HttpOptions {
        base_url: cmd
            .base_url
            .clone()
            .or_else(|| config.base_url().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        timeout: Duration::from_secs(cmd.timeout_secs.or(config.timeout_secs()).unwrap_or(15)),
    };
    let defaults = ClientOptions::default();
    let client_opts = ClientOptions {
        page_size: config.page_size().unwrap_or(DEFAULT_PAGE_SIZE),
        max_transient_retries: cmd
            .max_transient_retries
            .or(config.max_transient_retries())
            .unwrap_or(defaults.max_transient_retries),
        transient_backoff: config
            .backoff_ms()
            .map(Duration::from_millis)
            .unwrap_or(defaults.transient_backoff),
    };
    let output = cmd
        .output
        .clone()
        .or_else(|| config.output_path().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let job = SamplingJob {
        sampler: cmd.sampler.into(),
        root: UserId(cmd.root),
        iterations: cmd.iterations,
        end: cmd.end.map(UserId),
        uniform: UniformOptions {
            count_misses: cmd.count_misses,
        },
        seed: cmd.seed,
    };

    let stop = StopSignal::new();
    let watcher = tokio::spawn({
        let stop = stop.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                stop.stop();
            }
        }
    });

    let append = cmd.append;
    let target = output.clone();
    // The blocking client owns its own runtime and must live off the async workers.
    let outcome = tokio::task::spawn_blocking(move || -> Result<_, CliError> {
        let mut client = open_client(tokens, http, client_opts)?;
        let recorder = open_recorder(&target, append)?;
        let report = run_job(&job, &mut client, recorder, stop)?;
        Ok((report, client.metrics().clone()))
    })
    .await;
    watcher.abort();

    let (report, client) = outcome??;
    Ok(RunSummary {
        report,
        client,
        output,
    })
}

fn resolve_tokens(cmd: &RunCmd, config: &CliConfig) -> Result<Vec<String>, CliError> {
    if !cmd.tokens.is_empty() {
        return Ok(cmd.tokens.clone());
    }
    if let Some(path) = cmd.tokens_file.as_deref().or(config.tokens_file()) {
        return load_tokens(path);
    }
    Ok(config.tokens().to_vec())
}

fn install_tracing_subscriber(level: Option<&str>) -> Result<(), Box<dyn Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level.unwrap_or("info"))
            .map_err(|err| format!("invalid log level: {err}"))?,
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| format!("failed to install logger: {err}"))?;
    Ok(())
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_run_text(summary: &RunSummary) {
    let report = &summary.report;
    println!(
        "{} finished from {} in {:.2} ms (final_counter={} target={} stopped={})",
        report.sampler,
        report.root,
        report.duration_ms,
        report.final_counter,
        report.target,
        report.stopped
    );
    println!(
        "  recorded={} misses={} rejections={} duplicates_skipped={}",
        report.recorded, report.misses, report.rejections, report.duplicates_skipped
    );
    let client = &summary.client;
    println!(
        "Client: requests={} rate_limited={} rotations={} discards={} transient={} not_found={} malformed={} upstream_errors={}",
        client.requests,
        client.rate_limited,
        client.rotations,
        client.discards,
        client.transient_failures,
        client.not_found,
        client.malformed,
        client.upstream_errors
    );
    println!("Output: {}", summary.output.display());
}

fn print_config_text(summary: &ConfigSummary) {
    let path = summary
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".into());
    println!("Config: {path} (loaded={})", summary.loaded);
    println!(
        "  log_level={}",
        summary.log_level.as_deref().unwrap_or("info")
    );
    println!(
        "  tokens={} tokens_file={}",
        summary.tokens,
        summary
            .tokens_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".into())
    );
    println!(
        "  base_url={} timeout_secs={} page_size={}",
        summary.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
        summary.timeout_secs.unwrap_or(15),
        summary.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    );
    println!(
        "  max_transient_retries={} backoff_ms={}",
        summary
            .max_transient_retries
            .map(|v| v.to_string())
            .unwrap_or_else(|| "default".into()),
        summary
            .backoff_ms
            .map(|v| v.to_string())
            .unwrap_or_else(|| "default".into())
    );
    println!(
        "  output={}",
        summary
            .output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| DEFAULT_OUTPUT.into())
    );
}
