// crates/grain-harness-cli/src/main.rs
// ============================================================================
// Module: Grain Harness CLI Entry Point
// Description: Command dispatcher for flow runs and fixture staging.
// Purpose: Run a flow fixture against a live runtime and report the verdict.
// Dependencies: clap, grain-harness, serde_json, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! `run` submits a fixture, collects its grains and prints a JSON summary on
//! stdout. `fetch` and `clean` manage the fixture staging directory, and
//! `config check` prints the effective configuration. Logs go to stderr.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod logging;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use grain_harness::CompletionReason;
use grain_harness::FlowContext;
use grain_harness::FlowDriver;
use grain_harness::FlowFixture;
use grain_harness::GrainCollector;
use grain_harness::HarnessConfig;
use grain_harness::HarnessError;
use grain_harness::RunReport;
use grain_harness::download;
use grain_harness::remove_tree;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "grain-harness", version, disable_help_subcommand = true)]
struct Cli {
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, value_name = "FILTER", global = true, default_value = "info")]
    log_level: String,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a flow fixture and validate its grains.
    Run(RunCommand),
    /// Download a fixture resource into a staging directory.
    Fetch(FetchCommand),
    /// Remove a staging directory tree.
    Clean(CleanCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
struct RunCommand {
    /// Flow fixture JSON file.
    #[arg(long, value_name = "PATH")]
    fixture: PathBuf,
    /// Node whose first output is tapped into the harness listener.
    #[arg(long, value_name = "NODE_ID")]
    tap: Option<String>,
    /// Exact number of grains required.
    #[arg(long, value_name = "COUNT")]
    expect: Option<u64>,
    /// Optional TOML config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Leave the flow deployed after the run.
    #[arg(long, action = ArgAction::SetTrue)]
    keep_flow: bool,
}

/// Arguments for the `fetch` command.
#[derive(Args, Debug)]
struct FetchCommand {
    /// Resource to download.
    #[arg(value_name = "URI")]
    uri: String,
    /// Staging directory, created if absent.
    #[arg(long, value_name = "DIR")]
    staging: PathBuf,
}

/// Arguments for the `clean` command.
#[derive(Args, Debug)]
struct CleanCommand {
    /// Directory tree to remove.
    #[arg(value_name = "DIR")]
    path: PathBuf,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load, validate and print the effective configuration.
    Check(ConfigCheckCommand),
}

/// Arguments for `config check`.
#[derive(Args, Debug)]
struct ConfigCheckCommand {
    /// Optional TOML config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying the message shown to the user.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level).map_err(CliError::new)?;
    match cli.command {
        Commands::Run(command) => command_run(command).await,
        Commands::Fetch(command) => command_fetch(&command).await,
        Commands::Clean(command) => command_clean(&command).await,
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes a fixture run and prints the summary.
async fn command_run(command: RunCommand) -> CliResult<ExitCode> {
    let mut config = load_config(command.config.as_deref())?;
    if command.keep_flow {
        config.keep_flow = true;
    }
    let fixture = FlowFixture::from_json_file(&command.fixture)
        .map_err(|err| CliError::new(format!("fixture load failed: {err}")))?;
    tracing::info!(
        fixture = %command.fixture.display(),
        label = %fixture.label,
        nodes = fixture.nodes.len(),
        "fixture loaded"
    );
    let driver =
        FlowDriver::new(config).map_err(|err| CliError::new(format!("run setup failed: {err}")))?;
    let mut collector = GrainCollector::from_config(driver.config());
    if let Some(count) = command.expect {
        collector = collector.expect_grains(count);
    }

    let tap = command.tap;
    let report = driver
        .run(|context| tapped_fixture(fixture, tap.as_deref(), context), &mut collector)
        .await
        .map_err(|err| CliError::new(format!("run failed: {err}")))?;
    // The end-marker path already checked the count.
    if report.completion.reason == CompletionReason::Stalled {
        collector
            .verify_count()
            .map_err(|reason| CliError::new(format!("run failed: {reason}")))?;
    }

    write_stdout_line(&run_summary(&report, &collector)?)
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Attaches the harness tap to `tap` when requested.
fn tapped_fixture(
    mut fixture: FlowFixture,
    tap: Option<&str>,
    context: &FlowContext,
) -> Result<FlowFixture, HarnessError> {
    if let Some(node) = tap {
        fixture.attach_ws_tap(node, &context.ws_url())?;
    }
    Ok(fixture)
}

/// Renders the run report plus collector totals as pretty JSON.
fn run_summary(report: &RunReport, collector: &GrainCollector) -> CliResult<String> {
    let mut summary = serde_json::to_value(report)
        .map_err(|err| CliError::new(format!("summary encode failed: {err}")))?;
    if let Some(object) = summary.as_object_mut() {
        object.insert("grains".to_string(), json!(collector.grains().len()));
        object.insert("ignored".to_string(), json!(collector.ignored()));
    }
    serde_json::to_string_pretty(&summary)
        .map_err(|err| CliError::new(format!("summary encode failed: {err}")))
}

// ============================================================================
// SECTION: Staging Commands
// ============================================================================

/// Downloads one resource and prints the staged path.
async fn command_fetch(command: &FetchCommand) -> CliResult<ExitCode> {
    let path = download(&command.uri, &command.staging)
        .await
        .map_err(|err| CliError::new(format!("fetch failed: {err}")))?;
    write_stdout_line(&path.display().to_string())
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Removes a staging tree.
async fn command_clean(command: &CleanCommand) -> CliResult<ExitCode> {
    remove_tree(&command.path)
        .await
        .map_err(|err| CliError::new(format!("clean failed: {err}")))?;
    write_stdout_line(&format!("removed {}", command.path.display()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Check(command) => command_config_check(command),
    }
}

/// Prints the effective configuration.
fn command_config_check(command: &ConfigCheckCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let rendered = serde_json::to_string_pretty(&config)
        .map_err(|err| CliError::new(format!("config encode failed: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Loads configuration from defaults, an optional file and the environment.
fn load_config(path: Option<&Path>) -> CliResult<HarnessConfig> {
    HarnessConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
