//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use toolpulse::core::config::Config;
use toolpulse::core::errors::TpError;
use toolpulse::core::logging::{self, Verbosity};
use toolpulse::store::backend::Fields;
use toolpulse::store::event_store::EventStore;
#[cfg(feature = "sqlite")]
use toolpulse::store::sqlite::SqliteDocumentStore;
use toolpulse::tracking::facade::Tracker;
use toolpulse::tracking::generation::GenerationClient;
use toolpulse::tracking::tools::Tool;

/// toolpulse: telemetry capture for utility tools.
#[derive(Debug, Parser)]
#[command(
    name = "toolpulse",
    author,
    version,
    about = "Tool usage telemetry capture",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// View configuration state.
    Config(ConfigArgs),
    /// List the known tool names.
    Tools,
    /// Run one instrumented generation request.
    Generate(GenerateArgs),
    /// Query recorded analytics events or generated content.
    Events(EventsArgs),
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and report the backend mode.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct GenerateArgs {
    /// Tool the request is made for.
    #[arg(long, value_name = "TOOL")]
    tool: String,
    /// Extra input fields recorded with the request (KEY=VALUE, repeatable).
    #[arg(long = "input", value_name = "KEY=VALUE")]
    inputs: Vec<String>,
    /// Inline data attached to the request, as JSON.
    #[arg(long, value_name = "JSON")]
    inline_data: Option<String>,
    /// Print the telemetry captured in fallback mode after the result.
    #[arg(long)]
    show_events: bool,
    /// Prompt text.
    prompt: String,
}

#[derive(Debug, Clone, Args)]
struct EventsArgs {
    /// Only records for this tool.
    #[arg(long, value_name = "TOOL")]
    tool: Option<String>,
    /// Maximum number of records (defaults come from config).
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
    /// Query generated content instead of analytics events.
    #[arg(long)]
    content: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// The generation endpoint failed or returned nothing.
    #[error("{0}")]
    Generation(TpError),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
            Self::Generation(_) => 4,
        }
    }
}

impl From<TpError> for CliError {
    fn from(value: TpError) -> Self {
        if value.is_generation_failure() {
            Self::Generation(value)
        } else {
            Self::Runtime(value.to_string())
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }
    logging::init(verbosity(cli));

    match &cli.command {
        Command::Config(args) => run_config(cli, args),
        Command::Tools => run_tools(cli),
        Command::Generate(args) => run_generate(cli, args),
        Command::Events(args) => run_events(cli, args),
    }
}

const fn verbosity(cli: &Cli) -> Verbosity {
    if cli.quiet {
        Verbosity::Quiet
    } else if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                let remote = config.backend.is_configured();

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("{}", "Configuration is valid.".green());
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                        println!(
                            "  Backend: {}",
                            if remote {
                                "remote".bold()
                            } else {
                                "fallback (placeholder credentials)".yellow()
                            }
                        );
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                            "remote_configured": remote,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("{} {e}", "Configuration is INVALID:".red());
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid configuration: {e}")))
            }
        },
    }
}

fn run_tools(cli: &Cli) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            for tool in Tool::ALL {
                println!("{tool}");
            }
        }
        OutputMode::Json => {
            let names: Vec<&str> = Tool::ALL.iter().map(|tool| tool.as_str()).collect();
            write_json_line(&json!({"command": "tools", "tools": names}))?;
        }
    }
    Ok(())
}

fn run_generate(cli: &Cli, args: &GenerateArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let input_data = parse_inputs(&args.inputs)?;
    let inline_data = args
        .inline_data
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(|e| CliError::User(format!("--inline-data is not valid JSON: {e}")))?;

    let store = Arc::new(build_store(&config)?);
    let tracker = Arc::new(Tracker::new(Arc::clone(&store)));
    let client = GenerationClient::http(Arc::clone(&tracker), &config.generation)?;

    let outcome = runtime()?.block_on(async {
        tracker.track_tool_usage(&args.tool, Fields::new()).await;
        client
            .generate(&args.prompt, &args.tool, input_data, inline_data)
            .await
    });
    let events = store.fallback().snapshot();

    match output_mode(cli) {
        OutputMode::Human => {
            match &outcome {
                Ok(text) => println!("{text}"),
                Err(e) => eprintln!("{} {e}", "generation failed:".red()),
            }
            if args.show_events {
                println!();
                println!("{}", format!("captured events ({})", store.mode()).bold());
                for event in &events.analytics {
                    println!(
                        "  {} {}",
                        event.event_name.cyan(),
                        Value::Object(event.event_data.clone())
                    );
                }
            }
        }
        OutputMode::Json => {
            let mut payload = json!({
                "command": "generate",
                "tool": args.tool,
                "mode": store.mode(),
                "ok": outcome.is_ok(),
            });
            match &outcome {
                Ok(text) => payload["text"] = json!(text),
                Err(e) => {
                    payload["code"] = json!(e.code());
                    payload["error"] = json!(e.to_string());
                }
            }
            if args.show_events {
                payload["events"] = serde_json::to_value(&events)?;
            }
            write_json_line(&payload)?;
        }
    }

    outcome.map(drop).map_err(CliError::from)
}

fn run_events(cli: &Cli, args: &EventsArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let store = build_store(&config)?;
    let tool = args.tool.as_deref();

    let records = runtime()?.block_on(async {
        if args.content {
            store
                .get_popular_content(tool, args.limit)
                .await
                .map(serde_json::to_value)
        } else {
            store
                .get_analytics_data(tool, args.limit)
                .await
                .map(serde_json::to_value)
        }
    });
    let records = records.map_err(TpError::from)??;
    let kind = if args.content { "content" } else { "analytics" };

    match output_mode(cli) {
        OutputMode::Human => {
            let rows = records.as_array().map_or(&[][..], Vec::as_slice);
            println!("{} {kind} record(s) from {} backend", rows.len(), store.mode());
            for row in rows {
                println!("  {row}");
            }
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "events",
                "kind": kind,
                "mode": store.mode(),
                "records": records,
            }))?;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|e| CliError::Runtime(e.to_string()))
}

fn build_store(config: &Config) -> Result<EventStore, CliError> {
    let builder = EventStore::builder(config.clone());
    #[cfg(feature = "sqlite")]
    let builder = match &config.paths.document_db {
        Some(path) => builder.remote(Arc::new(SqliteDocumentStore::open(path)?)),
        None => builder,
    };
    Ok(builder.build())
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(format!("failed to start async runtime: {e}")))
}

fn parse_inputs(raw: &[String]) -> Result<Fields, CliError> {
    let mut fields = Fields::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| CliError::User(format!("--input expects KEY=VALUE, got {entry:?}")))?;
        if key.is_empty() {
            return Err(CliError::User(format!("--input has an empty key: {entry:?}")));
        }
        fields.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(fields)
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("TOOLPULSE_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
