//! dfg - record and verify database statement sequences.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use dfg_common::{OutputFormat, Result, UuidProvider, SCHEMA_VERSION};
use dfg_config::{resolve_config, ChannelConfig, ConfigPaths, ResolvedConfig};
use dfg_core::exit_codes::ExitCode;
use dfg_core::logging;
use dfg_core::report::build_report;
use dfg_core::session::{
    session_channel, spawn_recording, spawn_verification, Recorder, SessionDeps,
    SessionHandle, Verifier, VerifyOptions,
};
use dfg_core::store::{validate_testcase_name, FileTestcaseStore, TestcaseStore};
use dfg_core::CancelToken;
use serde::Serialize;
use serde_json::json;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "dfg", version, about = "Record and verify database statement sequences")]
struct Cli {
    /// Config file; default discovery is DFG_CONFIG, ./dfg.json, then the user config dir.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Override log level (trace, debug, info, warn, error, off).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record a new testcase until Enter is pressed.
    Record {
        name: String,
        /// Channel to record from; the first configured one by default.
        #[arg(long)]
        channel: Option<String>,
        /// Tell on stderr how to stop the session.
        #[arg(long)]
        prompt: bool,
    },
    /// Verify a stored testcase until all expectations are met or Enter is pressed.
    Verify {
        name: String,
        #[arg(long)]
        channel: Option<String>,
        #[arg(long)]
        prompt: bool,
    },
    /// Show the report of the last verification run.
    Report { name: String },
    /// List stored testcases.
    List,
    /// Print a stored testcase.
    Show { name: String },
    /// Delete a stored testcase.
    Delete { name: String },
    /// Validate the configuration.
    Check,
    /// Generate shell completions.
    Completions { shell: Shell },
}

fn main() {
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            print_error(&err, cli.format);
            ExitCode::for_error(&err)
        }
    };
    std::process::exit(code.as_i32());
}

fn run(cli: &Cli) -> Result<ExitCode> {
    if let Command::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "dfg", &mut io::stdout());
        return Ok(ExitCode::Clean);
    }

    let resolved = resolve_config(&ConfigPaths::from_env(cli.config.clone()))?;
    logging::init(&resolved.config.logging, cli.log_level.as_deref())?;
    debug!(source = ?resolved.source, "configuration loaded");

    let store = FileTestcaseStore::new(resolved.config.testcase_dir());
    match &cli.command {
        Command::Record {
            name,
            channel,
            prompt,
        } => record(cli.format, &resolved, store, name, channel.as_deref(), *prompt),
        Command::Verify {
            name,
            channel,
            prompt,
        } => verify(cli.format, &resolved, store, name, channel.as_deref(), *prompt),
        Command::Report { name } => {
            let report = build_report(&store.read(name)?);
            emit(cli.format, &report, || report.to_string())?;
            Ok(ExitCode::Clean)
        }
        Command::List => {
            let names = store.list()?;
            emit(cli.format, &json!({ "testcases": names }), || {
                names.iter().map(|n| format!("{n}\n")).collect()
            })?;
            Ok(ExitCode::Clean)
        }
        Command::Show { name } => {
            let testcase = store.read(name)?;
            let text = serde_json::to_string_pretty(&testcase)?;
            emit(cli.format, &testcase, || format!("{text}\n"))?;
            Ok(ExitCode::Clean)
        }
        Command::Delete { name } => {
            store.delete(name)?;
            emit(cli.format, &json!({ "deleted": name }), || {
                format!("deleted {name}\n")
            })?;
            Ok(ExitCode::Clean)
        }
        Command::Check => check(cli.format, &resolved, &store),
        Command::Completions { .. } => Ok(ExitCode::Clean),
    }
}

fn record(
    format: OutputFormat,
    resolved: &ResolvedConfig,
    store: FileTestcaseStore,
    name: &str,
    channel: Option<&str>,
    prompt: bool,
) -> Result<ExitCode> {
    validate_testcase_name(name)?;
    let channel = session_channel(&resolved.config, channel)?;
    let deps = SessionDeps::for_channel(channel, resolved.config.poll_interval(), Arc::new(store));
    let handle = spawn_recording(Recorder::new(name, deps, Box::new(UuidProvider)))?;
    if prompt {
        eprintln!("recording {name} from channel {}; press Enter to stop", channel.name);
    }
    let testcase = stop_on_enter(handle)?;

    let count = testcase.expectations.len();
    emit(
        format,
        &json!({ "testcase": name, "channel": channel.name, "expectations": count }),
        || format!("recorded {count} expectations into {name}\n"),
    )?;
    Ok(ExitCode::Clean)
}

fn verify(
    format: OutputFormat,
    resolved: &ResolvedConfig,
    store: FileTestcaseStore,
    name: &str,
    channel: Option<&str>,
    prompt: bool,
) -> Result<ExitCode> {
    let channel = session_channel(&resolved.config, channel)?;
    let deps = SessionDeps::for_channel(channel, resolved.config.poll_interval(), Arc::new(store));
    let options = VerifyOptions::from(&resolved.config.expectations);
    let verifier = Verifier::load(name, deps, options)?;
    let handle = spawn_verification(verifier)?;
    if prompt {
        eprintln!("verifying {name} against channel {}; press Enter to stop", channel.name);
    }
    let outcome = stop_on_enter(handle)?;

    let report = outcome.report();
    emit(format, &report, || report.to_string())?;
    debug!(status = ?outcome.status, "verification finished");
    if report.all_fulfilled() {
        Ok(ExitCode::Clean)
    } else {
        Ok(ExitCode::Unfulfilled)
    }
}

/// Cancel the session on Enter (or stdin EOF) and wait for it to write back.
///
/// A session that ends on its own is joined without waiting for input.
fn stop_on_enter<T>(handle: SessionHandle<T>) -> Result<T> {
    cancel_on_enter(handle.cancel_token());
    Ok(handle.join()?)
}

fn cancel_on_enter(cancel: CancelToken) {
    // Detached: the process exits once the session is joined.
    thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        cancel.cancel();
    });
}

#[derive(Debug, Serialize)]
struct ChannelCheck<'a> {
    name: &'a str,
    log: &'a std::path::Path,
    log_exists: bool,
    patterns: &'a [String],
}

impl<'a> From<&'a ChannelConfig> for ChannelCheck<'a> {
    fn from(channel: &'a ChannelConfig) -> Self {
        Self {
            name: &channel.name,
            log: &channel.log,
            log_exists: channel.log.is_file(),
            patterns: &channel.patterns,
        }
    }
}

fn check(
    format: OutputFormat,
    resolved: &ResolvedConfig,
    store: &FileTestcaseStore,
) -> Result<ExitCode> {
    let channels: Vec<ChannelCheck> = resolved.config.channels.iter().map(Into::into).collect();
    let value = json!({
        "status": "ok",
        "schema_version": SCHEMA_VERSION,
        "config_source": resolved.source,
        "testcase_dir": store.dir(),
        "channels": channels,
    });
    emit(format, &value, || {
        let mut text = match resolved.source.path() {
            Some(path) => format!("config: {}\n", path.display()),
            None => "config: built-in defaults\n".to_string(),
        };
        text.push_str(&format!("testcases: {}\n", store.dir().display()));
        if channels.is_empty() {
            text.push_str("channels: none configured\n");
        }
        for c in &channels {
            let missing = if c.log_exists { "" } else { " (missing)" };
            text.push_str(&format!(
                "channel {}: {}{missing}, {} patterns\n",
                c.name,
                c.log.display(),
                c.patterns.len()
            ));
        }
        text
    })?;
    Ok(ExitCode::Clean)
}

fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    human: impl FnOnce() -> String,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Human => print!("{}", human()),
    }
    Ok(())
}

fn print_error(err: &dfg_common::Error, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let value = json!({
                "status": "error",
                "error": { "code": err.code(), "message": err.to_string() },
            });
            println!("{value}");
        }
        OutputFormat::Human => eprintln!("dfg: {err}"),
    }
}
