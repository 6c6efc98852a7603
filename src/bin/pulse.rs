//! Pulse CLI - Command-line interface for the wellness engine
//!
//! Commands:
//! - score: Score a set of mood entries
//! - summary: Dashboard summary for one user
//! - replay: Feed entries through the engine in time order and print notifications
//! - validate: Check raw entries against the value constraints

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use wellness_pulse::store::{FixedClock, InMemoryEntryStore};
use wellness_pulse::validate::{parse_ndjson, RawMoodEntry};
use wellness_pulse::{
    classify, EngineConfig, EngineError, MoodEntry, Notification, ScoreCalculator,
    WellnessEngine, PULSE_VERSION,
};

/// Pulse - wellness scoring and notification engine
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = PULSE_VERSION)]
#[command(about = "Score mood logs and decide wellness notifications", long_about = None)]
struct Cli {
    /// Engine config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every entry in the input as one window
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the wellness summary for one user
    Summary {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// User to summarize
        #[arg(short, long)]
        user: String,

        /// Reference time (RFC 3339), defaults to the latest entry
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Replay entries in time order and print emitted notifications
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Load decider state from file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save decider state to file after replay
        #[arg(long)]
        save_state: Option<PathBuf>,
    },

    /// Validate raw entries
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one notification per line)
    Ndjson,
    /// JSON array of notifications
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("wellness_pulse=debug,pulse=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("wellness_pulse=info,pulse=info,warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    let config = match &cli.config {
        Some(path) => {
            info!("Loading config from: {:?}", path);
            EngineConfig::from_file(path)?
        }
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Score { input } => cmd_score(&input),
        Commands::Summary { input, user, at } => cmd_summary(&input, &user, at, config),
        Commands::Replay {
            input,
            output,
            output_format,
            load_state,
            save_state,
        } => cmd_replay(
            &input,
            &output,
            output_format,
            load_state.as_deref(),
            save_state.as_deref(),
            config,
        ),
        Commands::Validate { input, json } => cmd_validate(&input, json),
    }
}

fn is_std_stream(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn read_input(input: &Path) -> Result<Vec<RawMoodEntry>, PulseCliError> {
    let data = if is_std_stream(input) {
        if atty::is(atty::Stream::Stdin) {
            return Err(PulseCliError::NoInput);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let entries = parse_ndjson(&data)?;
    if entries.is_empty() {
        return Err(PulseCliError::NoEntries);
    }
    Ok(entries)
}

fn read_valid_entries(input: &Path) -> Result<Vec<MoodEntry>, PulseCliError> {
    let mut entries = read_input(input)?
        .into_iter()
        .map(RawMoodEntry::into_entry)
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.created_at);
    Ok(entries)
}

fn cmd_score(input: &Path) -> Result<(), PulseCliError> {
    let entries = read_valid_entries(input)?;
    let score = ScoreCalculator::compute(&entries);

    let report = ScoreReport {
        entries: entries.len(),
        score,
        risk_tier: classify(score).as_str(),
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_summary(
    input: &Path,
    user: &str,
    at: Option<DateTime<Utc>>,
    config: EngineConfig,
) -> Result<(), PulseCliError> {
    let entries = read_valid_entries(input)?;
    let at = reference_time(&entries, user, at);

    let clock = Arc::new(FixedClock::new(at));
    let store = InMemoryEntryStore::new(clock.clone());
    for entry in entries {
        store.append(entry)?;
    }

    let engine = WellnessEngine::with_config(store, clock, config)?;
    let summary = engine.get_wellness_summary(user)?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

/// Explicit `--at`, else the user's latest entry, else now
fn reference_time(entries: &[MoodEntry], user: &str, at: Option<DateTime<Utc>>) -> DateTime<Utc> {
    at.or_else(|| {
        entries
            .iter()
            .filter(|e| e.user_id == user)
            .map(|e| e.created_at)
            .max()
    })
    .unwrap_or_else(Utc::now)
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    output_format: OutputFormat,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
    config: EngineConfig,
) -> Result<(), PulseCliError> {
    let entries = read_valid_entries(input)?;
    let first = entries.first().map(|e| e.created_at).unwrap_or_else(Utc::now);

    let clock = Arc::new(FixedClock::new(first));
    let store = Arc::new(InMemoryEntryStore::new(clock.clone()));
    let engine = WellnessEngine::with_config(store.clone(), clock.clone(), config)?;

    if let Some(state_path) = load_state {
        let state_json = fs::read_to_string(state_path)?;
        engine.load_state(&state_json)?;
    }

    let mut notifications: Vec<Notification> = Vec::new();
    for entry in entries {
        let user_id = entry.user_id.clone();
        clock.set(entry.created_at);
        store.append(entry)?;

        if let Some(notification) = engine.on_new_entry_logged(&user_id)? {
            notifications.push(notification);
        }
    }
    debug!(emitted = notifications.len(), "replay finished");

    if let Some(state_path) = save_state {
        fs::write(state_path, engine.save_state()?)?;
    }

    let output_data = format_output(&notifications, &output_format)?;
    if is_std_stream(output) {
        let mut stdout = io::stdout();
        write!(stdout, "{}", output_data)?;
        stdout.flush()?;
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), PulseCliError> {
    let raw = read_input(input)?;
    let total_entries = raw.len();

    let errors: Vec<ValidationErrorDetail> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let user_id = entry.user_id.clone();
            entry.into_entry().err().map(|e| ValidationErrorDetail {
                index,
                user_id,
                error: e.to_string(),
            })
        })
        .collect();

    let report = ValidationReport {
        total_entries,
        valid_entries: total_entries - errors.len(),
        invalid_entries: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} entries, {} valid, {} invalid",
            report.total_entries, report.valid_entries, report.invalid_entries
        );
        for detail in &report.errors {
            println!("  [{}] {}: {}", detail.index, detail.user_id, detail.error);
        }
    }

    if report.invalid_entries > 0 {
        Err(PulseCliError::ValidationFailed(report.invalid_entries))
    } else {
        Ok(())
    }
}

fn format_output(
    notifications: &[Notification],
    format: &OutputFormat,
) -> Result<String, PulseCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for notification in notifications {
                lines.push(serde_json::to_string(notification)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(notifications)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(notifications)?),
    }
}

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    NoInput,
    NoEntries,
    ValidationFailed(usize),
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<EngineError> for PulseCliError {
    fn from(e: EngineError) -> Self {
        PulseCliError::Engine(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Engine(e @ EngineError::InvalidEntry { .. }) => CliError {
                code: "INVALID_ENTRY".to_string(),
                message: e.to_string(),
                hint: Some("Run 'pulse validate' for details".to_string()),
            },
            PulseCliError::Engine(e @ EngineError::Config(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the config file values".to_string()),
            },
            PulseCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "Refusing to read entries from an interactive terminal".to_string(),
                hint: Some("Pipe NDJSON entries in or pass --input <file>".to_string()),
            },
            PulseCliError::NoEntries => CliError {
                code: "NO_ENTRIES".to_string(),
                message: "No entries found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PulseCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} entries failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ScoreReport {
    entries: usize,
    score: u8,
    risk_tier: &'static str,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_entries: usize,
    valid_entries: usize,
    invalid_entries: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    user_id: String,
    error: String,
}
