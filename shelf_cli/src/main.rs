use clap::{Parser, Subcommand};
use shelf_core::*;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Smart tool shelf lending tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Load configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision slots and reset them to waiting (cold restart)
    Init,

    /// Ingest one shelf report (JSON object keyed by slot key)
    Ingest {
        /// Read the report from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Cold restart, then ingest newline-delimited reports from stdin
    Run,

    /// Print the dashboard as JSON
    Dashboard,

    /// Print the most recent loan events as JSON
    History {
        /// Maximum number of events to show
        #[arg(long, default_value_t = HISTORY_LIMIT)]
        limit: usize,
    },

    /// Export the full loan log as CSV
    Export {
        /// Destination file (defaults to tools_report.csv in the data directory)
        #[arg(long, conflicts_with = "stdout")]
        output: Option<PathBuf>,

        /// Write the CSV to stdout
        #[arg(long)]
        stdout: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    shelf_core::logging::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.validate()?;
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }

    match cli.command {
        Commands::Init => cmd_init(&config),
        Commands::Ingest { file } => cmd_ingest(&config, file.as_deref()),
        Commands::Run => cmd_run(&config),
        Commands::Dashboard => cmd_dashboard(&config),
        Commands::History { limit } => cmd_history(&config, limit),
        Commands::Export { output, stdout } => cmd_export(&config, output, stdout),
    }
}

/// Open the store and make sure every configured slot has a row
fn open_store(config: &Config) -> Result<Store> {
    let store = Store::open(config.database_path())?;
    store.provision(&config.slots)?;
    Ok(store)
}

fn cmd_init(config: &Config) -> Result<()> {
    let store = Store::open(config.database_path())?;
    store.cold_restart(&config.slots)?;

    println!(
        "✓ Shelf ready: {} slot(s) waiting for hardware",
        config.slots.len()
    );
    println!("  Database: {}", config.database_path().display());
    Ok(())
}

fn cmd_ingest(config: &Config, file: Option<&Path>) -> Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let engine = IngestionEngine::new(open_store(config)?, config.slots.clone());
    match engine.ingest(&raw) {
        Ok(outcome) => {
            println!("{}", success_response(&outcome));
            Ok(())
        }
        Err(e) => {
            println!("{}", error_response(&e));
            Err(e)
        }
    }
}

fn cmd_run(config: &Config) -> Result<()> {
    let store = Store::open(config.database_path())?;
    store.cold_restart(&config.slots)?;
    let engine = IngestionEngine::new(store, config.slots.clone());

    tracing::info!(
        "Waiting for shelf controller reports ({} slot(s) monitored)",
        engine.bindings().len()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let mut cycles = 0usize;
    let mut failures = 0usize;

    let mut input = stdin.lock();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        let result = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => engine.ingest(line),
            Err(e) => Err(Error::InvalidInput(format!("Report is not valid UTF-8: {}", e))),
        };

        // A failed cycle leaves the previous state in place; the controller resends
        let response = match result {
            Ok(outcome) => {
                cycles += 1;
                success_response(&outcome)
            }
            Err(e) => {
                failures += 1;
                tracing::error!("Failed to process report: {}", e);
                error_response(&e)
            }
        };
        writeln!(stdout, "{}", response)?;
        stdout.flush()?;
    }

    tracing::info!(
        "Input closed after {} cycle(s), {} rejected",
        cycles,
        failures
    );
    Ok(())
}

fn cmd_dashboard(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let views = project(&store.slots()?, now_local(), &config.alerts);
    println!("{}", serde_json::to_string_pretty(&views)?);
    Ok(())
}

fn cmd_history(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let events = load_history(&store, limit)?;
    println!("{}", serde_json::to_string_pretty(&events)?);
    Ok(())
}

fn cmd_export(config: &Config, output: Option<PathBuf>, to_stdout: bool) -> Result<()> {
    let store = open_store(config)?;

    if to_stdout {
        let events = store.events_newest_first()?;
        let stdout = io::stdout().lock();
        write_export(&events, stdout)?;
        return Ok(());
    }

    let path = output
        .unwrap_or_else(|| config.data.data_dir.join(shelf_core::history::EXPORT_FILE_NAME));
    let count = export_to_path(&store, &path)?;

    println!("✓ Exported {} events", count);
    println!("  CSV: {}", path.display());
    Ok(())
}

fn success_response(outcome: &CycleOutcome) -> serde_json::Value {
    serde_json::json!({
        "status": "success",
        "processed": outcome.processed(),
    })
}

fn error_response(error: &Error) -> serde_json::Value {
    serde_json::json!({
        "status": "error",
        "message": error.to_string(),
        "retryable": error.is_retryable(),
    })
}
