use anyhow::Result;
use clap::{Parser, Subcommand};
use indeed_csv_downloader::config::ActorConfig;
use indeed_csv_downloader::{doctor, run_actor, RunContext};

#[derive(Parser)]
#[command(
    name = "indeed-csv-downloader",
    about = "Indeed CSV Downloader — exports employer-portal reports via a headless browser",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Read the actor input from this JSON file instead of the key-value store
    #[arg(long, value_name = "FILE")]
    input: Option<std::path::PathBuf>,

    /// Root of the local storage layout (key_value_stores/, datasets/)
    #[arg(long, env = "APIFY_LOCAL_STORAGE_DIR")]
    storage_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ACTOR_LOG")]
    log: Option<String>,

    /// Browser binary to launch (default: probe PATH for a Chromium)
    #[arg(long, env = "ACTOR_BROWSER")]
    browser: Option<String>,

    /// Run the browser with a visible window (for local debugging)
    #[arg(long)]
    headful: bool,

    /// Suppress informational log output; warnings and errors still print.
    ///
    /// Overrides --log. Use this flag when running under a supervisor that
    /// captures stderr.
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the CSV download flow (default when no subcommand given).
    ///
    /// Logs in to the Indeed employer portal, downloads the configured CSV
    /// export, stores it in the local key-value store, and POSTs it to the
    /// webhook when one is configured. Pushes one result record to the
    /// dataset either way.
    ///
    /// Examples:
    ///   indeed-csv-downloader run
    ///   indeed-csv-downloader
    ///   indeed-csv-downloader run --input ./input.json
    Run,
    /// Run diagnostic checks on actor prerequisites.
    ///
    /// Checks browser binary availability, storage directory writability,
    /// credential presence, and the webhook URL shape.
    ///
    /// Exit code 0 if all checks pass, 1 if any check fails.
    ///
    /// Examples:
    ///   indeed-csv-downloader doctor
    Doctor,
    /// Print the resolved input record with the password masked.
    ///
    /// Shows the effective input after file/store resolution and environment
    /// overrides. Useful for verifying what a run would see.
    ///
    /// Examples:
    ///   indeed-csv-downloader input
    ///   indeed-csv-downloader input --input ./input.json
    Input,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── Logging setup ────────────────────────────────────────────────────────
    // Init once, before any tracing calls.
    let log_level = if args.quiet {
        "warn".to_string()
    } else {
        args.log.as_deref().unwrap_or("info").to_owned()
    };
    let log_format = std::env::var("ACTOR_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    setup_logging(&log_level, &log_format);

    let config = ActorConfig::resolve(
        args.input.as_deref(),
        args.storage_dir,
        args.browser,
        args.headful,
    )
    .await?;

    match args.command {
        Some(Command::Doctor) => {
            let results = doctor::run_doctor(&config);
            doctor::print_doctor_results(&results);
            let failed = results.iter().filter(|r| !r.passed).count();
            std::process::exit(if failed == 0 { 0 } else { 1 });
        }
        Some(Command::Input) => {
            println!("{}", serde_json::to_string_pretty(&config.redacted_input())?);
        }
        None | Some(Command::Run) => {
            let ctx = RunContext::new(config)?;
            if run_actor(&ctx).await.is_err() {
                // The flow has already logged and recorded the failure.
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Initialize the tracing subscriber.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators), selected via the
/// `ACTOR_LOG_FORMAT` environment variable.
fn setup_logging(log_level: &str, log_format: &str) {
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
    }
}
