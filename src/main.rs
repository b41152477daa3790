use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use galaksiod::config::DaemonConfig;
use galaksiod::export;
use galaksiod::kv::{memory::MemoryKv, rest::RestKv, KvStore};
use galaksiod::rest::start_rest_server;
use galaksiod::AppContext;

#[derive(Parser)]
#[command(
    name = "galaksiod",
    about = "Galaksio waitlist backend — HTTP signup API and export tools",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// REST server port
    #[arg(long, env = "GALAKSIOD_PORT")]
    port: Option<u16>,

    /// Data directory for config.toml and exported snapshots
    #[arg(long, env = "GALAKSIOD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GALAKSIOD_LOG")]
    log: Option<String>,

    /// Bind address for the REST server (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "GALAKSIOD_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "GALAKSIOD_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the waitlist API server (default when no subcommand given).
    ///
    /// Examples:
    ///   galaksiod serve
    ///   galaksiod
    Serve,
    /// Export the waitlist snapshot for offline reporting.
    Export {
        #[command(subcommand)]
        target: ExportTarget,
    },
}

#[derive(Subcommand)]
enum ExportTarget {
    /// Render the snapshot as a CSV spreadsheet.
    ///
    /// Examples:
    ///   galaksiod export csv
    ///   galaksiod export csv --input data/waitlist.json --output /tmp/waitlist.csv
    Csv {
        /// Snapshot file to read
        #[arg(long, default_value = export::DEFAULT_SNAPSHOT_PATH)]
        input: PathBuf,
        /// CSV file to write
        #[arg(long, default_value = "data/waitlist.csv")]
        output: PathBuf,
    },
    /// Push each snapshot entry to a Notion database.
    ///
    /// The database needs Email (email), Timestamp (date), and User Agent
    /// (rich text) properties, shared with the integration behind the key.
    ///
    /// Examples:
    ///   NOTION_API_KEY=... NOTION_DATABASE_ID=... galaksiod export notion
    Notion {
        /// Snapshot file to read
        #[arg(long, default_value = export::DEFAULT_SNAPSHOT_PATH)]
        input: PathBuf,
        /// Notion integration token
        #[arg(long, env = "NOTION_API_KEY")]
        api_key: String,
        /// Target database ID (from the database URL)
        #[arg(long, env = "NOTION_DATABASE_ID")]
        database_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = DaemonConfig::new(args.port, args.data_dir, args.log, args.bind_address);
    let _log_guard = setup_logging(&config.log, args.log_file.as_deref(), &config.log_format);

    match args.command {
        None | Some(Command::Serve) => serve(config).await,
        Some(Command::Export { target }) => match target {
            ExportTarget::Csv { input, output } => export_csv(&input, &output),
            ExportTarget::Notion {
                input,
                api_key,
                database_id,
            } => export_notion(&input, api_key, database_id).await,
        },
    }
}

async fn serve(config: DaemonConfig) -> Result<()> {
    let store: Arc<dyn KvStore> = match (&config.kv_url, &config.kv_token) {
        (Some(url), Some(token)) => Arc::new(RestKv::new(url.clone(), token.clone())?),
        (Some(_), None) => {
            bail!("KV_REST_API_TOKEN is required when KV_REST_API_URL is set")
        }
        _ => {
            warn!("no KV endpoint configured — serving from the in-memory store, nothing is persisted");
            Arc::new(MemoryKv::new())
        }
    };

    let ctx = Arc::new(AppContext::new(Arc::new(config), store));
    start_rest_server(ctx).await
}

fn export_csv(input: &std::path::Path, output: &std::path::Path) -> Result<()> {
    match export::csv::export(input, output)? {
        Some(count) => {
            println!("exported {count} entries to {}", output.display());
        }
        None => {
            println!("no waitlist data found — the waitlist is empty");
        }
    }
    Ok(())
}

async fn export_notion(
    input: &std::path::Path,
    api_key: String,
    database_id: String,
) -> Result<()> {
    let exporter = export::notion::NotionExporter::new(api_key, database_id)?;
    match exporter.export(input).await? {
        Some(summary) => {
            println!("export summary:");
            println!("  succeeded: {}", summary.succeeded);
            println!("  failed:    {}", summary.failed);
        }
        None => {
            println!("no waitlist data found — the waitlist is empty");
        }
    }
    Ok(())
}

/// Set up tracing with an optional daily-rotated log file.
///
/// Returns the non-blocking writer guard; dropping it flushes buffered logs,
/// so the caller keeps it alive for the process lifetime.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("galaksiod.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // Fall back to stdout-only — don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}
