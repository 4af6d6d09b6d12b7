mod baseline_file;
mod cli;
mod fingerprint;
mod monitor;
mod paths;
mod reconcile;
mod report;
mod store;
mod tracking;

use anyhow::Context;
use cli::{Cli, Command, LogLevel};
use monitor::{AcceptingSink, ChangeMonitor, LogSink, MonitorOptions};
use paths::TrackedPath;
use reconcile::{AcceptOutcome, Selection};
use std::fmt as stdfmt;
use std::io::{IsTerminal, stderr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use store::{BaselineStore, LoadOutcome};
#[cfg(unix)]
use tokio::signal::unix::SignalKind;
use tracing::{Event, Level, Subscriber, debug, error, info, warn};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

struct IntegriwardExitCode;

impl IntegriwardExitCode {
    /// Exit code used when a scan found differences.
    fn differences_found() -> ExitCode {
        ExitCode::from(1)
    }

    /// Exit code used for other errors (I/O errors, invalid arguments, etc.).
    fn any_error() -> ExitCode {
        ExitCode::from(255)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_level);

    let result = open_store(cli.baseline).and_then(|store| match cli.command {
        Command::Add { paths } => handle_add(&store, &paths),
        Command::List {} => handle_list(&store),
        Command::Scan { all } => handle_scan(&store, all),
        Command::Accept { fingerprint, paths } => handle_accept(&store, fingerprint, &paths),
        Command::Rename { from, to } => handle_rename(&store, &from, &to),
        Command::Watch {
            debounce_ms,
            auto_accept,
            duration,
        } => handle_watch(
            Arc::new(store),
            Duration::from_millis(debounce_ms),
            auto_accept,
            duration.map(Duration::from_secs),
        ),
    });

    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!("{err}");
            IntegriwardExitCode::any_error()
        }
    }
}

fn open_store(baseline: Option<PathBuf>) -> anyhow::Result<BaselineStore> {
    let path = match baseline {
        Some(path) => path,
        None => store::default_record_path()?,
    };

    let (store, outcome) = BaselineStore::open(&path)
        .with_context(|| format!("Failed to open baseline {}", path.display()))?;

    match outcome {
        LoadOutcome::Loaded | LoadOutcome::Created => {}
        LoadOutcome::Recovered { error, backup } => warn!(
            "Baseline {} could not be read ({}); starting with an empty baseline. \
             The unreadable file was copied to {}",
            path.display(),
            error,
            backup.display()
        ),
    }

    Ok(store)
}

fn handle_add(store: &BaselineStore, paths: &[PathBuf]) -> anyhow::Result<ExitCode> {
    let mut added = 0;

    for path in paths {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Cannot add {}", path.display()))?;

        if metadata.is_dir() {
            added += tracking::add_directory_tree(store, path)?;
            continue;
        }

        let file = tracking::add_path(store, path)?;
        debug!(
            "{} {}",
            file.sha256.as_deref().unwrap_or("(no digest)"),
            file.path
        );
        if file.newly_tracked {
            added += 1;
        }
    }

    info!("Added {} file(s)", added);

    Ok(ExitCode::SUCCESS)
}

fn handle_list(store: &BaselineStore) -> anyhow::Result<ExitCode> {
    let entries = store.list();

    if entries.is_empty() {
        info!("No files are tracked");
    }

    report::print_listing(&entries);

    Ok(ExitCode::SUCCESS)
}

fn handle_scan(store: &BaselineStore, all: bool) -> anyhow::Result<ExitCode> {
    if store.tracked().is_empty() {
        warn!("No files are tracked; use 'integriward add' first");
        return Ok(ExitCode::SUCCESS);
    }

    let result = reconcile::scan(store);

    report::print_scan(&result, all);

    if !result.has_differences() {
        info!("No differences: all {} file(s) unchanged", result.unchanged.len());
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    println!("Fingerprint: {}", result.fingerprint);

    info!(
        "Run 'integriward accept --fingerprint {}' to accept these changes into the baseline.",
        result.fingerprint
    );

    Ok(IntegriwardExitCode::differences_found())
}

fn handle_accept(
    store: &BaselineStore,
    fingerprint: Option<String>,
    paths: &[PathBuf],
) -> anyhow::Result<ExitCode> {
    let selection = if paths.is_empty() {
        Selection::All
    } else {
        Selection::Paths(normalize_all(paths)?)
    };

    let summary = reconcile::accept_scanned(store, &selection, fingerprint.as_deref())?;

    for path in &summary.updated {
        info!("Accepted new content of {}", path);
    }
    for path in &summary.removed {
        info!("Removed {} from the baseline", path);
    }
    if !summary.skipped.is_empty() {
        warn!(
            "Skipped {} file(s) whose state could not be determined",
            summary.skipped.len()
        );
    }

    info!(
        "Accepted {} changed and {} removed file(s)",
        summary.updated.len(),
        summary.removed.len()
    );

    Ok(ExitCode::SUCCESS)
}

fn handle_rename(store: &BaselineStore, from: &Path, to: &Path) -> anyhow::Result<ExitCode> {
    let from = TrackedPath::normalize(from)?;
    let to = TrackedPath::normalize(to)?;

    if reconcile::rename(store, &from, &to)? == AcceptOutcome::NoOp {
        info!("{} is already tracked as {}", from, to);
    }

    Ok(ExitCode::SUCCESS)
}

fn handle_watch(
    store: Arc<BaselineStore>,
    quiet_window: Duration,
    auto_accept: bool,
    duration: Option<Duration>,
) -> anyhow::Result<ExitCode> {
    if store.tracked().is_empty() {
        warn!("No files are tracked; nothing to watch");
        return Ok(ExitCode::SUCCESS);
    }

    let options = MonitorOptions {
        quiet_window,
        flush_on_shutdown: true,
    };

    let monitor = if auto_accept {
        warn!("Changes will be accepted into the baseline as they are reported");
        let sink = AcceptingSink::new(Arc::clone(&store), LogSink);
        ChangeMonitor::watch(Arc::clone(&store), sink, options)?
    } else {
        ChangeMonitor::watch(Arc::clone(&store), LogSink, options)?
    };

    info!("Watching {} tracked file(s) in:", store.tracked().len());
    for dir in monitor.watched_directories() {
        info!("  {}", dir.display());
    }

    wait_for_shutdown(duration)?;

    debug!("Stopping monitor");
    monitor.shutdown()?;

    Ok(ExitCode::SUCCESS)
}

/// Block until SIGINT or SIGTERM arrives, or `duration` has passed.
fn wait_for_shutdown(duration: Option<Duration>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start signal handling runtime")?;

    runtime.block_on(async {
        #[cfg(unix)]
        let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
        #[cfg(unix)]
        let terminate = sigterm.recv();
        #[cfg(not(unix))]
        let terminate = std::future::pending::<Option<()>>();

        let elapsed = async {
            match duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Interrupted, stopping");
            }
            _ = terminate => info!("Terminated, stopping"),
            () = elapsed => {}
        }

        Ok::<(), anyhow::Error>(())
    })
}

fn normalize_all(paths: &[PathBuf]) -> anyhow::Result<Vec<TrackedPath>> {
    paths
        .iter()
        .map(|path| {
            TrackedPath::normalize(path)
                .with_context(|| format!("Invalid path {}", path.display()))
        })
        .collect()
}

/// Filter directive chosen by command line flags, if any.
///
/// `--log-level` wins over `-v`; without either, `RUST_LOG` applies.
fn directive_from_flags(verbose: u8, log_level: Option<LogLevel>) -> Option<&'static str> {
    match (log_level, verbose) {
        (Some(level), _) => Some(level.as_filter()),
        (None, 0) => None,
        (None, 1) => Some("info"),
        (None, _) => Some("debug"),
    }
}

fn init_tracing(verbose: u8, log_level: Option<LogLevel>) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    let filter = match directive_from_flags(verbose, log_level) {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}

impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::DEBUG => write!(writer, "🔍 ")?,
                Level::INFO => write!(writer, "ℹ️ ")?,
                Level::WARN => write!(writer, "⚠️  ")?,
                Level::ERROR => write!(writer, "❌️ ")?,
                _ => {}
            }
        } else {
            match *event.metadata().level() {
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
                _ => {}
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
