mod help_text;

use crate::monitor::DEFAULT_QUIET_WINDOW;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// File integrity monitor: baseline SHA-256 digests, scan and watch for changes
#[derive(Parser, Debug)]
#[command(name = "integriward", version, about, long_about = help_text::ROOT_LONG_ABOUT)]
pub struct Cli {
    /// Baseline record to use [default: per-user data directory]
    #[arg(long, global = true, value_name = "PATH", env = "INTEGRIWARD_BASELINE")]
    pub baseline: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug). Takes precedence over RUST_LOG.
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "log_level")]
    pub verbose: u8,

    /// Set the log level explicitly. Takes precedence over RUST_LOG.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start tracking files, or every file below a directory
    #[command(long_about = help_text::ADD_LONG_ABOUT)]
    Add {
        /// Files or directories to track
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },

    /// List the baseline: digest, status and path of every tracked file
    List {},

    /// Compare tracked files against the baseline
    #[command(long_about = help_text::SCAN_LONG_ABOUT)]
    Scan {
        /// Also list unchanged files
        #[arg(long)]
        all: bool,
    },

    /// Fold changed and removed files into the baseline
    #[command(long_about = help_text::ACCEPT_LONG_ABOUT)]
    Accept {
        /// Only proceed if the differences match this fingerprint from scan
        #[arg(long, value_name = "FINGERPRINT")]
        fingerprint: Option<String>,

        /// Tracked files to accept [default: every changed or removed file]
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },

    /// Move the baseline entry of a tracked file to a new path
    #[command(long_about = help_text::RENAME_LONG_ABOUT)]
    Rename {
        /// Currently tracked path
        #[arg(value_name = "FROM")]
        from: PathBuf,

        /// New path for the entry
        #[arg(value_name = "TO")]
        to: PathBuf,
    },

    /// Watch tracked files and report changes as they happen
    #[command(long_about = help_text::WATCH_LONG_ABOUT)]
    Watch {
        /// Quiet period before a burst of events is reported
        #[arg(long, value_name = "MS", default_value_t = DEFAULT_QUIET_WINDOW.as_millis() as u64)]
        debounce_ms: u64,

        /// Accept every reported change into the baseline
        #[arg(long)]
        auto_accept: bool,

        /// Stop after this many seconds [default: run until interrupted]
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
