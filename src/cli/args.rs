//! CLI argument definitions using clap.
//!
//! The tool has a single pipeline, configured by flags rather than
//! subcommands: point it at a config file, choose development or production
//! mode, and optionally keep it running in watch mode.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Arguments {
    /// Configuration file
    #[arg(short, long, default_value = "i18n.config.json")]
    pub config: PathBuf,

    /// Development mode: write justified sources and translation data back
    #[arg(short, long)]
    pub dev: bool,

    /// Watch the sources and recompile on change (default: on in --dev)
    #[arg(short, long, overrides_with = "no_watch")]
    pub watch: bool,

    /// Disable watch mode
    #[arg(long = "no-watch", overrides_with = "watch")]
    pub no_watch: bool,

    /// Echo the resolved configuration before running
    #[arg(short, long)]
    pub verbose: bool,

    /// Write a default configuration file and exit
    #[arg(long)]
    pub init: bool,
}

impl Arguments {
    /// Watch defaults to on exactly when development mode is on.
    pub fn watch_enabled(&self) -> bool {
        if self.no_watch {
            false
        } else {
            self.watch || self.dev
        }
    }
}

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Clean run: no error-handled diagnostics.
    Success,
    /// At least one diagnostic resolved to `error`, or a fatal error.
    Failure,
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => std::process::ExitCode::from(0),
            ExitStatus::Failure => std::process::ExitCode::from(1),
        }
    }
}
