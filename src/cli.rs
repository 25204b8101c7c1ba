use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::state::ViewMode;

/// Live mtr-style hop monitor fed by a stream of per-hop samples
#[derive(Parser, Debug, Clone)]
#[command(name = "hopwatch")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Newline-delimited JSON samples to read ("-" for stdin)
    #[arg(short = 'f', long = "input", default_value = "-")]
    pub input: String,

    /// Label for the traced target, shown in the header
    #[arg(long = "host", default_value = "stdin")]
    pub host: String,

    /// Maximum hop index; samples beyond it are dropped
    #[arg(short = 'm', long = "max-hops", default_value = "64")]
    pub max_hops: u8,

    /// Initial view (table, charts, responders)
    #[arg(long = "view", value_enum)]
    pub view: Option<ViewMode>,

    /// Delay between samples when replaying a file, in milliseconds
    #[arg(long = "pace-ms", default_value = "0")]
    pub pace_ms: u64,

    /// Disable TUI (print the hop table after every completed round)
    #[arg(long = "no-tui")]
    pub no_tui: bool,

    /// Print a text report when the stream ends
    #[arg(long = "report")]
    pub report: bool,

    /// Print CSV when the stream ends
    #[arg(long = "csv")]
    pub csv: bool,

    /// Color theme (dark, light)
    #[arg(long = "theme")]
    pub theme: Option<String>,

    /// Write logs to this file (TUI mode logs nowhere otherwise)
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Input path, `None` for stdin
    pub fn input_path(&self) -> Option<PathBuf> {
        if self.input == "-" {
            None
        } else {
            Some(PathBuf::from(&self.input))
        }
    }

    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }

    /// Check if running in batch mode (non-interactive, output at the end)
    pub fn is_batch_mode(&self) -> bool {
        self.report || self.csv
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.max_hops == 0 {
            return Err("Max hops must be at least 1".into());
        }

        if self.report && self.csv {
            return Err("Cannot specify both --report and --csv".into());
        }

        if self.input.is_empty() {
            return Err("Input path cannot be empty".into());
        }

        if let Some(ref theme) = self.theme
            && !["dark", "light"].contains(&theme.to_lowercase().as_str())
        {
            return Err(format!("Unknown theme: {}. Use dark or light", theme));
        }

        // An hour between samples is certainly a typo
        const MAX_PACE_MS: u64 = 3_600_000;
        if self.pace_ms > MAX_PACE_MS {
            return Err(format!("Pace cannot exceed {}ms", MAX_PACE_MS));
        }

        Ok(())
    }
}
