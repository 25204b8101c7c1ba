use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Args;
use crate::prefs::Prefs;
use crate::state::ViewMode;

/// Terminal width assumed until the surface reports its real size
pub const DEFAULT_WIDTH: u16 = 80;

/// Runtime configuration derived from CLI args and saved preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Target label for the header
    pub target: String,
    /// Sample file (None = stdin)
    pub input: Option<PathBuf>,
    /// Highest accepted hop index
    pub max_hops: u8,
    /// Display width used to size the RTT history
    pub width: u16,
    /// Initial view
    pub view: ViewMode,
    /// Theme name
    pub theme: String,
    /// Delay between replayed samples
    #[serde(with = "duration_serde")]
    pub pace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: "stdin".to_string(),
            input: None,
            max_hops: 64,
            width: DEFAULT_WIDTH,
            view: ViewMode::Table,
            theme: "dark".to_string(),
            pace: Duration::ZERO,
        }
    }
}

impl Config {
    /// CLI flags win over saved preferences, which win over defaults
    pub fn from_args(args: &Args, prefs: &Prefs) -> Self {
        let defaults = Self::default();
        Self {
            target: args.host.clone(),
            input: args.input_path(),
            max_hops: args.max_hops,
            width: defaults.width,
            view: args.view.or(prefs.view).unwrap_or(defaults.view),
            theme: args
                .theme
                .clone()
                .or_else(|| prefs.theme.clone())
                .map(|t| t.to_lowercase())
                .unwrap_or(defaults.theme),
            pace: args.pace(),
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self::from_args(args, &Prefs::default())
    }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
