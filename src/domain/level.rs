use crate::error::LogError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a log entry, ordered most-severe first.
///
/// The numeric rank grows with verbosity: `error` is 0, `debug` is 4. A
/// transport configured with a minimum level accepts every entry whose rank
/// is less than or equal to that minimum's rank, so `Level::Error` is the
/// most restrictive threshold and `Level::Debug` the most permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warn,
    Info,
    Log,
    Debug,
}

impl Level {
    /// All levels, most severe first.
    pub const ALL: [Level; 5] = [
        Level::Error,
        Level::Warn,
        Level::Info,
        Level::Log,
        Level::Debug,
    ];

    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Level::Error => 0,
            Level::Warn => 1,
            Level::Info => 2,
            Level::Log => 3,
            Level::Debug => 4,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Log => "log",
            Level::Debug => "debug",
        }
    }

    /// Whether a transport whose minimum level is `self` accepts an entry
    /// logged at `entry`.
    #[must_use]
    pub fn permits(self, entry: Level) -> bool {
        entry.rank() <= self.rank()
    }
}

/// The default minimum level of every transport.
impl Default for Level {
    fn default() -> Self {
        Level::Log
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Level::Error),
            "warn" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "log" => Ok(Level::Log),
            "debug" => Ok(Level::Debug),
            other => Err(LogError::UnknownLevel(other.to_string())),
        }
    }
}
