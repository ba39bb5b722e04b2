use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which syntax a compiler accepts before it gives up on a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityMode {
    /// Only what the host engine parses natively.
    Base,
    /// Scripts the host rejects get one pass through the transform library.
    #[default]
    Extended,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid compatibility mode `{0}`, use one of: base, extended")]
pub struct InvalidCompatibilityMode(pub String);

impl CompatibilityMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CompatibilityMode::Base => "base",
            CompatibilityMode::Extended => "extended",
        }
    }

    /// The mode to retry in after a transform, if any.
    ///
    /// Only ever steps down, so a single compile performs at most one transform.
    pub const fn fallback(self) -> Option<Self> {
        match self {
            CompatibilityMode::Extended => Some(CompatibilityMode::Base),
            CompatibilityMode::Base => None,
        }
    }
}

impl fmt::Display for CompatibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompatibilityMode {
    type Err = InvalidCompatibilityMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base" => Ok(CompatibilityMode::Base),
            "extended" => Ok(CompatibilityMode::Extended),
            _ => Err(InvalidCompatibilityMode(s.to_string())),
        }
    }
}
