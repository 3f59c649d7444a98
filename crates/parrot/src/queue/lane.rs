use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

/// A named queue with its own timeout budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    /// Long-running, CPU/IO-heavy work (download + transcode).
    Heavy,
    /// Cheap follow-up work.
    Light,
}

impl Lane {
    pub const ALL: [Lane; 2] = [Lane::Heavy, Lane::Light];

    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Heavy => "heavy",
            Lane::Light => "light",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lane {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heavy" => Ok(Lane::Heavy),
            "light" => Ok(Lane::Light),
            other => Err(UnknownVariant::new("lane", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneSettings {
    /// Lease granted to a claimed job; an attempt still running past it is
    /// treated as failed.
    pub timeout: Duration,
    pub workers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lanes {
    pub heavy: LaneSettings,
    pub light: LaneSettings,
}

impl Lanes {
    pub fn get(&self, lane: Lane) -> LaneSettings {
        match lane {
            Lane::Heavy => self.heavy,
            Lane::Light => self.light,
        }
    }
}

impl Default for Lanes {
    fn default() -> Self {
        Self {
            heavy: LaneSettings {
                timeout: Duration::from_secs(20 * 60),
                workers: 1,
            },
            light: LaneSettings {
                timeout: Duration::from_secs(5 * 60),
                workers: 2,
            },
        }
    }
}
