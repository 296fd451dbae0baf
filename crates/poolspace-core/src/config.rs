//! Allocator configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::size::{format_size, parse_size};

/// Default minimum preallocation step for a write stream (50 MiB).
pub const DEFAULT_MIN_PREALLOCATION: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Pool capacity in bytes. May be changed at runtime via `set_total_space`.
    pub total_bytes: u64,

    /// Default wait for blocking allocations: `0` never blocks, negative waits
    /// forever, positive values are milliseconds.
    pub default_wait_ms: i64,

    /// Smallest step a write stream grows its reservation by.
    pub min_preallocation_bytes: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            total_bytes: 0,
            default_wait_ms: -1,
            min_preallocation_bytes: DEFAULT_MIN_PREALLOCATION,
        }
    }
}

impl PoolConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `POOLSPACE_TOTAL`: pool capacity, e.g. `500GiB`
    /// - `POOLSPACE_WAIT_MS`: default allocation wait in milliseconds
    /// - `POOLSPACE_MIN_PREALLOC`: minimum stream preallocation step, e.g. `50MiB`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("POOLSPACE_TOTAL") {
            if let Ok(v) = parse_size(&s) {
                cfg.total_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("POOLSPACE_WAIT_MS") {
            if let Ok(v) = s.trim().parse::<i64>() {
                cfg.default_wait_ms = v;
            }
        }

        if let Ok(s) = std::env::var("POOLSPACE_MIN_PREALLOC") {
            if let Ok(v) = parse_size(&s) {
                cfg.min_preallocation_bytes = v;
            }
        }

        cfg
    }

    /// Parse a JSON config document. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// One-line summary for logs and the CLI.
    pub fn describe(&self) -> String {
        let wait = match self.default_wait_ms {
            0 => "immediate".to_string(),
            ms if ms < 0 => "forever".to_string(),
            ms => format!("{}ms", ms),
        };
        format!(
            "total={} wait={} min_prealloc={}",
            format_size(self.total_bytes),
            wait,
            format_size(self.min_preallocation_bytes)
        )
    }
}
