// src/scanner/config.rs
use serde::{Deserialize, Serialize};

use super::error::Result;
use super::lookup::GLUE_LOOKUP_CAPACITY;

/// Upper bound on glued scanner states used when nothing else is asked for.
pub const DEFAULT_MAX_SIZE: usize = 80_000;

/// Environment override for [`GlueConfig::max_size`].
pub const MAX_SIZE_ENV: &str = "SCANGLUE_MAX_SIZE";

/// Knobs for product construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlueConfig {
    /// Maximum number of states the glued scanner may have. `0` means
    /// [`DEFAULT_MAX_SIZE`].
    pub max_size: usize,
}

impl Default for GlueConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl GlueConfig {
    pub fn with_max_size(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Bound actually enforced by the driver.
    pub fn effective_max_size(&self) -> usize {
        if self.max_size == 0 {
            DEFAULT_MAX_SIZE
        } else {
            self.max_size
        }
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self> {
        let cfg: GlueConfig = serde_json::from_slice(data)?;
        cfg.warn_if_inconsistent();
        Ok(cfg)
    }

    /// Defaults, overridden by `SCANGLUE_MAX_SIZE` when it parses.
    pub fn from_env() -> Self {
        let max_size = std::env::var(MAX_SIZE_ENV)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_SIZE);
        let cfg = Self { max_size };
        cfg.warn_if_inconsistent();
        cfg
    }

    fn warn_if_inconsistent(&self) {
        // The lookup table keeps one slot free, so this many states can never be indexed.
        if self.effective_max_size() >= GLUE_LOOKUP_CAPACITY {
            log::warn!(
                "max_size={} is not below the lookup capacity {}; large products will fail with LookupTableFull",
                self.effective_max_size(),
                GLUE_LOOKUP_CAPACITY
            );
        }
    }
}
