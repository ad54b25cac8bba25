//! config.rs
//! Engine configuration and the shared small-packet threshold table.
//!
//! Design notes:
//! - `EngineConfig` is plain serde data, loadable from JSON.
//! - `ThresholdTable` is injected into every context as an `Arc`; there is
//!   no process-wide singleton. Readers share the lock, writers take it
//!   exclusively per update.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_PIPELINES, SMALL_PACKET_THRESHOLD_DEFAULT};
use crate::pipeline::WaitStrategy;
use crate::registry::ChainedCipherId;

#[derive(Debug)]
pub enum ConfigError {
    /// JSON could not be parsed into an `EngineConfig`.
    Parse(serde_json::Error),
    /// Lane limit outside 1..=MAX_PIPELINES.
    LaneLimit(usize),
    /// Threshold map keyed by an unknown cipher identifier.
    UnknownCipher(u16),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "config parse error: {}", e),
            ConfigError::LaneLimit(n) => {
                write!(f, "max_pipelines {} outside 1..={}", n, MAX_PIPELINES)
            }
            ConfigError::UnknownCipher(id) => write!(f, "unknown cipher id 0x{:04x}", id),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on lanes per pipelined call.
    pub max_pipelines: usize,
    pub wait_strategy: WaitStrategy,
    /// Send every record to the accelerator, however small.
    pub small_packet_offload: bool,
    /// Per-cipher threshold overrides, keyed by raw cipher identifier.
    pub thresholds: HashMap<u16, usize>,
    /// Worker threads of the soft accelerator; `None` sizes to the host.
    pub accelerator_workers: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pipelines: MAX_PIPELINES,
            wait_strategy: WaitStrategy::default(),
            small_packet_offload: false,
            thresholds: HashMap::new(),
            accelerator_workers: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pipelines == 0 || self.max_pipelines > MAX_PIPELINES {
            return Err(ConfigError::LaneLimit(self.max_pipelines));
        }
        for raw in self.thresholds.keys() {
            if ChainedCipherId::from_raw(*raw).is_err() {
                return Err(ConfigError::UnknownCipher(*raw));
            }
        }
        Ok(())
    }

    /// Shared threshold table seeded from the defaults and this config's
    /// overrides.
    pub fn threshold_table(&self) -> Result<Arc<ThresholdTable>, ConfigError> {
        self.validate()?;
        let table = ThresholdTable::new();
        for (raw, bytes) in &self.thresholds {
            if let Ok(id) = ChainedCipherId::from_raw(*raw) {
                table.set(id, *bytes);
            }
        }
        Ok(Arc::new(table))
    }
}

/// Cipher identifier -> byte length at or below which records skip the
/// accelerator.
#[derive(Debug)]
pub struct ThresholdTable {
    entries: RwLock<HashMap<ChainedCipherId, usize>>,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ThresholdTable {
    pub fn new() -> Self {
        let entries = ChainedCipherId::ALL
            .iter()
            .map(|id| (*id, SMALL_PACKET_THRESHOLD_DEFAULT))
            .collect();
        Self { entries: RwLock::new(entries) }
    }

    pub fn get(&self, id: ChainedCipherId) -> usize {
        match self.entries.read() {
            Ok(map) => map.get(&id).copied().unwrap_or(SMALL_PACKET_THRESHOLD_DEFAULT),
            Err(poisoned) => poisoned
                .into_inner()
                .get(&id)
                .copied()
                .unwrap_or(SMALL_PACKET_THRESHOLD_DEFAULT),
        }
    }

    pub fn set(&self, id: ChainedCipherId, bytes: usize) {
        let mut map = self.entries.write().unwrap_or_else(|p| p.into_inner());
        map.insert(id, bytes);
    }

    /// Restore the compiled default for `id`.
    pub fn reset(&self, id: ChainedCipherId) {
        self.set(id, SMALL_PACKET_THRESHOLD_DEFAULT);
    }
}
