//! Settings read from an optional `tempora.toml`, overridden by
//! `TEMPORA__*` environment variables (e.g. `TEMPORA__LOG_FILTER=debug`).
//!
//! ```toml
//! log_filter = "tempora=debug"
//! doc_time = "2024-11-19"
//!
//! [[known_intervals]]
//! kind = "Event"
//! value = "12,20"
//! at = "2024-11-02"
//!
//! [batch]
//! stream_results = false
//! timeout_ms = 500
//! ```

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use std::path::Path;

use crate::calendar::Moment;
use crate::error::Result;
use crate::graph::{KnownIntervals, KnownKey};
use crate::interval::Interval;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_filter: String,
    /// Moment literal used as the document creation time.
    pub doc_time: Option<String>,
    pub known_intervals: Vec<KnownSetting>,
    pub batch: BatchSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info".to_owned(),
            doc_time: None,
            known_intervals: Vec::new(),
            batch: BatchSettings::default(),
        }
    }
}

/// One seeded anchor: `(kind, value)` key and the moment it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownSetting {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    pub at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub stream_results: bool,
    pub timeout_ms: Option<u64>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { stream_results: true, timeout_ms: None }
    }
}

impl Settings {
    pub const DEFAULT_FILE: &'static str = "tempora.toml";
    pub const ENV_PREFIX: &'static str = "TEMPORA";

    pub fn load() -> Result<Self> {
        Self::load_from(Self::DEFAULT_FILE)
    }

    /// The file may be absent; environment variables always apply on top.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix(Self::ENV_PREFIX).prefix_separator("__").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Builds the known-intervals table from `doc_time` and `known_intervals`.
    pub fn known_intervals(&self) -> Result<KnownIntervals> {
        let mut known = KnownIntervals::new();
        if let Some(doc_time) = &self.doc_time {
            known.insert(KnownKey::doc_time(), Interval::of(&doc_time.parse::<Moment>()?)?);
        }
        for seed in &self.known_intervals {
            let interval = Interval::of(&seed.at.parse::<Moment>()?)?;
            known.insert(KnownKey::new(seed.kind.as_deref(), seed.value.as_deref()), interval);
        }
        Ok(known)
    }
}
