//! Preview settings.
//!
//! Loaded from `config.json` in the application data directory. Every field
//! has a default, and a missing or unreadable file yields the defaults.
//!
//! # config.json Format
//!
//! ```json
//! {
//!   "strategy": "in-realm",
//!   "debug": false,
//!   "debounce_ms": 300,
//!   "generation": { "model": "gemini-1.5-flash", "temperature": 0.4 }
//! }
//! ```
//!
//! `UIFORGE_API_KEY` and `UIFORGE_STRATEGY` override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::execution::bundler::DEFAULT_DEFINE_URL;
use super::execution::StrategyKind;
use super::generation_client::GenerationSettings;
use super::live::FeedTiming;
use super::transform::DEFAULT_HISTORY_CAP;
use super::v8_bindings::RuntimeConfig;

pub const API_KEY_ENV: &str = "UIFORGE_API_KEY";
pub const STRATEGY_ENV: &str = "UIFORGE_STRATEGY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreviewConfig {
    pub strategy: StrategyKind,
    pub debug: bool,
    pub history_cap: usize,
    pub debounce_ms: u64,

    pub frame_budget_ms: u64,
    pub frame_debug_budget_ms: u64,
    /// Per-module budget of the in-frame loader
    pub frame_dependency_timeout_ms: u64,

    pub in_realm_timeout_ms: u64,
    pub in_realm_heap_limit_mb: usize,
    /// Load the transpiler into the in-process realm
    pub in_realm_transpile: bool,

    pub module_fetch_timeout_ms: u64,

    pub bundler_define_url: String,
    pub bundler_budget_ms: u64,

    pub live_poll_interval_ms: u64,
    pub live_reconnect_backoff_ms: u64,

    pub generation: GenerationSettings,

    /// Model API key; `UIFORGE_API_KEY` wins when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            debug: false,
            history_cap: DEFAULT_HISTORY_CAP,
            debounce_ms: 300,
            frame_budget_ms: 5_000,
            frame_debug_budget_ms: 12_000,
            frame_dependency_timeout_ms: 4_000,
            in_realm_timeout_ms: 5_000,
            in_realm_heap_limit_mb: 128,
            in_realm_transpile: false,
            module_fetch_timeout_ms: 8_000,
            bundler_define_url: DEFAULT_DEFINE_URL.to_string(),
            bundler_budget_ms: 20_000,
            live_poll_interval_ms: 500,
            live_reconnect_backoff_ms: 3_000,
            generation: GenerationSettings::default(),
            api_key: None,
        }
    }
}

impl PreviewConfig {
    /// `<data_dir>/config.json`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "", "uiforge").map(|dirs| dirs.data_dir().join("config.json"))
    }

    /// Load from the default location, then apply environment overrides
    pub fn load() -> Self {
        let mut config = Self::default_path()
            .map(Self::load_from_path)
            .unwrap_or_default();
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config
    }

    /// Load from a specific path. Missing or invalid files yield defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            debug!("No config found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<PreviewConfig>(&contents) {
                Ok(config) => {
                    debug!(
                        "Loaded config from {:?}: strategy={}, debug={}",
                        path, config.strategy, config.debug
                    );
                    config
                }
                Err(e) => {
                    warn!("Failed to parse {:?}, using defaults: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {:?}, using defaults: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|key| !key.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(strategy) = lookup(STRATEGY_ENV) {
            match strategy.parse::<StrategyKind>() {
                Ok(kind) => self.strategy = kind,
                Err(e) => warn!("Ignoring {}: {}", STRATEGY_ENV, e),
            }
        }
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            max_heap_size_bytes: self.in_realm_heap_limit_mb * 1024 * 1024,
            timeout: Duration::from_millis(self.in_realm_timeout_ms),
        }
    }

    pub fn feed_timing(&self) -> FeedTiming {
        FeedTiming {
            poll_interval: Duration::from_millis(self.live_poll_interval_ms),
            reconnect_backoff: Duration::from_millis(self.live_reconnect_backoff_ms),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn module_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.module_fetch_timeout_ms)
    }
}
