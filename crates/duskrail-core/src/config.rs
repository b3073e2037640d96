//! Transport configuration. Resolution order: environment variables →
//! config file → built-in defaults — same shape as the teacher's
//! configuration layer, scoped down to transport-only knobs (no payload
//! schema or application config, per spec Non-goals).
//!
//! Config file location:
//!   1. $DUSKRAIL_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/duskrail/config.toml
//!   3. ~/.config/duskrail/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub handshake: HandshakeConfig,
    pub buffers: BufferConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Per-step deadline, in milliseconds.
    pub timeout_ms: u64,
    /// Number of retries after the first attempt, with capped exponential
    /// backoff.
    pub retries: u32,
    /// Backoff cap, in milliseconds.
    pub backoff_cap_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Number of pooled 4096-byte read buffers.
    pub pool_size: usize,
    /// Maximum bytes a single in-flight reassembly stream may claim.
    pub max_reassembly_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            handshake: HandshakeConfig::default(),
            buffers: BufferConfig::default(),
        }
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            retries: 3,
            backoff_cap_ms: 2_000,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            pool_size: 64,
            max_reassembly_bytes: 16 * 1024 * 1024,
        }
    }
}

impl HandshakeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("duskrail")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl Config {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn file_path() -> PathBuf {
        std::env::var("DUSKRAIL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DUSKRAIL_HANDSHAKE__TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.handshake.timeout_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("DUSKRAIL_HANDSHAKE__RETRIES") {
            if let Ok(n) = v.parse() {
                self.handshake.retries = n;
            }
        }
        if let Ok(v) = std::env::var("DUSKRAIL_BUFFERS__POOL_SIZE") {
            if let Ok(n) = v.parse() {
                self.buffers.pool_size = n;
            }
        }
    }
}
