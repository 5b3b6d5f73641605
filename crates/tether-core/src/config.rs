// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Startup configuration for the dispatcher and the voice scheduler.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! voices = 64
//! reconcile_interval_ms = 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides [`EngineConfig::voices`].
pub const VOICES_ENV: &str = "TETHER_VOICES";

/// The largest voice bank the scheduler accepts.
pub const MAX_VOICES: usize = u16::MAX as usize;

/// An error raised while loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config '{path}': {source}")]
    Io {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("invalid config value for '{field}': {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Process-wide settings, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of hardware voices in the bank (`N`).
    pub voices: usize,
    /// Period of the background reconcile sweep, in milliseconds.
    pub reconcile_interval_ms: u64,
    /// Sound instances preallocated by the instance pool.
    pub instance_pool_warm: usize,
    /// Capture slots preallocated per deferred-call shape.
    pub capture_pool_warm: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            voices: 256,
            reconcile_interval_ms: 100,
            instance_pool_warm: 256,
            capture_pool_warm: 16,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        log::info!("Loaded engine config from '{}'.", path.display());
        Ok(config)
    }

    /// Applies the `TETHER_VOICES` override, if set.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup(VOICES_ENV) {
            self.voices = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "voices",
                reason: format!("{VOICES_ENV}='{raw}' is not a number"),
            })?;
            log::debug!("Voice count overridden to {} by {VOICES_ENV}.", self.voices);
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.voices == 0 || self.voices > MAX_VOICES {
            return Err(ConfigError::Invalid {
                field: "voices",
                reason: format!("must be in 1..={MAX_VOICES}, got {}", self.voices),
            });
        }
        if self.reconcile_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "reconcile_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// The reconcile period as a [`Duration`].
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.reconcile_interval(), Duration::from_millis(100));
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str("voices = 8\nreconcile_interval_ms = 20").unwrap();
        assert_eq!(config.voices, 8);
        assert_eq!(config.reconcile_interval_ms, 20);
        assert_eq!(config.instance_pool_warm, 256);
    }

    #[test]
    fn zero_voices_is_rejected() {
        let err = EngineConfig::from_toml_str("voices = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "voices", .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str("voice = 8").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_override_replaces_voice_count() {
        let config = EngineConfig::default()
            .with_overrides_from(|key| (key == VOICES_ENV).then(|| "32".to_string()))
            .unwrap();
        assert_eq!(config.voices, 32);

        let err = EngineConfig::default()
            .with_overrides_from(|_| Some("many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "voices", .. }));
    }
}
