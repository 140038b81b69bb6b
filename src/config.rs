use crate::defaults;
use crate::engine::EngineConfig;
use crate::error::Result;
use crate::stt::whisper::WhisperConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub engine: EngineSection,
    pub stt: SttConfig,
}

/// Segmentation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSection {
    pub sample_rate: u32,
    pub step_seconds: u32,
    pub max_turn_seconds: u32,
    pub no_speech_threshold: f32,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub model: String,
    pub language: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            step_seconds: defaults::STEP_SECONDS,
            max_turn_seconds: defaults::MAX_TURN_SECONDS,
            no_speech_threshold: defaults::NO_SPEECH_THRESHOLD,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Self::default()
                } else {
                    // Re-panic on invalid TOML or other errors
                    panic!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - TURNSTREAM_MODEL → stt.model
    /// - TURNSTREAM_LANGUAGE → stt.language
    /// - TURNSTREAM_NO_SPEECH_THRESHOLD → engine.no_speech_threshold
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("TURNSTREAM_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(language) = std::env::var("TURNSTREAM_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        if let Ok(threshold) = std::env::var("TURNSTREAM_NO_SPEECH_THRESHOLD")
            && let Ok(threshold) = threshold.parse::<f32>()
        {
            self.engine.no_speech_threshold = threshold;
        }

        self
    }

    /// Build a validated [`EngineConfig`] from the engine section.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let config = EngineConfig {
            sample_rate: self.engine.sample_rate,
            step_seconds: self.engine.step_seconds,
            max_turn_seconds: self.engine.max_turn_seconds,
            no_speech_threshold: self.engine.no_speech_threshold,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build a [`WhisperConfig`] from the stt section.
    ///
    /// The model name expands to `models/ggml-<model>.bin`, the layout
    /// [`WhisperConfig::default`] assumes.
    pub fn whisper_config(&self) -> WhisperConfig {
        WhisperConfig {
            model_path: PathBuf::from(format!("models/ggml-{}.bin", self.stt.model)),
            language: self.stt.language.clone(),
            threads: None,
        }
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/turnstream/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("turnstream")
            .join("config.toml")
    }
}
