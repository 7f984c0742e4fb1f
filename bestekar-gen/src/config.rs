//! bestekar-gen specific configuration
//!
//! Compiled defaults match the constants of the original desktop
//! deployment; any of them can be overridden through the TOML config
//! file located by `bestekar_common::config::find_config_file`.

use serde::Deserialize;
use std::path::PathBuf;

use bestekar_common::config as common_config;

use crate::error::{Error, Result};

/// Generation service configuration
#[derive(Debug, Clone)]
pub struct GenConfig {
    /// Output folder for generated songs and segment files
    pub music_folder: PathBuf,

    /// Root folder for voice profiles (`models/` and `indices/` below it)
    pub profiles_folder: PathBuf,

    /// Maximum seconds a single model call may produce
    pub segment_cap_secs: u32,

    /// Continuation overlap in seconds between adjacent segments
    pub overlap_secs: u32,

    /// Soft wall-clock limit per job in seconds (warning + wind-down)
    pub soft_time_limit_secs: u64,

    /// Hard wall-clock limit per job in seconds (forced termination)
    pub hard_time_limit_secs: u64,

    /// How long terminal job snapshots stay pollable, in seconds
    pub result_retention_secs: u64,

    /// Maximum retry attempts for transient infrastructure failures
    pub max_retries: u32,

    /// Delay between retry attempts in seconds
    pub retry_delay_secs: u64,

    /// Submission queue capacity
    pub queue_capacity: usize,

    /// Default TTS voice for vocal synthesis
    pub tts_voice: String,

    /// Endpoint of the music generation daemon
    pub model_endpoint: String,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            music_folder: common_config::default_music_folder(),
            profiles_folder: common_config::default_profiles_folder(),
            segment_cap_secs: 30,
            overlap_secs: 5,
            soft_time_limit_secs: 6600,
            hard_time_limit_secs: 7200,
            result_retention_secs: 3600,
            max_retries: 3,
            retry_delay_secs: 60,
            queue_capacity: 16,
            tts_voice: "tr-TR-EmelNeural".to_string(),
            model_endpoint: "http://127.0.0.1:8937".to_string(),
        }
    }
}

/// Optional overrides as they appear in the TOML config file
#[derive(Debug, Default, Deserialize)]
struct GenConfigFile {
    music_folder: Option<PathBuf>,
    profiles_folder: Option<PathBuf>,
    segment_cap_secs: Option<u32>,
    overlap_secs: Option<u32>,
    soft_time_limit_secs: Option<u64>,
    hard_time_limit_secs: Option<u64>,
    result_retention_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_delay_secs: Option<u64>,
    queue_capacity: Option<usize>,
    tts_voice: Option<String>,
    model_endpoint: Option<String>,
}

impl GenConfig {
    /// Load configuration with the standard priority order:
    /// CLI argument > environment variable > TOML file > compiled default.
    pub fn load(
        cli_music_folder: Option<&str>,
        cli_profiles_folder: Option<&str>,
        cli_model_endpoint: Option<&str>,
    ) -> Result<Self> {
        let mut config = GenConfig::default();

        if let Ok(path) = common_config::find_config_file() {
            let content = std::fs::read_to_string(&path)?;
            let file: GenConfigFile = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
            config.apply_file(file);
        }

        config.music_folder = common_config::resolve_folder(
            cli_music_folder,
            "BESTEKAR_MUSIC_FOLDER",
            "music_folder",
            || config.music_folder.clone(),
        );
        config.profiles_folder = common_config::resolve_folder(
            cli_profiles_folder,
            "BESTEKAR_PROFILES_FOLDER",
            "profiles_folder",
            || config.profiles_folder.clone(),
        );
        if let Some(endpoint) = cli_model_endpoint {
            config.model_endpoint = endpoint.to_string();
        } else if let Ok(endpoint) = std::env::var("BESTEKAR_MODEL_ENDPOINT") {
            if !endpoint.is_empty() {
                config.model_endpoint = endpoint;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: GenConfigFile) {
        if let Some(v) = file.music_folder {
            self.music_folder = v;
        }
        if let Some(v) = file.profiles_folder {
            self.profiles_folder = v;
        }
        if let Some(v) = file.segment_cap_secs {
            self.segment_cap_secs = v;
        }
        if let Some(v) = file.overlap_secs {
            self.overlap_secs = v;
        }
        if let Some(v) = file.soft_time_limit_secs {
            self.soft_time_limit_secs = v;
        }
        if let Some(v) = file.hard_time_limit_secs {
            self.hard_time_limit_secs = v;
        }
        if let Some(v) = file.result_retention_secs {
            self.result_retention_secs = v;
        }
        if let Some(v) = file.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = file.retry_delay_secs {
            self.retry_delay_secs = v;
        }
        if let Some(v) = file.queue_capacity {
            self.queue_capacity = v;
        }
        if let Some(v) = file.tts_voice {
            self.tts_voice = v;
        }
        if let Some(v) = file.model_endpoint {
            self.model_endpoint = v;
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.segment_cap_secs == 0 {
            return Err(Error::Config("segment_cap_secs must be > 0".to_string()));
        }
        if self.overlap_secs >= self.segment_cap_secs {
            return Err(Error::Config(format!(
                "overlap_secs ({}) must be smaller than segment_cap_secs ({})",
                self.overlap_secs, self.segment_cap_secs
            )));
        }
        if self.soft_time_limit_secs > self.hard_time_limit_secs {
            return Err(Error::Config(
                "soft_time_limit_secs must not exceed hard_time_limit_secs".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = GenConfig::default();
        assert_eq!(config.segment_cap_secs, 30);
        assert_eq!(config.overlap_secs, 5);
        assert_eq!(config.soft_time_limit_secs, 6600);
        assert_eq!(config.hard_time_limit_secs, 7200);
        assert_eq!(config.result_retention_secs, 3600);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.tts_voice, "tr-TR-EmelNeural");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overlap_at_or_above_cap() {
        let config = GenConfig {
            overlap_secs: 30,
            segment_cap_secs: 30,
            ..GenConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GenConfig {
            overlap_secs: 31,
            segment_cap_secs: 30,
            ..GenConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_time_limits() {
        let config = GenConfig {
            soft_time_limit_secs: 7300,
            hard_time_limit_secs: 7200,
            ..GenConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
