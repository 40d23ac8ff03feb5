// Transcription configuration
// Every tunable used by the pipeline, passed explicitly to each stage

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::audio::condition::{DenoiseConfig, TrimConfig, DEFAULT_PRE_EMPHASIS};
use crate::audio::hpss::HpssConfig;
use crate::audio::onset::OnsetConfig;
use crate::pitch::PitchConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Full pipeline configuration
///
/// Missing fields in a JSON config fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub trim: TrimConfig,
    pub denoise: DenoiseConfig,

    /// Coefficient `a` of `y[n] = x[n] - a * x[n-1]`
    pub pre_emphasis: f32,

    pub hpss: HpssConfig,
    pub onset: OnsetConfig,
    pub pitch: PitchConfig,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        TranscriptionConfig {
            trim: TrimConfig::default(),
            denoise: DenoiseConfig::default(),
            pre_emphasis: DEFAULT_PRE_EMPHASIS,
            hpss: HpssConfig::default(),
            onset: OnsetConfig::default(),
            pitch: PitchConfig::default(),
        }
    }
}

impl TranscriptionConfig {
    /// Parse a JSON config and validate it
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: TranscriptionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject settings that would make a stage meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("trim.frame_length", self.trim.frame_length),
            ("trim.hop_length", self.trim.hop_length),
            ("denoise.n_fft", self.denoise.n_fft),
            ("denoise.hop_length", self.denoise.hop_length),
            ("hpss.n_fft", self.hpss.n_fft),
            ("hpss.hop_length", self.hpss.hop_length),
            ("onset.n_fft", self.onset.n_fft),
            ("onset.hop_length", self.onset.hop_length),
            ("onset.n_mels", self.onset.n_mels),
            ("pitch.n_fft", self.pitch.n_fft),
            ("pitch.hop_length", self.pitch.hop_length),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be positive", name)));
        }

        if self.hpss.kernel_size % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "hpss.kernel_size must be odd, got {}",
                self.hpss.kernel_size
            )));
        }

        if !(0.0..1.0).contains(&self.pre_emphasis) {
            return Err(ConfigError::Invalid(format!(
                "pre_emphasis must be in [0, 1), got {}",
                self.pre_emphasis
            )));
        }

        let percentile = self.denoise.noise_percentile;
        if !(percentile > 0.0 && percentile <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "denoise.noise_percentile must be in (0, 1], got {}",
                self.denoise.noise_percentile
            )));
        }

        if self.pitch.fmin >= self.pitch.fmax {
            return Err(ConfigError::Invalid(format!(
                "pitch.fmin ({}) must be below pitch.fmax ({})",
                self.pitch.fmin, self.pitch.fmax
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = TranscriptionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pre_emphasis, 0.97);
        assert_eq!(config.onset.delta, 0.07);
        assert_eq!(config.pitch.min_magnitude, 0.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = TranscriptionConfig::from_json_str(
            r#"{ "pre_emphasis": 0.9, "onset": { "delta": 0.2 } }"#,
        )
        .unwrap();

        assert_eq!(config.pre_emphasis, 0.9);
        assert_eq!(config.onset.delta, 0.2);
        assert_eq!(config.onset.hop_length, 512);
        assert_eq!(config.denoise, DenoiseConfig::default());
    }

    #[test]
    fn test_rejects_zero_hop() {
        let result = TranscriptionConfig::from_json_str(r#"{ "pitch": { "hop_length": 0 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_even_kernel() {
        let result = TranscriptionConfig::from_json_str(r#"{ "hpss": { "kernel_size": 30 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_pre_emphasis() {
        let result = TranscriptionConfig::from_json_str(r#"{ "pre_emphasis": 1.5 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = TranscriptionConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_json_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fretnote.json");
        std::fs::write(&path, r#"{ "denoise": { "aggressiveness": 0.5 } }"#).unwrap();

        let config = TranscriptionConfig::from_json_file(&path).unwrap();
        assert_eq!(config.denoise.aggressiveness, 0.5);

        let missing = TranscriptionConfig::from_json_file(&temp_dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
