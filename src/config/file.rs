//! TOML configuration file loading
//!
//! Supports `~/.config/voice-kiosk/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct KioskConfigFile {
    /// Spoken language (e.g. "ko-KR")
    #[serde(default)]
    pub locale: Option<String>,

    /// Path to a catalog JSON document
    #[serde(default)]
    pub catalog: Option<String>,

    /// Speech configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Delays between confirmation and advancement
    #[serde(default)]
    pub pacing: PacingFileConfig,

    /// Simulated payment effect
    #[serde(default)]
    pub payment: PaymentFileConfig,
}

/// Speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// Speech rate multiplier
    pub rate: Option<f32>,

    /// Max utterances waiting for playback
    pub queue_depth: Option<usize>,

    /// How long one recognition may wait for speech
    pub recognition_timeout_ms: Option<u64>,
}

/// Pacing configuration, all in milliseconds
#[derive(Debug, Default, Deserialize)]
pub struct PacingFileConfig {
    pub listen_cue_ms: Option<u64>,
    pub option_advance_ms: Option<u64>,
    pub checkout_ms: Option<u64>,
    pub payment_confirm_ms: Option<u64>,
    pub completion_ms: Option<u64>,
}

/// Simulated payment configuration
#[derive(Debug, Default, Deserialize)]
pub struct PaymentFileConfig {
    /// How long a simulated charge takes
    pub simulated_delay_ms: Option<u64>,

    /// Make every simulated charge fail
    pub fail: Option<bool>,
}

/// Load the TOML config file from an explicit path or the standard path
///
/// Returns `KioskConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: Option<&Path>) -> KioskConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return KioskConfigFile::default();
    };

    if !path.exists() {
        return KioskConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                KioskConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            KioskConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voice-kiosk/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-kiosk").join("config.toml"))
}
