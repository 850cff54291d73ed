//! Configuration management for the kiosk
//!
//! Priority is env > TOML file > default. Environment lookup is injected so
//! configuration can be assembled without touching the process environment.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::Catalog;
use crate::{Error, Result};

use file::KioskConfigFile;

/// Default spoken language
pub const DEFAULT_LOCALE: &str = "ko-KR";

/// Kiosk configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Locale for recognition and synthesis
    pub locale: String,

    /// Catalog document; the built-in menu when unset
    pub catalog_path: Option<PathBuf>,

    /// Speech configuration
    pub voice: VoiceConfig,

    /// Delays between confirmation and advancement
    pub pacing: PacingConfig,

    /// Simulated payment effect
    pub payment: PaymentConfig,
}

/// Speech configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input/output; taps keep working when disabled
    pub enabled: bool,

    /// Speech rate multiplier
    pub rate: f32,

    /// Max utterances waiting for playback before the oldest is dropped
    pub queue_depth: usize,

    /// How long one recognition may wait for speech
    pub recognition_timeout: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 0.9,
            queue_depth: 4,
            recognition_timeout: Duration::from_secs(8),
        }
    }
}

/// Fixed delays that pace the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    /// Between the "listening" cue and opening the mic
    pub listen_cue: Duration,

    /// Between an option confirmation and the next option group
    pub option_advance: Duration,

    /// Between the last option and the payment step
    pub checkout: Duration,

    /// Between the payment confirmation and processing
    pub payment_confirm: Duration,

    /// Between "payment complete" and the receipt
    pub completion: Duration,
}

impl PacingConfig {
    /// No delays at all
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            listen_cue: Duration::ZERO,
            option_advance: Duration::ZERO,
            checkout: Duration::ZERO,
            payment_confirm: Duration::ZERO,
            completion: Duration::ZERO,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            listen_cue: Duration::from_millis(1000),
            option_advance: Duration::from_millis(1500),
            checkout: Duration::from_millis(2000),
            payment_confirm: Duration::from_millis(2000),
            completion: Duration::from_millis(2000),
        }
    }
}

/// Simulated payment configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentConfig {
    /// How long a simulated charge takes
    pub simulated_delay: Duration,

    /// Make every simulated charge fail
    pub fail: bool,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            simulated_delay: Duration::from_millis(3000),
            fail: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            catalog_path: None,
            voice: VoiceConfig::default(),
            pacing: PacingConfig::default(),
            payment: PaymentConfig::default(),
        }
    }
}

fn millis(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_millis)
}

fn flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Config {
    /// Load configuration from the standard sources
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load(config_path: Option<&Path>, disable_voice: bool) -> Result<Self> {
        let fc = file::load_config_file(config_path);
        Self::from_sources(fc, |key| std::env::var(key).ok(), disable_voice)
    }

    /// Assemble configuration from a file overlay and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if the locale is empty or a rate is not positive
    pub fn from_sources(
        fc: KioskConfigFile,
        env: impl Fn(&str) -> Option<String>,
        disable_voice: bool,
    ) -> Result<Self> {
        let defaults = Self::default();

        let locale = env("KIOSK_LOCALE")
            .or(fc.locale)
            .unwrap_or(defaults.locale);
        if locale.trim().is_empty() {
            return Err(Error::Config("locale must not be empty".to_string()));
        }

        let catalog_path = env("KIOSK_CATALOG").or(fc.catalog).map(PathBuf::from);

        let voice_disabled = disable_voice || env("KIOSK_DISABLE_VOICE").is_some_and(|v| flag(&v));
        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
        }
        let voice = VoiceConfig {
            enabled: !voice_disabled && fc.voice.enabled.unwrap_or(defaults.voice.enabled),
            rate: fc.voice.rate.unwrap_or(defaults.voice.rate),
            queue_depth: fc
                .voice
                .queue_depth
                .unwrap_or(defaults.voice.queue_depth)
                .max(1),
            recognition_timeout: millis(
                fc.voice.recognition_timeout_ms,
                defaults.voice.recognition_timeout,
            ),
        };
        if voice.rate <= 0.0 {
            return Err(Error::Config(format!(
                "voice rate must be positive (got {})",
                voice.rate
            )));
        }

        let pacing = PacingConfig {
            listen_cue: millis(fc.pacing.listen_cue_ms, defaults.pacing.listen_cue),
            option_advance: millis(fc.pacing.option_advance_ms, defaults.pacing.option_advance),
            checkout: millis(fc.pacing.checkout_ms, defaults.pacing.checkout),
            payment_confirm: millis(fc.pacing.payment_confirm_ms, defaults.pacing.payment_confirm),
            completion: millis(fc.pacing.completion_ms, defaults.pacing.completion),
        };

        let payment = PaymentConfig {
            simulated_delay: millis(
                fc.payment.simulated_delay_ms,
                defaults.payment.simulated_delay,
            ),
            fail: env("KIOSK_PAYMENT_FAIL")
                .map(|v| flag(&v))
                .or(fc.payment.fail)
                .unwrap_or(defaults.payment.fail),
        };

        Ok(Self {
            locale,
            catalog_path,
            voice,
            pacing,
            payment,
        })
    }

    /// Load the configured catalog, or the built-in menu
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read or fails validation
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => Catalog::load(path),
            None => Catalog::builtin(),
        }
    }
}
