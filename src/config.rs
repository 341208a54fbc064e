// Calibration, wiring and timing configuration
//
// Compile-time constants describe the hardware model (2 kHz, 8-bit PWM, HC-SR04
// timing). `DriveConfig` holds the per-robot values that an operator tunes and
// can be loaded from a JSON file before a run.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::motor::Polarity;

// PWM carrier
pub const PWM_FREQUENCY_HZ: u32 = 2000;
pub const PWM_RESOLUTION_BITS: u8 = 8;
pub const PWM_MAX_DUTY: u8 = ((1u16 << PWM_RESOLUTION_BITS) - 1) as u8;

// Calibration starting points. Too far -> decrease, not far enough -> increase.
pub const DEFAULT_MS_PER_CM: f32 = 80.0;
pub const DEFAULT_MS_PER_DEGREE: f32 = 8.4;

// Wait loop granularity during timed motion
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5;

// Ultrasonic ranging
pub const ECHO_TIMEOUT: Duration = Duration::from_micros(30_000); // ~5 m max range
pub const TRIGGER_SETTLE_US: u32 = 2;
pub const TRIGGER_PULSE_US: u32 = 10;
pub const RANGING_PERIOD: Duration = Duration::from_millis(200);

/// Error types for configuration loading and validation
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid calibration: {field} must be a positive finite number, got {value}")]
    InvalidCalibration { field: &'static str, value: f32 },

    #[error("Poll interval must be at least 1 ms")]
    ZeroPollInterval,

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Linear time calibration for open-loop motion.
///
/// Both constants are operator-tuned and must be strictly positive. Once built
/// the profile is immutable; a new profile is built to recalibrate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CalibrationFields")]
pub struct CalibrationProfile {
    ms_per_cm: f32,
    ms_per_degree: f32,
}

/// Unvalidated wire form of `CalibrationProfile`
#[derive(Deserialize)]
struct CalibrationFields {
    #[serde(default = "default_ms_per_cm")]
    ms_per_cm: f32,
    #[serde(default = "default_ms_per_degree")]
    ms_per_degree: f32,
}

fn default_ms_per_cm() -> f32 {
    DEFAULT_MS_PER_CM
}

fn default_ms_per_degree() -> f32 {
    DEFAULT_MS_PER_DEGREE
}

impl TryFrom<CalibrationFields> for CalibrationProfile {
    type Error = ConfigError;

    fn try_from(fields: CalibrationFields) -> Result<Self> {
        Self::new(fields.ms_per_cm, fields.ms_per_degree)
    }
}

impl CalibrationProfile {
    pub fn new(ms_per_cm: f32, ms_per_degree: f32) -> Result<Self> {
        check_positive("ms_per_cm", ms_per_cm)?;
        check_positive("ms_per_degree", ms_per_degree)?;
        Ok(Self {
            ms_per_cm,
            ms_per_degree,
        })
    }

    pub fn ms_per_cm(&self) -> f32 {
        self.ms_per_cm
    }

    pub fn ms_per_degree(&self) -> f32 {
        self.ms_per_degree
    }

    /// Run time for a straight drive: `round(distance_cm * ms_per_cm)`
    pub fn run_time_for_distance(&self, distance_cm: f32) -> Duration {
        rounded_millis(distance_cm * self.ms_per_cm)
    }

    /// Run time for a tank turn. The sign of the angle only picks the
    /// direction, so the duration is `round(|angle_deg| * ms_per_degree)`.
    pub fn run_time_for_angle(&self, angle_deg: f32) -> Duration {
        rounded_millis(angle_deg.abs() * self.ms_per_degree)
    }
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            ms_per_cm: DEFAULT_MS_PER_CM,
            ms_per_degree: DEFAULT_MS_PER_DEGREE,
        }
    }
}

fn check_positive(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidCalibration { field, value })
    }
}

fn rounded_millis(ms: f32) -> Duration {
    // Saturating float -> int cast; negative inputs collapse to zero
    Duration::from_millis(ms.round() as u64)
}

/// Per-robot drive configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub calibration: CalibrationProfile,
    /// Wiring polarity of the left motor's direction lines
    pub left_polarity: Polarity,
    /// Wiring polarity of the right motor's direction lines
    pub right_polarity: Polarity,
    pub poll_interval_ms: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationProfile::default(),
            left_polarity: Polarity::Normal,
            right_polarity: Polarity::Normal,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl DriveConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading drive config from {}", path.display());
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Replace individual calibration constants, revalidating the profile
    pub fn with_calibration_overrides(
        mut self,
        ms_per_cm: Option<f32>,
        ms_per_degree: Option<f32>,
    ) -> Result<Self> {
        self.calibration = CalibrationProfile::new(
            ms_per_cm.unwrap_or(self.calibration.ms_per_cm),
            ms_per_degree.unwrap_or(self.calibration.ms_per_degree),
        )?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pwm_duty_range_matches_resolution() {
        assert_eq!(PWM_RESOLUTION_BITS, 8);
        assert_eq!(PWM_MAX_DUTY, 255);
    }

    #[test]
    fn test_default_calibration() {
        let profile = CalibrationProfile::default();
        assert_eq!(profile.ms_per_cm(), 80.0);
        assert_eq!(profile.ms_per_degree(), 8.4);
    }

    #[test]
    fn test_run_time_for_distance() {
        let profile = CalibrationProfile::default();
        assert_eq!(
            profile.run_time_for_distance(30.0),
            Duration::from_millis(2400)
        );
        // 12.34 * 80 = 987.2 -> 987
        assert_eq!(
            profile.run_time_for_distance(12.34),
            Duration::from_millis(987)
        );
    }

    #[test]
    fn test_run_time_for_angle_ignores_sign() {
        let profile = CalibrationProfile::default();
        assert_eq!(profile.run_time_for_angle(90.0), Duration::from_millis(756));
        assert_eq!(profile.run_time_for_angle(-90.0), Duration::from_millis(756));
    }

    #[test]
    fn test_rejects_non_positive_calibration() {
        assert!(matches!(
            CalibrationProfile::new(0.0, 8.4),
            Err(ConfigError::InvalidCalibration {
                field: "ms_per_cm",
                ..
            })
        ));
        assert!(matches!(
            CalibrationProfile::new(80.0, -1.0),
            Err(ConfigError::InvalidCalibration {
                field: "ms_per_degree",
                ..
            })
        ));
        assert!(CalibrationProfile::new(f32::NAN, 8.4).is_err());
        assert!(CalibrationProfile::new(80.0, f32::INFINITY).is_err());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = DriveConfig::from_json("{}").unwrap();
        assert_eq!(config, DriveConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config = DriveConfig::from_json(
            r#"{ "calibration": { "ms_per_cm": 95.5 }, "right_polarity": "inverted" }"#,
        )
        .unwrap();
        assert_eq!(config.calibration.ms_per_cm(), 95.5);
        assert_eq!(config.calibration.ms_per_degree(), DEFAULT_MS_PER_DEGREE);
        assert_eq!(config.left_polarity, Polarity::Normal);
        assert_eq!(config.right_polarity, Polarity::Inverted);
        assert_eq!(config.poll_interval(), Duration::from_millis(5));
    }

    #[test]
    fn test_invalid_json_calibration_rejected() {
        let err = DriveConfig::from_json(r#"{ "calibration": { "ms_per_degree": 0 } }"#)
            .unwrap_err();
        // try_from errors surface through serde_json
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().contains("ms_per_degree"));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = DriveConfig::from_json(r#"{ "poll_interval_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroPollInterval));
    }

    #[test]
    fn test_calibration_overrides() {
        let config = DriveConfig::default()
            .with_calibration_overrides(Some(100.0), None)
            .unwrap();
        assert_eq!(config.calibration.ms_per_cm(), 100.0);
        assert_eq!(config.calibration.ms_per_degree(), DEFAULT_MS_PER_DEGREE);

        assert!(DriveConfig::default()
            .with_calibration_overrides(None, Some(-2.0))
            .is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = DriveConfig::load("/nonexistent/drive.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
