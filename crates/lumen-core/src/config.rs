#![forbid(unsafe_code)]

//! Engine tunables.
//!
//! [`EngineConfig`] groups every delay and distance the engine uses. The
//! defaults reproduce the shipped content script. With the `serde` feature it
//! loads from JSON, missing fields falling back to defaults:
//!
//! ```json
//! { "appear_delay_ms": 150, "anchor_inset": 28.0 }
//! ```

use core::fmt;
use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::visibility::VisibilityDelays;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Focus must persist this long before an overlay shows.
    pub appear_delay_ms: u64,
    /// Blur must persist this long before an overlay fades.
    pub blur_debounce_ms: u64,
    /// Fade duration before the overlay node is removed.
    pub fade_delay_ms: u64,
    /// Delay before the focused target's overlay returns after modal close.
    pub restore_delay_ms: u64,
    /// Minimum spacing of scroll/resize repositioning.
    pub reposition_interval_ms: u64,
    /// Distance of the overlay's top-left corner from the surface's
    /// bottom-right corner, in CSS pixels.
    pub anchor_inset: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            appear_delay_ms: 100,
            blur_debounce_ms: 100,
            fade_delay_ms: 200,
            restore_delay_ms: 100,
            reposition_interval_ms: 10,
            anchor_inset: crate::position::DEFAULT_ANCHOR_INSET,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON string.
    #[cfg(feature = "serde")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let problems = config.validate();
        if problems.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Human-readable problems; empty when the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.reposition_interval_ms == 0 {
            problems.push("reposition_interval_ms must be > 0".to_owned());
        }
        if self.fade_delay_ms == 0 {
            problems.push("fade_delay_ms must be > 0".to_owned());
        }
        if !self.anchor_inset.is_finite() || self.anchor_inset < 0.0 {
            problems.push(format!(
                "anchor_inset must be a non-negative number, got {}",
                self.anchor_inset
            ));
        }
        problems
    }

    #[must_use]
    pub fn delays(&self) -> VisibilityDelays {
        VisibilityDelays {
            appear: Duration::from_millis(self.appear_delay_ms),
            blur_debounce: Duration::from_millis(self.blur_debounce_ms),
            fade: Duration::from_millis(self.fade_delay_ms),
            restore: Duration::from_millis(self.restore_delay_ms),
        }
    }

    #[must_use]
    pub fn reposition_interval(&self) -> Duration {
        Duration::from_millis(self.reposition_interval_ms)
    }
}

/// Configuration loading failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The input was not valid JSON for [`EngineConfig`].
    Parse(String),
    /// The input parsed but failed [`EngineConfig::validate`].
    Invalid(Vec<String>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::Invalid(problems) => write!(f, "invalid config: {}", problems.join("; ")),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_empty());
        assert_eq!(EngineConfig::default().delays(), VisibilityDelays::default());
    }

    #[test]
    fn validate_reports_each_problem() {
        let cfg = EngineConfig {
            reposition_interval_ms: 0,
            anchor_inset: -1.0,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.validate().len(), 2);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let cfg = EngineConfig::from_json_str(r#"{ "appear_delay_ms": 150 }"#).unwrap();
        assert_eq!(cfg.appear_delay_ms, 150);
        assert_eq!(cfg.fade_delay_ms, 200);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_rejects_invalid_values() {
        let err = EngineConfig::from_json_str(r#"{ "fade_delay_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref p) if p.len() == 1));
        assert!(matches!(
            EngineConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }
}
