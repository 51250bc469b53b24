//! Configuration for composite building.

use composite_common::grid::DEFAULT_COORD_TOLERANCE;
use serde::{Deserialize, Serialize};

/// Configuration for the composite builder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    /// What to do when two regions claim the same cell.
    pub overlap_policy: OverlapPolicy,

    /// Tolerance in degrees when matching mask coordinates to grid coordinates.
    pub coord_tolerance: f64,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            overlap_policy: OverlapPolicy::LastWins,
            coord_tolerance: DEFAULT_COORD_TOLERANCE,
        }
    }
}

impl CompositeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `COMPOSITE_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup("COMPOSITE_OVERLAP_POLICY") {
            self.overlap_policy = OverlapPolicy::from_str(&val);
        }

        if let Some(val) = lookup("COMPOSITE_COORD_TOLERANCE") {
            if let Ok(tol) = val.parse() {
                self.coord_tolerance = tol;
            }
        }

        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.coord_tolerance > 0.0 && self.coord_tolerance.is_finite()) {
            return Err("coord_tolerance must be a positive number".to_string());
        }

        // Half-degree grids need cells to stay distinguishable
        if self.coord_tolerance >= 0.25 {
            return Err("coord_tolerance must be < 0.25 degrees".to_string());
        }

        Ok(())
    }
}

/// Handling of cells claimed by more than one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Regions are applied in mapping order; a later region overwrites.
    #[default]
    LastWins,
    /// Fail the build with `OverlappingRegions`.
    Reject,
}

impl OverlapPolicy {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "reject" | "error" => Self::Reject,
            _ => Self::LastWins,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastWins => "last_wins",
            Self::Reject => "reject",
        }
    }
}

impl std::fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CompositeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.overlap_policy, OverlapPolicy::LastWins);
    }

    #[test]
    fn test_invalid_tolerance() {
        let mut config = CompositeConfig::default();
        config.coord_tolerance = 0.0;
        assert!(config.validate().is_err());
        config.coord_tolerance = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overlap_policy_from_str() {
        assert_eq!(OverlapPolicy::from_str("REJECT"), OverlapPolicy::Reject);
        assert_eq!(OverlapPolicy::from_str("last_wins"), OverlapPolicy::LastWins);
        assert_eq!(OverlapPolicy::from_str("bogus"), OverlapPolicy::LastWins);
    }

    #[test]
    fn test_overrides_replace_configured_values() {
        let configured = CompositeConfig {
            overlap_policy: OverlapPolicy::LastWins,
            coord_tolerance: 0.01,
        };
        let config = configured.with_overrides(|key| match key {
            "COMPOSITE_OVERLAP_POLICY" => Some("reject".to_string()),
            "COMPOSITE_COORD_TOLERANCE" => Some("not-a-number".to_string()),
            _ => None,
        });
        assert_eq!(config.overlap_policy, OverlapPolicy::Reject);
        assert_eq!(config.coord_tolerance, 0.01);

        let untouched = configured.with_overrides(|_| None);
        assert_eq!(untouched, configured);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: CompositeConfig = serde_json::from_str(r#"{"overlap_policy": "reject"}"#).unwrap();
        assert_eq!(config.overlap_policy, OverlapPolicy::Reject);
        assert_eq!(config.coord_tolerance, DEFAULT_COORD_TOLERANCE);
    }
}
