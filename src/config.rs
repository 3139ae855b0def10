use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

pub const MIN_CIRCLE_SEGMENTS: usize = 32;
pub const MIN_BEACONS: usize = 3;

/// What to do with two claims whose centres coincide, where no radical axis exists.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoincidentPolicy {
    /// Leave both claims unclipped against each other.
    #[default]
    Skip,
    /// The claim with the lower id keeps the contested area.
    LowerIdWins,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Vertices used to approximate each claim circle.
    pub circle_segments: usize,
    /// Radius given to claims whose record has no usable radius.
    pub default_radius_km: f64,
    /// Longest edge the concave beacon hull keeps before eroding inward.
    pub hull_max_edge_km: f64,
    pub min_beacons: usize,
    pub coincident_policy: CoincidentPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            circle_segments: 64,
            default_radius_km: 5.0,
            hull_max_edge_km: 30.0,
            min_beacons: MIN_BEACONS,
            coincident_policy: CoincidentPolicy::Skip,
        }
    }
}

impl EngineConfig {
    pub fn from_ron_str(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_ron_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(path, &contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.circle_segments < MIN_CIRCLE_SEGMENTS {
            return Err(ConfigError::TooFewSegments {
                min: MIN_CIRCLE_SEGMENTS,
                got: self.circle_segments,
            });
        }
        if self.min_beacons < MIN_BEACONS {
            return Err(ConfigError::TooFewBeacons {
                min: MIN_BEACONS,
                got: self.min_beacons,
            });
        }
        for (field, value) in [
            ("default_radius_km", self.default_radius_km),
            ("hull_max_edge_km", self.hull_max_edge_km),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_ron_keeps_defaults() {
        let config =
            EngineConfig::from_ron_str(Path::new("test.ron"), "(hull_max_edge_km: 12.5)").unwrap();
        assert_eq!(config.hull_max_edge_km, 12.5);
        assert_eq!(config.circle_segments, 64);
        assert_eq!(config.coincident_policy, CoincidentPolicy::Skip);
    }

    #[test]
    fn policy_parses_snake_case() {
        let config = EngineConfig::from_ron_str(
            Path::new("test.ron"),
            "(coincident_policy: lower_id_wins)",
        )
        .unwrap();
        assert_eq!(config.coincident_policy, CoincidentPolicy::LowerIdWins);
    }

    #[test]
    fn rejects_coarse_circles() {
        let err = EngineConfig::from_ron_str(Path::new("test.ron"), "(circle_segments: 8)")
            .unwrap_err();
        assert!(matches!(err, ConfigError::TooFewSegments { got: 8, .. }));
    }

    #[test]
    fn rejects_non_positive_edge() {
        let config = EngineConfig {
            hull_max_edge_km: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "hull_max_edge_km",
                ..
            })
        ));
    }
}
