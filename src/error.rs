use std::path::PathBuf;
use thiserror::Error;

use crate::claims::ClaimId;

/// Why a claim record was excluded from every computation.
///
/// Rejections are collected by the store and logged; they never abort a pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClaimRejection {
    #[error("centre ({lat}, {lng}) is not a finite coordinate")]
    NonFiniteCenter { lat: f64, lng: f64 },
    #[error("centre ({lat}, {lng}) is outside lat [-90, 90] / lng [-180, 180]")]
    CenterOutOfRange { lat: f64, lng: f64 },
    #[error("radius {0:?} is not numeric")]
    NonNumericRadius(String),
    #[error("custom boundary point #{index} is not a valid coordinate")]
    InvalidBoundaryPoint { index: usize },
    #[error("custom boundary has {0} distinct points, at least 3 are required")]
    BoundaryTooSmall(usize),
    #[error("custom boundary encloses no area")]
    DegenerateBoundary,
    #[error("duplicate claim id {0}, keeping the first record")]
    DuplicateId(ClaimId),
    #[error("malformed claim record: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("circle_segments must be at least {min}, got {got}")]
    TooFewSegments { min: usize, got: usize },
    #[error("min_beacons must be at least {min}, got {got}")]
    TooFewBeacons { min: usize, got: usize },
    #[error("{field} must be a positive finite number, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("claim payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("claim payload must be a JSON array of claim records")]
    NotAnArray,
}
