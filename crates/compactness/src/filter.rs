//! The hide/keep decision over a batch of features.

use serde::Deserialize;

use crate::index::compactness_index;
use crate::projection::{reproject_polygon, Reproject};
use crate::shape::{parse_polygon, ShapeError};

/// Threshold used when a request does not carry one.
pub const DEFAULT_K_THRESHOLD: f64 = 30.0;

/// An identified polygon as sent by the client. The geometry stays raw JSON
/// until it is evaluated so a bad geometry only affects its own feature.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Feature {
    pub id: String,
    pub geometry: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndefinedReason {
    /// Zero projected area.
    Degenerate,
    /// At least one vertex lies outside the projection's domain.
    OutOfDomain,
}

/// Result of scoring a single geometry.
#[derive(Debug)]
pub enum Evaluation {
    Index(f64),
    Undefined(UndefinedReason),
    Invalid(ShapeError),
}

/// Ids to hide for one batch, plus tallies for logging and metrics.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CleanOutcome {
    pub ids_to_hide: Vec<String>,
    pub evaluated: u64,
    pub undefined: u64,
    pub invalid: u64,
}

/// Scores polygons with `k = C² / A` in a fixed planar CRS.
///
/// Holds no per-call state; a single instance is meant to be shared by all
/// requests for the life of the process.
pub struct CompactnessFilter<P> {
    projection: P,
    default_threshold: f64,
}

impl<P: Reproject> CompactnessFilter<P> {
    pub fn new(projection: P) -> Self {
        Self::with_default_threshold(projection, DEFAULT_K_THRESHOLD)
    }

    pub fn with_default_threshold(projection: P, default_threshold: f64) -> Self {
        Self {
            projection,
            default_threshold,
        }
    }

    pub fn default_threshold(&self) -> f64 {
        self.default_threshold
    }

    /// Parse, reproject and measure one raw GeoJSON geometry.
    pub fn evaluate(&self, raw: &serde_json::Value) -> Evaluation {
        let polygon = match parse_polygon(raw) {
            Ok(polygon) => polygon,
            Err(e) => return Evaluation::Invalid(e),
        };
        let projected = match reproject_polygon(&self.projection, &polygon) {
            Ok(projected) => projected,
            Err(_) => return Evaluation::Undefined(UndefinedReason::OutOfDomain),
        };
        match compactness_index(&projected) {
            Some(k) => Evaluation::Index(k),
            None => Evaluation::Undefined(UndefinedReason::Degenerate),
        }
    }

    /// Return, in input order, the ids whose index is strictly above the
    /// threshold (`k_threshold` or the filter's default).
    ///
    /// Features with no defined index are kept visible. Invalid geometries
    /// are skipped and the rest of the batch is still evaluated.
    pub fn clean(&self, features: &[Feature], k_threshold: Option<f64>) -> CleanOutcome {
        let threshold = k_threshold.unwrap_or(self.default_threshold);
        let mut outcome = CleanOutcome::default();

        for feature in features {
            match self.evaluate(&feature.geometry) {
                Evaluation::Index(k) => {
                    outcome.evaluated += 1;
                    tracing::trace!(id = %feature.id, k, "Computed compactness index");
                    if k > threshold {
                        outcome.ids_to_hide.push(feature.id.clone());
                    }
                }
                Evaluation::Undefined(reason) => {
                    outcome.undefined += 1;
                    tracing::debug!(id = %feature.id, ?reason, "Compactness index undefined, keeping feature");
                }
                Evaluation::Invalid(e) => {
                    outcome.invalid += 1;
                    tracing::warn!(id = %feature.id, error = %e, "Skipping feature with invalid geometry");
                }
            }
        }

        outcome
    }
}
