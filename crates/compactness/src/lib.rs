//! Compactness filtering for polygon features.
//!
//! Each polygon is reprojected from WGS84 into a planar CRS, measured, and
//! scored with the compactness index `k = perimeter² / area`. Features whose
//! index exceeds a threshold are reported as too thin or irregular to show.

pub mod filter;
pub mod index;
pub mod projection;
pub mod shape;

pub use filter::{
    CleanOutcome, CompactnessFilter, Evaluation, Feature, UndefinedReason, DEFAULT_K_THRESHOLD,
};
pub use index::compactness_index;
pub use projection::{reproject_polygon, Ellipsoid, ProjectionError, Reproject, TransverseMercator};
pub use shape::{parse_polygon, PlanarShape, ShapeError};
