//! GeoJSON polygon parsing and planar measurement.

use geo::{Area, Coord, EuclideanLength, LineString, Polygon};
use serde::Deserialize;
use thiserror::Error;

/// Errors produced while turning a raw GeoJSON geometry into a polygon.
#[derive(Error, Debug)]
pub enum ShapeError {
    #[error("invalid GeoJSON geometry: {0}")]
    GeoJson(#[from] serde_json::Error),

    #[error("expected a Polygon geometry, got {0}")]
    NotAPolygon(&'static str),

    #[error("polygon has no rings")]
    NoRings,

    #[error("ring {ring} position {position} has fewer than two ordinates")]
    ShortPosition { ring: usize, position: usize },

    #[error("ring {ring} has {len} positions, at least 3 are required")]
    RingTooShort { ring: usize, len: usize },
}

/// Something with a measurable boundary length and enclosed area in planar units.
pub trait PlanarShape {
    fn perimeter(&self) -> f64;
    fn area(&self) -> f64;
}

impl PlanarShape for Polygon<f64> {
    /// Exterior plus every hole boundary.
    fn perimeter(&self) -> f64 {
        self.exterior().euclidean_length()
            + self
                .interiors()
                .iter()
                .map(|ring| ring.euclidean_length())
                .sum::<f64>()
    }

    /// Exterior area minus holes.
    fn area(&self) -> f64 {
        self.unsigned_area()
    }
}

/// Parse a GeoJSON `Polygon` geometry object. Extra ordinates (altitude) are ignored.
pub fn parse_polygon(raw: &serde_json::Value) -> Result<Polygon<f64>, ShapeError> {
    let geometry = geojson::Geometry::deserialize(raw)?;

    let rings = match geometry.value {
        geojson::Value::Polygon(rings) => rings,
        other => return Err(ShapeError::NotAPolygon(type_name(&other))),
    };
    let mut line_strings = rings
        .iter()
        .enumerate()
        .map(|(ring_idx, ring)| to_line_string(ring_idx, ring));
    let exterior = line_strings.next().ok_or(ShapeError::NoRings)??;
    let interiors = line_strings.collect::<Result<Vec<_>, _>>()?;

    // Polygon::new closes any ring left open by the caller.
    Ok(Polygon::new(exterior, interiors))
}

fn to_line_string(ring_idx: usize, ring: &[Vec<f64>]) -> Result<LineString<f64>, ShapeError> {
    if ring.len() < 3 {
        return Err(ShapeError::RingTooShort {
            ring: ring_idx,
            len: ring.len(),
        });
    }
    ring.iter()
        .enumerate()
        .map(|(pos_idx, position)| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(ShapeError::ShortPosition {
                ring: ring_idx,
                position: pos_idx,
            }),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}
