//! Pure-Rust WGS84 → transverse Mercator reprojection.
//!
//! Forward mapping uses the Krüger series in the third flattening, carried to
//! order n⁶ (Karney 2011, "Transverse Mercator with an accuracy of a few
//! nanometers"), the same series PROJ uses for `tmerc`. It stays at
//! sub-millimetre accuracy tens of degrees away from the central meridian,
//! which the zone 25 Gauss-Kruger grid needs for features across eastern China.
//!
//! Covers the CGCS2000 3-degree Gauss-Kruger family (EPSG 4513–4554) and
//! WGS84 / UTM (EPSG 326xx, 327xx). No libproj, so the transformer is a plain
//! value that can be built once and shared across threads.

use geo::{Coord, MapCoords, Polygon};
use thiserror::Error;

/// Errors produced while reprojecting coordinates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("unsupported target CRS EPSG:{0}")]
    UnsupportedCrs(u32),

    #[error("coordinate ({lon}, {lat}) is outside the projection domain")]
    OutOfDomain { lon: f64, lat: f64 },
}

/// A pointwise forward transform from geographic (lon, lat) degrees to planar metres.
pub trait Reproject: Send + Sync {
    fn forward(&self, coord: Coord<f64>) -> Result<Coord<f64>, ProjectionError>;
}

// ── Ellipsoids ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis (m)
    pub a: f64,
    /// Flattening
    pub f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };

    /// CGCS2000 shares the GRS80 axis and differs from WGS84 only in the flattening.
    pub const CGCS2000: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_222_101,
    };

    fn eccentricity(&self) -> f64 {
        (self.f * (2.0 - self.f)).sqrt()
    }

    fn third_flattening(&self) -> f64 {
        self.f / (2.0 - self.f)
    }
}

// ── Transverse Mercator ──────────────────────────────────────────────────

/// Longitudes this far or further from the central meridian have no finite image.
const MAX_MERIDIAN_OFFSET_DEG: f64 = 90.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TransverseMercator {
    epsg: Option<u32>,
    lon0_deg: f64,
    k0: f64,
    false_easting: f64,
    false_northing: f64,
    /// First eccentricity.
    e: f64,
    /// Rectifying radius A (m).
    rectifying_radius: f64,
    /// Krüger α₁..α₆.
    alpha: [f64; 6],
}

impl TransverseMercator {
    pub fn new(
        ellipsoid: Ellipsoid,
        lon0_deg: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let n = ellipsoid.third_flattening();
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;
        let n5 = n4 * n;
        let n6 = n5 * n;

        let rectifying_radius =
            ellipsoid.a / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

        // Karney 2011, eq. 35.
        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0 - 127.0 * n5 / 288.0
                + 7891.0 * n6 / 37800.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0 + 281.0 * n5 / 630.0
                - 1_983_433.0 * n6 / 1_935_360.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0 + 15061.0 * n5 / 26880.0
                + 167_603.0 * n6 / 181_440.0,
            49561.0 * n4 / 161_280.0 - 179.0 * n5 / 168.0 + 6_601_661.0 * n6 / 7_257_600.0,
            34729.0 * n5 / 80640.0 - 3_418_889.0 * n6 / 1_995_840.0,
            212_378_941.0 * n6 / 319_334_400.0,
        ];

        Self {
            epsg: None,
            lon0_deg,
            k0,
            false_easting,
            false_northing,
            e: ellipsoid.eccentricity(),
            rectifying_radius,
            alpha,
        }
    }

    /// Build the projection for a supported EPSG code.
    ///
    /// - EPSG 4513–4533 → CGCS2000 / 3-degree Gauss-Kruger zone 25–45 (zone-prefixed easting)
    /// - EPSG 4534–4554 → CGCS2000 / 3-degree Gauss-Kruger CM 75E–135E
    /// - EPSG 326xx / 327xx → WGS84 / UTM zone xx North / South
    pub fn from_epsg(epsg: u32) -> Result<Self, ProjectionError> {
        let tm = match epsg {
            4513..=4533 => {
                let zone = (epsg - 4513 + 25) as f64;
                Self::new(
                    Ellipsoid::CGCS2000,
                    zone * 3.0,
                    1.0,
                    zone * 1_000_000.0 + 500_000.0,
                    0.0,
                )
            }
            4534..=4554 => {
                let lon0 = 75.0 + 3.0 * (epsg - 4534) as f64;
                Self::new(Ellipsoid::CGCS2000, lon0, 1.0, 500_000.0, 0.0)
            }
            32601..=32660 => Self::utm(epsg - 32600, true),
            32701..=32760 => Self::utm(epsg - 32700, false),
            other => return Err(ProjectionError::UnsupportedCrs(other)),
        };
        Ok(Self {
            epsg: Some(epsg),
            ..tm
        })
    }

    fn utm(zone: u32, north: bool) -> Self {
        let lon0 = (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0;
        let false_northing = if north { 0.0 } else { 10_000_000.0 };
        Self::new(Ellipsoid::WGS84, lon0, 0.9996, 500_000.0, false_northing)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    fn in_domain(&self, lon_deg: f64, lat_deg: f64) -> bool {
        lon_deg.is_finite()
            && lat_deg.is_finite()
            && lat_deg.abs() <= 90.0
            && lon_deg.abs() <= 180.0
            && normalize_lon(lon_deg - self.lon0_deg).abs() < MAX_MERIDIAN_OFFSET_DEG
    }

    /// Karney 2011, eqs. 7-11: conformal latitude, spherical TM, then the Krüger series.
    fn project(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let phi = lat_deg.to_radians();
        let lambda = normalize_lon(lon_deg - self.lon0_deg).to_radians();

        let sin_phi = phi.sin();
        let tau = (sin_phi.atanh() - self.e * (self.e * sin_phi).atanh()).sinh();
        let cos_lambda = lambda.cos();

        let xi_p = tau.atan2(cos_lambda);
        let eta_p = (lambda.sin() / tau.hypot(cos_lambda)).asinh();

        let (mut xi, mut eta) = (xi_p, eta_p);
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += alpha * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += alpha * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        let scale = self.k0 * self.rectifying_radius;
        (
            self.false_easting + scale * eta,
            self.false_northing + scale * xi,
        )
    }
}

impl Reproject for TransverseMercator {
    fn forward(&self, coord: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        let (lon, lat) = (coord.x, coord.y);
        if !self.in_domain(lon, lat) {
            return Err(ProjectionError::OutOfDomain { lon, lat });
        }
        let (x, y) = self.project(lon, lat);
        if !(x.is_finite() && y.is_finite()) {
            return Err(ProjectionError::OutOfDomain { lon, lat });
        }
        Ok(Coord { x, y })
    }
}

/// Wrap a longitude difference into (-180, 180].
fn normalize_lon(dlon: f64) -> f64 {
    let wrapped = (dlon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

/// Reproject every vertex of the exterior and all interiors, in order.
pub fn reproject_polygon<P: Reproject + ?Sized>(
    projection: &P,
    polygon: &Polygon<f64>,
) -> Result<Polygon<f64>, ProjectionError> {
    polygon.try_map_coords(|coord| projection.forward(coord))
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon};

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    #[test]
    fn gauss_kruger_zone_parameters() {
        for (epsg, lon0, false_easting) in [
            (4513, 75.0, 25_500_000.0),
            (4533, 135.0, 45_500_000.0),
            (4534, 75.0, 500_000.0),
            (4554, 135.0, 500_000.0),
        ] {
            let tm = TransverseMercator::from_epsg(epsg).unwrap();
            assert_eq!(tm.epsg(), Some(epsg));
            let p = tm.forward(coord! { x: lon0, y: 0.0 }).unwrap();
            assert_close(p.x, false_easting, 1e-6, &format!("EPSG:{epsg} easting at CM"));
            assert_close(p.y, 0.0, 1e-6, &format!("EPSG:{epsg} northing at equator"));
        }
    }

    // Reference from pyproj: Transformer.from_crs(4326, 4513, always_xy=True)
    //   .transform(121.5, 31.2) → (30134132.46, 4585179.17)
    // 46.5° east of the zone 25 meridian, where low-order series drift by kilometres.
    #[test]
    fn shanghai_far_from_zone_25_meridian() {
        let tm = TransverseMercator::from_epsg(4513).unwrap();
        let p = tm.forward(coord! { x: 121.5, y: 31.2 }).unwrap();
        assert_close(p.x, 30_134_132.46, 0.01, "easting");
        assert_close(p.y, 4_585_179.17, 0.01, "northing");
    }

    // Harbin, 51.6° east of the zone 25 meridian.
    #[test]
    fn harbin_far_from_zone_25_meridian() {
        let tm = TransverseMercator::from_epsg(4513).unwrap();
        let p = tm.forward(coord! { x: 126.6, y: 45.75 }).unwrap();
        assert_close(p.x, 29_422_111.606, 0.01, "easting");
        assert_close(p.y, 6_526_908.043, 0.01, "northing");
    }

    #[test]
    fn unsupported_epsg_is_rejected() {
        assert_eq!(
            TransverseMercator::from_epsg(3857),
            Err(ProjectionError::UnsupportedCrs(3857))
        );
        assert!(TransverseMercator::from_epsg(4512).is_err());
        assert!(TransverseMercator::from_epsg(32600).is_err());
        assert!(TransverseMercator::from_epsg(32761).is_err());
    }

    #[test]
    fn equator_central_meridian_maps_to_false_origin() {
        let tm = TransverseMercator::from_epsg(4513).unwrap();
        let p = tm.forward(coord! { x: 75.0, y: 0.0 }).unwrap();
        assert_close(p.x, 25_500_000.0, 1e-6, "easting at CM");
        assert_close(p.y, 0.0, 1e-6, "northing at equator");
    }

    // GRS80 meridional arc to 1°N is 110574.389 m; scale on the CM is 1.
    #[test]
    fn one_degree_of_latitude_on_central_meridian() {
        let tm = TransverseMercator::from_epsg(4513).unwrap();
        let p = tm.forward(coord! { x: 75.0, y: 1.0 }).unwrap();
        assert_close(p.x, 25_500_000.0, 1e-6, "easting on CM");
        assert_close(p.y, 110_574.389, 0.01, "northing at 1°N");
    }

    #[test]
    fn eastings_are_symmetric_about_the_central_meridian() {
        let tm = TransverseMercator::from_epsg(4513).unwrap();
        let east = tm.forward(coord! { x: 76.0, y: 30.0 }).unwrap();
        let west = tm.forward(coord! { x: 74.0, y: 30.0 }).unwrap();
        assert_close(east.x - 25_500_000.0, 25_500_000.0 - west.x, 1e-6, "symmetry");
        assert_close(east.y, west.y, 1e-6, "northing");
        assert_close(east.x, 25_596_488.748, 0.01, "easting 1° east");
        assert_close(east.y, 3_320_534.436, 0.01, "northing at 30°N");
    }

    // Reference from pyproj: Transformer.from_crs(4326, 32630, always_xy=True)
    //   .transform(-3.7037, 40.4168) → (440298.94, 4474257.31)
    #[test]
    fn madrid_wgs84_to_utm30n() {
        let tm = TransverseMercator::from_epsg(32630).unwrap();
        let p = tm.forward(coord! { x: -3.7037, y: 40.4168 }).unwrap();
        assert_close(p.x, 440_298.94, 1.0, "easting");
        assert_close(p.y, 4_474_257.31, 1.0, "northing");
    }

    // Reference from pyproj: (-58.3816, -34.6037) → EPSG:32721 (373317.50, 6170036.17)
    #[test]
    fn buenos_aires_wgs84_to_utm21s() {
        let tm = TransverseMercator::from_epsg(32721).unwrap();
        let p = tm.forward(coord! { x: -58.3816, y: -34.6037 }).unwrap();
        assert_close(p.x, 373_317.50, 1.0, "easting");
        assert_close(p.y, 6_170_036.17, 1.0, "northing");
    }

    #[test]
    fn out_of_domain_coordinates_are_errors_not_panics() {
        let tm = TransverseMercator::from_epsg(4513).unwrap();
        for (lon, lat) in [
            (75.0, 91.0),
            (181.0, 0.0),
            (f64::NAN, 0.0),
            (75.0, f64::INFINITY),
            (-105.0, 10.0),
        ] {
            assert!(
                matches!(
                    tm.forward(coord! { x: lon, y: lat }),
                    Err(ProjectionError::OutOfDomain { .. })
                ),
                "({lon}, {lat}) should be out of domain"
            );
        }
    }

    #[test]
    fn reprojection_preserves_ring_structure() {
        let tm = TransverseMercator::from_epsg(4513).unwrap();
        let poly = polygon!(
            exterior: [
                (x: 75.0, y: 30.0),
                (x: 75.1, y: 30.0),
                (x: 75.1, y: 30.1),
                (x: 75.0, y: 30.1),
            ],
            interiors: [[
                (x: 75.02, y: 30.02),
                (x: 75.02, y: 30.04),
                (x: 75.04, y: 30.04),
            ]],
        );

        let projected = reproject_polygon(&tm, &poly).unwrap();
        assert_eq!(projected.exterior().0.len(), poly.exterior().0.len());
        assert_eq!(projected.interiors().len(), 1);
        assert_eq!(projected.interiors()[0].0.len(), poly.interiors()[0].0.len());

        for (src, dst) in poly.exterior().coords().zip(projected.exterior().coords()) {
            assert_eq!(tm.forward(*src).unwrap(), *dst);
        }
    }

    #[test]
    fn one_bad_vertex_fails_the_whole_polygon() {
        let tm = TransverseMercator::from_epsg(4513).unwrap();
        let poly = polygon![
            (x: 75.0, y: 30.0),
            (x: 75.1, y: 95.0),
            (x: 75.0, y: 30.1),
        ];
        assert!(reproject_polygon(&tm, &poly).is_err());
    }

    #[test]
    fn normalize_lon_wraps_into_half_open_range() {
        assert_close(normalize_lon(190.0), -170.0, 1e-12, "190");
        assert_close(normalize_lon(-190.0), 170.0, 1e-12, "-190");
        assert_close(normalize_lon(-180.0), 180.0, 1e-12, "-180");
        assert_close(normalize_lon(45.0), 45.0, 1e-12, "45");
    }
}
