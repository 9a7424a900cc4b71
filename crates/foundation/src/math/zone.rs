//! Geodetic reference frames ("zones") and point conversion between them.
//!
//! Every zone has a cartesian representation and a lat/long/height
//! representation. Conversions always go through WGS84 lat/long, which keeps
//! the number of pairwise cases linear in the number of supported frames.

use super::{Ecef, Geodetic, Vec3, WGS84_A, WGS84_E2, ecef_to_geodetic, geodetic_to_ecef};
use crate::bounds::LatLongBounds;

pub const SRID_WGS84_GEOGRAPHIC: u32 = 4326;
pub const SRID_WGS84_ECEF: u32 = 4978;
pub const SRID_WEB_MERCATOR: u32 = 3857;

const UTM_SCALE: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ZoneProjection {
    /// Cartesian x = longitude (deg), y = latitude (deg), z = height (m).
    Geographic,
    Ecef,
    WebMercator,
    Utm { zone: u8, north: bool },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GeoZoneError {
    UnsupportedSrid(u32),
}

impl std::fmt::Display for GeoZoneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoZoneError::UnsupportedSrid(srid) => write!(f, "unsupported SRID {srid}"),
        }
    }
}

impl std::error::Error for GeoZoneError {}

/// A geodetic reference frame plus an optional lat/long bounding box.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoZone {
    pub srid: u32,
    pub projection: ZoneProjection,
    pub bounds: LatLongBounds,
}

impl GeoZone {
    pub fn from_srid(srid: u32) -> Result<Self, GeoZoneError> {
        let (projection, bounds) = match srid {
            SRID_WGS84_GEOGRAPHIC => (ZoneProjection::Geographic, LatLongBounds::unbounded()),
            SRID_WGS84_ECEF => (ZoneProjection::Ecef, LatLongBounds::unbounded()),
            SRID_WEB_MERCATOR => (
                ZoneProjection::WebMercator,
                LatLongBounds::from_degrees(
                    -WEB_MERCATOR_MAX_LAT,
                    -180.0,
                    WEB_MERCATOR_MAX_LAT,
                    180.0,
                ),
            ),
            32601..=32660 | 32701..=32760 => {
                let north = srid < 32700;
                let zone = (srid % 100) as u8;
                let lon0 = utm_central_meridian(zone);
                let (min_lat, max_lat) = if north { (0.0, 84.0) } else { (-80.0, 0.0) };
                (
                    ZoneProjection::Utm { zone, north },
                    LatLongBounds::from_degrees(min_lat, lon0 - 3.0, max_lat, lon0 + 3.0),
                )
            }
            other => return Err(GeoZoneError::UnsupportedSrid(other)),
        };

        Ok(Self {
            srid,
            projection,
            bounds,
        })
    }

    /// Same frame, caller-supplied bounds.
    pub fn with_bounds(mut self, bounds: LatLongBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn is_projected(&self) -> bool {
        matches!(
            self.projection,
            ZoneProjection::WebMercator | ZoneProjection::Utm { .. }
        )
    }

    pub fn name(&self) -> String {
        match self.projection {
            ZoneProjection::Geographic => "WGS 84".to_string(),
            ZoneProjection::Ecef => "WGS 84 (ECEF)".to_string(),
            ZoneProjection::WebMercator => "WGS 84 / Pseudo-Mercator".to_string(),
            ZoneProjection::Utm { zone, north } => {
                format!("WGS 84 / UTM zone {zone}{}", if north { 'N' } else { 'S' })
            }
        }
    }

    /// Converts a cartesian point in this zone to `(lat°, lon°, height m)`.
    pub fn to_lat_long(&self, p: Vec3) -> Vec3 {
        match self.projection {
            ZoneProjection::Geographic => Vec3::new(p.y, p.x, p.z),
            ZoneProjection::Ecef => {
                let geo = ecef_to_geodetic(Ecef::from(p));
                Vec3::new(geo.lat_deg(), geo.lon_deg(), geo.alt_m)
            }
            ZoneProjection::WebMercator => {
                let lon = (p.x / WGS84_A).to_degrees();
                let lat = (2.0 * (p.y / WGS84_A).exp().atan() - std::f64::consts::FRAC_PI_2)
                    .to_degrees();
                Vec3::new(lat, lon, p.z)
            }
            ZoneProjection::Utm { zone, north } => {
                let (lat, lon) = utm_inverse(zone, north, p.x, p.y);
                Vec3::new(lat, lon, p.z)
            }
        }
    }

    /// Converts `(lat°, lon°, height m)` into this zone's cartesian space.
    pub fn from_lat_long(&self, lat_long: Vec3) -> Vec3 {
        let (lat, lon, h) = (lat_long.x, lat_long.y, lat_long.z);
        match self.projection {
            ZoneProjection::Geographic => Vec3::new(lon, lat, h),
            ZoneProjection::Ecef => geodetic_to_ecef(Geodetic::from_degrees(lat, lon, h)).as_vec3(),
            ZoneProjection::WebMercator => {
                let lat = lat.clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT);
                let x = WGS84_A * lon.to_radians();
                let y = WGS84_A
                    * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0)
                        .tan()
                        .ln();
                Vec3::new(x, y, h)
            }
            ZoneProjection::Utm { zone, north } => {
                let (e, n) = utm_forward(zone, north, lat, lon);
                Vec3::new(e, n, h)
            }
        }
    }

    /// Whether a cartesian point of this zone falls inside its bounds.
    pub fn contains(&self, p: Vec3) -> bool {
        let ll = self.to_lat_long(p);
        self.bounds.contains(ll.x, ll.y)
    }
}

/// Re-expresses `point` (cartesian in `from`) as a cartesian point in `to`.
pub fn transform_point(point: Vec3, from: &GeoZone, to: &GeoZone) -> Vec3 {
    if from.srid == to.srid {
        return point;
    }
    to.from_lat_long(from.to_lat_long(point))
}

fn utm_central_meridian(zone: u8) -> f64 {
    f64::from(zone) * 6.0 - 183.0
}

fn meridian_arc(phi: f64) -> f64 {
    let e2 = WGS84_E2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

// Transverse Mercator series (Snyder, USGS PP 1395).
fn utm_forward(zone: u8, north: bool, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
    let ep2 = WGS84_E2 / (1.0 - WGS84_E2);
    let phi = lat_deg.to_radians();
    let dlam = (lon_deg - utm_central_meridian(zone)).to_radians();

    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = dlam * cos_phi;
    let m = meridian_arc(phi);

    let x = UTM_SCALE
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0);
    let y = UTM_SCALE
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

    let false_northing = if north { 0.0 } else { UTM_FALSE_NORTHING_SOUTH };
    (x + UTM_FALSE_EASTING, y + false_northing)
}

fn utm_inverse(zone: u8, north: bool, easting: f64, northing: f64) -> (f64, f64) {
    let e2 = WGS84_E2;
    let ep2 = e2 / (1.0 - e2);
    let x = easting - UTM_FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - UTM_FALSE_NORTHING_SOUTH
    };

    let m = y / UTM_SCALE;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2.powi(3) / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin_phi1, cos_phi1) = phi1.sin_cos();
    let tan_phi1 = phi1.tan();
    let c1 = ep2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let w = 1.0 - e2 * sin_phi1 * sin_phi1;
    let n1 = WGS84_A / w.sqrt();
    let r1 = WGS84_A * (1.0 - e2) / w.powf(1.5);
    let d = x / (n1 * UTM_SCALE);

    let phi = phi1
        - (n1 * tan_phi1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lam = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
            / 120.0)
        / cos_phi1;

    (phi.to_degrees(), utm_central_meridian(zone) + lam.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::{GeoZone, GeoZoneError, ZoneProjection, transform_point};
    use crate::math::{Vec3, WGS84_A};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn parses_utm_srids() {
        let z = GeoZone::from_srid(32756).unwrap();
        assert_eq!(z.projection, ZoneProjection::Utm { zone: 56, north: false });
        assert!(z.is_projected());
        assert_eq!(z.name(), "WGS 84 / UTM zone 56S");
        assert_close(z.bounds.min.y, 150.0, 1e-12);
        assert_close(z.bounds.max.y, 156.0, 1e-12);
    }

    #[test]
    fn rejects_unknown_srid() {
        assert_eq!(
            GeoZone::from_srid(1234),
            Err(GeoZoneError::UnsupportedSrid(1234))
        );
    }

    #[test]
    fn utm_central_meridian_on_equator() {
        let z = GeoZone::from_srid(32631).unwrap();
        let p = z.from_lat_long(Vec3::new(0.0, 3.0, 0.0));
        assert_close(p.x, 500_000.0, 1e-6);
        assert_close(p.y, 0.0, 1e-6);
    }

    #[test]
    fn utm_northing_at_45_degrees() {
        let z = GeoZone::from_srid(32631).unwrap();
        let p = z.from_lat_long(Vec3::new(45.0, 3.0, 0.0));
        assert_close(p.y, 4_982_950.4, 1.0);
    }

    #[test]
    fn utm_round_trip_inside_zone() {
        let z = GeoZone::from_srid(32756).unwrap();
        let ll = Vec3::new(-33.8688, 151.2093, 42.0);
        let rt = z.to_lat_long(z.from_lat_long(ll));
        assert_close(rt.x, ll.x, 1e-6);
        assert_close(rt.y, ll.y, 1e-6);
        assert_close(rt.z, ll.z, 1e-12);
    }

    #[test]
    fn web_mercator_round_trip() {
        let z = GeoZone::from_srid(3857).unwrap();
        let ll = Vec3::new(51.5, -0.12, 0.0);
        let p = z.from_lat_long(ll);
        let rt = z.to_lat_long(p);
        assert_close(rt.x, ll.x, 1e-9);
        assert_close(rt.y, ll.y, 1e-9);
        assert_close(z.from_lat_long(Vec3::new(0.0, 180.0, 0.0)).x, WGS84_A * std::f64::consts::PI, 1e-6);
    }

    #[test]
    fn transform_between_zones_goes_through_lat_long() {
        let geo = GeoZone::from_srid(4326).unwrap();
        let ecef = GeoZone::from_srid(4978).unwrap();
        let p = transform_point(Vec3::new(0.0, 0.0, 0.0), &geo, &ecef);
        assert_close(p.x, WGS84_A, 1e-6);
        let back = transform_point(p, &ecef, &geo);
        assert_close(back.x, 0.0, 1e-9);
        assert_close(back.y, 0.0, 1e-9);
    }

    #[test]
    fn same_srid_transform_is_identity() {
        let z = GeoZone::from_srid(32655).unwrap();
        let p = Vec3::new(123.0, 456.0, 7.0);
        assert_eq!(transform_point(p, &z, &z), p);
    }

    #[test]
    fn contains_uses_zone_bounds() {
        let z = GeoZone::from_srid(32656).unwrap();
        let inside = z.from_lat_long(Vec3::new(30.0, 153.0, 0.0));
        assert!(z.contains(inside));
        let geo = GeoZone::from_srid(4326).unwrap();
        assert!(geo.contains(Vec3::new(-170.0, 60.0, 0.0)));
    }
}
