//! Geographic and local planar coordinate types.
//!
//! Positions arrive over the wire as latitude/longitude pairs; all planning
//! runs in a local tangent-plane frame anchored at a fixed origin. The
//! projection is the equirectangular approximation: one degree of latitude is
//! a constant number of meters, one degree of longitude is that constant
//! scaled by the cosine of the origin latitude. Round-trip error stays below
//! centimeter scale for points within tens of kilometers of the origin and
//! degrades gracefully beyond that; no error is raised at larger distances.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Meters per degree of latitude in the equirectangular model.
pub const M_PER_DEG_LAT: f64 = 111_320.0;

/// Geographic position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[inline]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Position in meters in the local tangent-plane frame (x = east, y = north).
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    /// Origin of the local frame
    pub const ZERO: PlanarPoint = PlanarPoint { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &PlanarPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Length (magnitude) of this point as a vector from origin
    #[inline]
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Normalize to unit length; zero vectors stay zero
    #[inline]
    pub fn normalize(&self) -> PlanarPoint {
        let len = self.length();
        if len > 1e-9 {
            PlanarPoint::new(self.x / len, self.y / len)
        } else {
            PlanarPoint::ZERO
        }
    }

    /// Dot product with another point (as vectors)
    #[inline]
    pub fn dot(&self, other: &PlanarPoint) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Perpendicular vector (rotated 90 degrees counter-clockwise)
    #[inline]
    pub fn perpendicular(&self) -> PlanarPoint {
        PlanarPoint::new(-self.y, self.x)
    }
}

impl Add for PlanarPoint {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        PlanarPoint::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for PlanarPoint {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        PlanarPoint::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for PlanarPoint {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self {
        PlanarPoint::new(self.x * scalar, self.y * scalar)
    }
}

/// Normalize a longitude difference into [-180, 180), handling antimeridian
/// wraparound.
#[inline]
pub fn wrap_longitude(deg: f64) -> f64 {
    ((deg + 180.0) % 360.0 + 360.0) % 360.0 - 180.0
}

/// Projection between geographic and local planar coordinates.
///
/// The origin is fixed for the lifetime of the projector; a session that has
/// no configured origin anchors the projector at the mission's start point.
#[derive(Clone, Debug)]
pub struct GeoProjector {
    origin: GeoPoint,
    m_per_deg_lon: f64,
}

impl GeoProjector {
    pub fn new(origin: GeoPoint) -> Self {
        let m_per_deg_lon = M_PER_DEG_LAT * origin.lat.to_radians().cos();
        Self {
            origin,
            m_per_deg_lon,
        }
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Project a geographic point into the local planar frame.
    pub fn to_planar(&self, gps: GeoPoint) -> PlanarPoint {
        let dlat = gps.lat - self.origin.lat;
        let dlon = wrap_longitude(gps.lon - self.origin.lon);
        PlanarPoint::new(dlon * self.m_per_deg_lon, dlat * M_PER_DEG_LAT)
    }

    /// Project a local planar point back to geographic coordinates.
    pub fn to_geo(&self, pt: PlanarPoint) -> GeoPoint {
        let lat = self.origin.lat + pt.y / M_PER_DEG_LAT;
        let lon = wrap_longitude(self.origin.lon + pt.x / self.m_per_deg_lon);
        GeoPoint::new(lat, lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_near_origin() {
        let proj = GeoProjector::new(GeoPoint::new(47.3977, 8.5456));
        let gps = GeoPoint::new(47.4012, 8.5521);
        let back = proj.to_geo(proj.to_planar(gps));
        assert!((back.lat - gps.lat).abs() < 1e-9);
        assert!((back.lon - gps.lon).abs() < 1e-9);
    }

    #[test]
    fn test_roundtrip_ten_km() {
        // ~10 km east and north of the origin; round trip must stay under 1 cm
        let proj = GeoProjector::new(GeoPoint::new(46.0, 7.0));
        let pt = PlanarPoint::new(10_000.0, 10_000.0);
        let back = proj.to_planar(proj.to_geo(pt));
        assert!((back.x - pt.x).abs() < 0.01);
        assert!((back.y - pt.y).abs() < 0.01);
    }

    #[test]
    fn test_latitude_scaling() {
        // One degree of longitude at 60N spans half the meters it does at the equator
        let equator = GeoProjector::new(GeoPoint::new(0.0, 0.0));
        let north = GeoProjector::new(GeoPoint::new(60.0, 0.0));
        let east = GeoPoint::new(0.0, 1.0);
        let x_eq = equator.to_planar(east).x;
        let x_n = north.to_planar(GeoPoint::new(60.0, 1.0)).x;
        assert!((x_eq - M_PER_DEG_LAT).abs() < 1e-6);
        assert!((x_n - M_PER_DEG_LAT * 0.5).abs() < 1.0);
    }

    #[test]
    fn test_antimeridian_wrap() {
        let proj = GeoProjector::new(GeoPoint::new(0.0, 179.9));
        // 0.2 degrees east across the antimeridian, not 359.8 degrees west
        let pt = proj.to_planar(GeoPoint::new(0.0, -179.9));
        assert!(pt.x > 0.0);
        assert!((pt.x - 0.2 * M_PER_DEG_LAT).abs() < 1.0);
    }

    #[test]
    fn test_wrap_longitude_range() {
        assert_eq!(wrap_longitude(180.0), -180.0);
        assert_eq!(wrap_longitude(-180.0), -180.0);
        assert!((wrap_longitude(190.0) - (-170.0)).abs() < 1e-9);
        assert!((wrap_longitude(-190.0) - 170.0).abs() < 1e-9);
    }
}
