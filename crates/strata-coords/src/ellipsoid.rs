//! WGS84 ellipsoid math needed to place a local scene on the globe.

use glam::{DMat4, DVec3};

/// Semi-axes of the WGS84 ellipsoid in meters.
pub const WGS84_RADII: DVec3 = DVec3::new(6_378_137.0, 6_378_137.0, 6_356_752.314_245_179_3);

/// Below this length the east axis is treated as undefined (origin on the polar axis).
const POLAR_EPSILON: f64 = 1e-12;

/// A geodetic position: longitude and latitude in radians, height in meters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl Cartographic {
    pub fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Self {
            longitude,
            latitude,
            height,
        }
    }

    pub fn from_degrees(longitude: f64, latitude: f64, height: f64) -> Self {
        Self::new(longitude.to_radians(), latitude.to_radians(), height)
    }
}

/// Unit normal of the ellipsoid surface below a cartographic position.
pub fn geodetic_surface_normal(cartographic: &Cartographic) -> DVec3 {
    let cos_lat = cartographic.latitude.cos();
    DVec3::new(
        cos_lat * cartographic.longitude.cos(),
        cos_lat * cartographic.longitude.sin(),
        cartographic.latitude.sin(),
    )
    .normalize()
}

/// Earth-centered, earth-fixed position of a cartographic coordinate.
pub fn cartographic_to_cartesian(cartographic: &Cartographic) -> DVec3 {
    let radii_squared = WGS84_RADII * WGS84_RADII;
    let n = geodetic_surface_normal(cartographic);
    let k = radii_squared * n;
    let gamma = n.dot(k).sqrt();
    k / gamma + n * cartographic.height
}

/// Frame with +X east, +Y north and +Z up, centered at `origin` (ECEF).
pub fn east_north_up_to_fixed_frame(origin: DVec3) -> DMat4 {
    let one_over_radii_squared = DVec3::ONE / (WGS84_RADII * WGS84_RADII);
    let up = (origin * one_over_radii_squared).normalize_or(DVec3::Z);

    let east = DVec3::new(-up.y, up.x, 0.0);
    let east = if east.length() < POLAR_EPSILON {
        DVec3::Y
    } else {
        east.normalize()
    };
    let north = up.cross(east);

    DMat4::from_cols(
        east.extend(0.0),
        north.extend(0.0),
        up.extend(0.0),
        origin.extend(1.0),
    )
}
