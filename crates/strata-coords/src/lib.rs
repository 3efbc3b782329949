//! Coordinate conventions and the georeference transform pair.

mod ellipsoid;
mod system;

pub use ellipsoid::{
    Cartographic, WGS84_RADII, cartographic_to_cartesian, east_north_up_to_fixed_frame,
    geodetic_surface_normal,
};
pub use system::{
    CoordinateEvent, CoordinateSystem, Origin, SceneConvention, UpAxis, Y_UP_TO_Z_UP,
};
