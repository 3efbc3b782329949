//! The global/local transform pair for one scene.
//!
//! `local_to_global` maps host scene coordinates (whatever up axis and unit
//! the host uses) into earth-fixed meters; `global_to_local` is its inverse.
//! Tiles cache their earth-fixed transform and compose it with
//! `global_to_local` every frame, so moving the origin never reloads content.

use crossbeam_channel::{Receiver, Sender};
use glam::{DMat4, DVec3, DVec4};

use crate::ellipsoid::{Cartographic, cartographic_to_cartesian, east_north_up_to_fixed_frame};

/// Converts a Y-up frame into a Z-up frame.
pub const Y_UP_TO_Z_UP: DMat4 = DMat4::from_cols(
    DVec4::new(1.0, 0.0, 0.0, 0.0),
    DVec4::new(0.0, 0.0, 1.0, 0.0),
    DVec4::new(0.0, -1.0, 0.0, 0.0),
    DVec4::new(0.0, 0.0, 0.0, 1.0),
);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpAxis {
    Y,
    #[default]
    Z,
}

/// Unit and axis convention of the host scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneConvention {
    pub up_axis: UpAxis,
    pub meters_per_unit: f64,
}

impl Default for SceneConvention {
    fn default() -> Self {
        Self {
            up_axis: UpAxis::Z,
            meters_per_unit: 1.0,
        }
    }
}

impl SceneConvention {
    /// Axis conversion followed by unit scaling, local units to meters.
    pub fn to_meters(&self) -> DMat4 {
        let axis = match self.up_axis {
            UpAxis::Y => Y_UP_TO_Z_UP,
            UpAxis::Z => DMat4::IDENTITY,
        };
        axis * DMat4::from_scale(DVec3::splat(self.meters_per_unit))
    }
}

/// What the local frame is anchored to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Origin {
    /// The scene sits at the earth-fixed origin, with no georeference.
    Local,
    /// East-north-up frame at a geodetic position.
    Georeferenced(Cartographic),
}

/// Broadcast after every recomputation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateEvent {
    pub revision: u64,
    pub origin: Origin,
    pub global_to_local: DMat4,
    pub local_to_global: DMat4,
}

pub struct CoordinateSystem {
    convention: SceneConvention,
    origin: Origin,
    local_to_global: DMat4,
    global_to_local: DMat4,
    revision: u64,
    subscribers: Vec<Sender<CoordinateEvent>>,
}

impl CoordinateSystem {
    /// A local (non-georeferenced) system for the given convention.
    pub fn new(convention: SceneConvention) -> Self {
        let mut system = Self {
            convention,
            origin: Origin::Local,
            local_to_global: DMat4::IDENTITY,
            global_to_local: DMat4::IDENTITY,
            revision: 0,
            subscribers: Vec::new(),
        };
        system.recompute();
        system
    }

    /// Anchor the scene to an east-north-up frame at `origin`.
    pub fn set_georeference_origin(&mut self, origin: Cartographic) {
        self.origin = Origin::Georeferenced(origin);
        self.recompute();
    }

    /// Drop the georeference; only axis and unit conversion remain.
    pub fn set_local_origin(&mut self) {
        self.origin = Origin::Local;
        self.recompute();
    }

    /// Change the host scene's unit/axis convention, keeping the origin.
    pub fn set_convention(&mut self, convention: SceneConvention) {
        if convention == self.convention {
            return;
        }
        self.convention = convention;
        self.recompute();
    }

    pub fn convention(&self) -> SceneConvention {
        self.convention
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn local_to_global(&self) -> DMat4 {
        self.local_to_global
    }

    pub fn global_to_local(&self) -> DMat4 {
        self.global_to_local
    }

    /// Incremented on every recomputation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Earth-fixed point to host scene coordinates.
    pub fn to_local_point(&self, global: DVec3) -> DVec3 {
        self.global_to_local.transform_point3(global)
    }

    /// Receive a [`CoordinateEvent`] after each future recomputation.
    pub fn subscribe(&mut self) -> Receiver<CoordinateEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn recompute(&mut self) {
        let to_meters = self.convention.to_meters();
        self.local_to_global = match self.origin {
            Origin::Local => to_meters,
            Origin::Georeferenced(cartographic) => {
                east_north_up_to_fixed_frame(cartographic_to_cartesian(&cartographic)) * to_meters
            }
        };
        self.global_to_local = self.local_to_global.inverse();
        self.revision += 1;

        let event = CoordinateEvent {
            revision: self.revision,
            origin: self.origin,
            global_to_local: self.global_to_local,
            local_to_global: self.local_to_global,
        };
        // Dropped receivers unsubscribe.
        self.subscribers.retain(|tx| tx.send(event).is_ok());

        tracing::debug!(
            revision = self.revision,
            origin = ?self.origin,
            meters_per_unit = self.convention.meters_per_unit,
            "coordinate system recomputed"
        );
    }
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        Self::new(SceneConvention::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ellipsoid::WGS84_RADII;

    fn assert_close(a: DVec3, b: DVec3, eps: f64) {
        assert!((a - b).length() < eps, "{a:?} != {b:?}");
    }

    #[test]
    fn test_default_is_identity() {
        let system = CoordinateSystem::default();
        assert_eq!(system.local_to_global(), DMat4::IDENTITY);
        assert_eq!(system.global_to_local(), DMat4::IDENTITY);
        assert_eq!(system.revision(), 1);
    }

    #[test]
    fn test_y_up_maps_y_to_z() {
        let y = Y_UP_TO_Z_UP.transform_vector3(DVec3::Y);
        assert_close(y, DVec3::Z, 1e-12);
        let z = Y_UP_TO_Z_UP.transform_vector3(DVec3::Z);
        assert_close(z, -DVec3::Y, 1e-12);
    }

    #[test]
    fn test_georeferenced_origin_maps_to_surface() {
        let mut system = CoordinateSystem::default();
        system.set_georeference_origin(Cartographic::new(0.0, 0.0, 0.0));
        let ecef = system.local_to_global().transform_point3(DVec3::ZERO);
        assert_close(ecef, DVec3::new(WGS84_RADII.x, 0.0, 0.0), 1e-6);
        let back = system.to_local_point(ecef);
        assert_close(back, DVec3::ZERO, 1e-6);
    }

    #[test]
    fn test_y_up_centimeter_scene() {
        let mut system = CoordinateSystem::new(SceneConvention {
            up_axis: UpAxis::Y,
            meters_per_unit: 0.01,
        });
        system.set_georeference_origin(Cartographic::new(0.0, 0.0, 0.0));

        // 100 units along local +Y is one meter up.
        let up = system
            .local_to_global()
            .transform_point3(DVec3::new(0.0, 100.0, 0.0));
        assert_close(up, DVec3::new(WGS84_RADII.x + 1.0, 0.0, 0.0), 1e-6);

        // 100 units along local +X is one meter east.
        let east = system
            .local_to_global()
            .transform_point3(DVec3::new(100.0, 0.0, 0.0));
        assert_close(east, DVec3::new(WGS84_RADII.x, 1.0, 0.0), 1e-6);
    }

    #[test]
    fn test_local_origin_drops_enu() {
        let mut system = CoordinateSystem::default();
        system.set_georeference_origin(Cartographic::from_degrees(10.0, 45.0, 0.0));
        system.set_local_origin();
        assert_eq!(system.origin(), Origin::Local);
        assert_eq!(system.local_to_global(), DMat4::IDENTITY);
    }

    #[test]
    fn test_subscribers_receive_events() {
        let mut system = CoordinateSystem::default();
        let rx = system.subscribe();
        system.set_georeference_origin(Cartographic::from_degrees(-105.0, 40.0, 1600.0));
        system.set_convention(SceneConvention {
            up_axis: UpAxis::Y,
            meters_per_unit: 1.0,
        });

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].revision, system.revision());
        assert_eq!(events[1].global_to_local, system.global_to_local());
    }

    #[test]
    fn test_unchanged_convention_is_ignored() {
        let mut system = CoordinateSystem::default();
        let rx = system.subscribe();
        system.set_convention(SceneConvention::default());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut system = CoordinateSystem::default();
        let rx = system.subscribe();
        drop(rx);
        system.set_local_origin();
        assert!(system.subscribers.is_empty());
    }
}
