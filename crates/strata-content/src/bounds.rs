use glam::{DMat4, DVec3, Vec3};

/// Axis-aligned bounding box in double precision.
///
/// Invariant: `min <= max` on every axis. [`Aabb::new`] sorts components.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Create a box from two corners in any order.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box enclosing all points, or `None` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let first = first.as_dvec3();
        let (min, max) = rest.iter().fold((first, first), |(min, max), p| {
            let p = p.as_dvec3();
            (min.min(p), max.max(p))
        });
        Some(Self { min, max })
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// The eight corners, ordered by the bit pattern `zyx` (0 = min, 1 = max).
    pub fn corners(&self) -> [DVec3; 8] {
        std::array::from_fn(|i| {
            DVec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    /// Bounds of this box after an affine transform.
    pub fn transformed(&self, transform: &DMat4) -> Self {
        let corners = self.corners().map(|c| transform.transform_point3(c));
        let (min, max) = corners[1..]
            .iter()
            .fold((corners[0], corners[0]), |(min, max), c| {
                (min.min(*c), max.max(*c))
            });
        Self { min, max }
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}
