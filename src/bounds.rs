use glam::{ DVec3, dvec3 };
use serde::{ Deserialize, Serialize };

use crate::error::{ Error, Result };

/// Axis-aligned box the grid is walked over.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: DVec3,
    pub max: DVec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::UNIT_CUBE
    }
}

impl Bounds {
    /// `[-1, 1]` on every axis
    pub const UNIT_CUBE: Self = Self {
        min: dvec3(-1.0, -1.0, -1.0),
        max: DVec3::ONE,
    };

    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Builds the box from a `(min, max)` pair per axis.
    pub fn from_ranges(x: (f64, f64), y: (f64, f64), z: (f64, f64)) -> Self {
        Self {
            min: dvec3(x.0, y.0, z.0),
            max: dvec3(x.1, y.1, z.1),
        }
    }

    /// The same `(min, max)` range on all three axes.
    pub fn cube(min: f64, max: f64) -> Self {
        Self {
            min: DVec3::splat(min),
            max: DVec3::splat(max),
        }
    }

    #[inline]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Grows the box to include `point`.
    pub fn expand(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Fails unless every axis has a finite, positive extent.
    pub fn validate(&self) -> Result<()> {
        let axes = ['x', 'y', 'z'];
        for (i, axis) in axes.into_iter().enumerate() {
            let (min, max) = (self.min[i], self.max[i]);
            if !min.is_finite() || !max.is_finite() || max <= min {
                return Err(Error::EmptyBounds { axis, min, max });
            }
        }
        Ok(())
    }
}

#[test]
fn bounds_contains() {
    let bounds = Bounds::UNIT_CUBE;
    assert!(bounds.contains(DVec3::ZERO));
    assert!(bounds.contains(DVec3::ONE));
    assert!(bounds.contains(dvec3(-1.0, 0.5, 1.0)));
    assert!(!bounds.contains(dvec3(0.0, 1.01, 0.0)));
}

#[test]
fn bounds_validate() {
    assert!(Bounds::UNIT_CUBE.validate().is_ok());
    assert!(Bounds::from_ranges((0.0, 2.0), (0.0, 1.0), (-3.0, -2.0)).validate().is_ok());

    let flat = Bounds::from_ranges((0.0, 1.0), (0.5, 0.5), (0.0, 1.0));
    assert!(matches!(flat.validate(), Err(Error::EmptyBounds { axis: 'y', .. })));

    let inverted = Bounds::cube(1.0, -1.0);
    assert!(matches!(inverted.validate(), Err(Error::EmptyBounds { axis: 'x', .. })));

    let infinite = Bounds::new(DVec3::ZERO, dvec3(1.0, 1.0, f64::INFINITY));
    assert!(matches!(infinite.validate(), Err(Error::EmptyBounds { axis: 'z', .. })));
}

#[test]
fn bounds_expand() {
    let mut bounds = Bounds::new(DVec3::ZERO, DVec3::ZERO);
    bounds.expand(dvec3(1.0, -2.0, 0.5));
    assert_eq!(bounds.min, dvec3(0.0, -2.0, 0.0));
    assert_eq!(bounds.max, dvec3(1.0, 0.0, 0.5));
    assert_eq!(bounds.size(), dvec3(1.0, 2.0, 0.5));
}
