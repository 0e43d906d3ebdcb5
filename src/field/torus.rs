use glam::DVec3;

use crate::field::ScalarField;

/// Torus around the z axis: `(√(x²+y²) − R)² + z²`, the squared distance to
/// the tube's center circle. A tube of radius `r` is the isolevel `r²`.
#[derive(Clone, Copy, Debug)]
pub struct Torus {
    /// Distance from the origin to the center of the tube
    pub major_radius: f64,
}

impl Default for Torus {
    fn default() -> Self {
        Self { major_radius: 0.5 }
    }
}

impl Torus {
    pub fn new(major_radius: f64) -> Self {
        Self { major_radius }
    }
}

impl ScalarField for Torus {
    #[inline(always)]
    fn value(&self, pos: DVec3) -> f64 {
        let ring = pos.truncate().length() - self.major_radius;
        ring * ring + pos.z * pos.z
    }
}

#[test]
fn torus_value() {
    use glam::dvec3;

    let torus = Torus::default();
    // On the center circle
    assert_eq!(torus.value(dvec3(0.0, 0.5, 0.0)), 0.0);
    assert_eq!(torus.value(dvec3(-0.5, 0.0, 0.0)), 0.0);
    // Above the center circle
    assert_eq!(torus.value(dvec3(0.5, 0.0, 0.25)), 0.0625);
    // Axis of symmetry
    assert_eq!(torus.value(DVec3::ZERO), 0.25);
}
