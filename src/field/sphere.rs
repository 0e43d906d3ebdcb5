use glam::DVec3;

use crate::field::ScalarField;

/// Squared distance from `center`. A sphere of radius `r` is the isolevel `r²`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sphere {
    pub center: DVec3,
}

impl Sphere {
    pub fn new(center: DVec3) -> Self {
        Self { center }
    }
}

impl ScalarField for Sphere {
    #[inline(always)]
    fn value(&self, pos: DVec3) -> f64 {
        (pos - self.center).length_squared()
    }
}

#[test]
fn sphere_value() {
    use glam::dvec3;

    let sphere = Sphere::default();
    assert_eq!(sphere.value(dvec3(1.0, 2.0, 2.0)), 9.0);

    let sphere = Sphere::new(dvec3(1.0, 0.0, 0.0));
    assert_eq!(sphere.value(dvec3(1.0, 0.0, 0.0)), 0.0);
    assert_eq!(sphere.value(dvec3(0.0, 0.5, 0.0)), 1.25);
}
