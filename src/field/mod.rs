mod sphere;
pub use sphere::*;

mod torus;
pub use torus::*;

use glam::DVec3;

/// A scalar function of 3D space. The surface is the set of points where the
/// value equals the isolevel; values below it are inside.
pub trait ScalarField {
    fn value(&self, pos: DVec3) -> f64;
}

/// Any `Fn(DVec3) -> f64` is a field.
impl<F: Fn(DVec3) -> f64> ScalarField for F {
    #[inline(always)]
    fn value(&self, pos: DVec3) -> f64 {
        self(pos)
    }
}

#[test]
fn closure_field() {
    use glam::dvec3;

    let plane = |pos: DVec3| pos.x + 2.0 * pos.z;
    assert_eq!(plane.value(dvec3(1.0, 5.0, 0.5)), 2.0);

    let boxed: Box<dyn ScalarField> = Box::new(Torus::new(1.0));
    assert_eq!(boxed.value(dvec3(1.0, 0.0, 0.0)), 0.0);
}
