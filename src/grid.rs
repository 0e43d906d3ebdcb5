use std::ops::AddAssign;

use glam::{ DVec3, UVec3 };
use log::{ debug, trace, warn };

use crate::{
    bounds::Bounds,
    error::{ Error, Result },
    field::ScalarField,
    marching_cubes::{ tables::CORNER_OFFSETS, Triangles, Voxel },
    mesh::MeshWelder,
};

/// Fraction of a step forgiven when counting steps, so that a box like
/// `[-1, 1]` with step `0.1` still gets 20 cells.
const LATTICE_TOLERANCE: f64 = 1e-6;

/// Counters collected during a walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MarchStats {
    /// Voxels visited
    pub voxels: usize,
    /// Voxels that emitted at least one triangle
    pub surface_voxels: usize,
    pub triangles: usize,
    /// Voxels dropped because a corner sample was NaN or infinite
    pub skipped_voxels: usize,
}

impl AddAssign for MarchStats {
    fn add_assign(&mut self, rhs: Self) {
        self.voxels += rhs.voxels;
        self.surface_voxels += rhs.surface_voxels;
        self.triangles += rhs.triangles;
        self.skipped_voxels += rhs.skipped_voxels;
    }
}

impl MarchStats {
    fn warn_skipped(&self) {
        if self.skipped_voxels > 0 {
            warn!(
                "skipped {} of {} voxels with non-finite samples",
                self.skipped_voxels, self.voxels
            );
        }
    }
}

/// Regular lattice of cubic voxels laid over a [`Bounds`].
///
/// Lattice point `n` on an axis sits at `min + n * delta`. Every voxel reads
/// its corners from the lattice, so a corner shared by neighbouring voxels is
/// the same `f64` in each of them.
///
/// The lattice is not stretched to end exactly at `max`: when `delta` does
/// not divide an extent, the last lattice point falls short of `max` and the
/// remainder of the box is not sampled. With `[0, 1]` and a step of `0.3`
/// the points are `0, 0.3, 0.6, 0.9`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    origin: DVec3,
    delta: f64,
    steps: UVec3,
}

impl Grid {
    pub fn new(bounds: Bounds, delta: f64) -> Result<Self> {
        bounds.validate()?;
        if !delta.is_finite() || delta <= 0.0 {
            return Err(Error::InvalidDelta(delta));
        }

        let steps = (bounds.size() / delta + LATTICE_TOLERANCE).floor();
        for (i, axis) in ['x', 'y', 'z'].into_iter().enumerate() {
            if steps[i] < 1.0 {
                return Err(Error::EmptyBounds {
                    axis,
                    min: bounds.min[i],
                    max: bounds.max[i],
                });
            }
        }

        let too_many = || Error::TooManyVoxels { x: steps.x, y: steps.y, z: steps.z };
        if steps.max_element() > u32::MAX as f64 {
            return Err(too_many());
        }
        let steps = UVec3::new(steps.x as u32, steps.y as u32, steps.z as u32);
        (steps.x as usize)
            .checked_mul(steps.y as usize)
            .and_then(|cells| cells.checked_mul(steps.z as usize))
            .ok_or_else(too_many)?;

        Ok(Self {
            origin: bounds.min,
            delta,
            steps,
        })
    }

    #[inline]
    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    #[inline]
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Number of voxels along each axis.
    #[inline]
    pub fn steps(&self) -> UVec3 {
        self.steps
    }

    /// Cannot overflow: [`Grid::new`] rejects lattices whose count does not
    /// fit a `usize`.
    pub fn cell_count(&self) -> usize {
        self.steps.x as usize * self.steps.y as usize * self.steps.z as usize
    }

    /// Position of a lattice point. Valid indices run up to and including
    /// [`Grid::steps`].
    #[inline(always)]
    pub fn lattice_point(&self, index: UVec3) -> DVec3 {
        let index = DVec3::new(index.x as f64, index.y as f64, index.z as f64);
        self.origin + index * self.delta
    }

    /// Voxel indices, x outermost and z innermost.
    pub fn cells(&self) -> impl Iterator<Item = UVec3> {
        let steps = self.steps;
        (0..steps.x).flat_map(move |x| {
            (0..steps.y).flat_map(move |y| (0..steps.z).map(move |z| UVec3::new(x, y, z)))
        })
    }

    /// Minimum corner of a voxel.
    pub fn voxel_min(&self, cell: UVec3) -> DVec3 {
        self.lattice_point(cell)
    }

    pub fn voxel_corners(&self, cell: UVec3) -> [DVec3; 8] {
        CORNER_OFFSETS.map(|offset| {
            let step = UVec3::new(offset.x as u32, offset.y as u32, offset.z as u32);
            self.lattice_point(cell + step)
        })
    }

    fn march_cell<F: ScalarField + ?Sized>(
        &self,
        cell: UVec3,
        field: &F,
        isolevel: f64,
        stats: &mut MarchStats,
    ) -> Triangles {
        stats.voxels += 1;

        let voxel = Voxel::sample(self.voxel_corners(cell), field);
        if !voxel.is_finite() {
            debug!("voxel {cell} has non-finite samples {:?}", voxel.values);
            stats.skipped_voxels += 1;
            return Triangles::new();
        }

        let triangles = voxel.triangulate(isolevel);
        if !triangles.is_empty() {
            trace!(
                "voxel {cell}: case {}, {} triangles",
                voxel.case(isolevel).0,
                triangles.len()
            );
            stats.surface_voxels += 1;
            stats.triangles += triangles.len();
        }
        triangles
    }

    /// Walks every voxel in [`Grid::cells`] order and welds its triangles
    /// into `welder`.
    pub fn march<F: ScalarField + ?Sized>(
        &self,
        field: &F,
        isolevel: f64,
        welder: &mut MeshWelder,
    ) -> MarchStats {
        let mut stats = MarchStats::default();
        for cell in self.cells() {
            let triangles = self.march_cell(cell, field, isolevel, &mut stats);
            welder.extend_faces(&triangles);
        }
        stats.warn_skipped();
        stats
    }

    /// Same result as [`Grid::march`], vertex IDs included. Slabs of constant x
    /// are triangulated in parallel and welded afterwards in lattice order.
    #[cfg(feature = "multi-thread")]
    pub fn march_parallel<F: ScalarField + Sync + ?Sized>(
        &self,
        field: &F,
        isolevel: f64,
        welder: &mut MeshWelder,
    ) -> MarchStats {
        use rayon::prelude::*;

        use crate::mesh::UnindexedMesh;

        let slabs: Vec<(UnindexedMesh, MarchStats)> = (0..self.steps.x)
            .into_par_iter()
            .map(|x| {
                let mut slab = UnindexedMesh::default();
                let mut stats = MarchStats::default();
                for y in 0..self.steps.y {
                    for z in 0..self.steps.z {
                        let cell = UVec3::new(x, y, z);
                        slab.faces.extend(self.march_cell(cell, field, isolevel, &mut stats));
                    }
                }
                (slab, stats)
            })
            .collect();

        let mut total = MarchStats::default();
        for (slab, stats) in slabs {
            welder.extend_faces(&slab.faces);
            total += stats;
        }
        total.warn_skipped();
        total
    }
}

#[test]
fn grid_steps() {
    let grid = Grid::new(Bounds::UNIT_CUBE, 0.1).unwrap();
    assert_eq!(grid.steps(), UVec3::splat(20));
    assert_eq!(grid.cell_count(), 8000);

    let grid = Grid::new(Bounds::UNIT_CUBE, 0.5).unwrap();
    assert_eq!(grid.steps(), UVec3::splat(4));
    assert_eq!(grid.origin(), Bounds::UNIT_CUBE.min);
    assert_eq!(grid.delta(), 0.5);
    assert_eq!(grid.lattice_point(UVec3::ZERO), Bounds::UNIT_CUBE.min);
    assert_eq!(grid.lattice_point(UVec3::splat(4)), Bounds::UNIT_CUBE.max);
    assert_eq!(grid.lattice_point(UVec3::new(2, 1, 3)), DVec3::new(0.0, -0.5, 0.5));

    // A step that does not divide the extent stops short of max
    let bounds = Bounds::from_ranges((0.0, 1.0), (0.0, 2.0), (0.0, 0.5));
    let grid = Grid::new(bounds, 0.3).unwrap();
    assert_eq!(grid.steps(), UVec3::new(3, 6, 1));
    let last = grid.lattice_point(grid.steps());
    assert!((last.x - 0.9).abs() < 1e-12 && last.x < bounds.max.x);
}

#[test]
fn grid_rejects_bad_input() {
    assert!(matches!(Grid::new(Bounds::UNIT_CUBE, 0.0), Err(Error::InvalidDelta(_))));
    assert!(matches!(Grid::new(Bounds::UNIT_CUBE, -0.1), Err(Error::InvalidDelta(_))));
    assert!(matches!(Grid::new(Bounds::UNIT_CUBE, f64::NAN), Err(Error::InvalidDelta(_))));
    assert!(matches!(Grid::new(Bounds::UNIT_CUBE, f64::INFINITY), Err(Error::InvalidDelta(_))));

    // Step larger than the box
    let bounds = Bounds::from_ranges((0.0, 4.0), (0.0, 1.0), (0.0, 4.0));
    assert!(matches!(Grid::new(bounds, 2.0), Err(Error::EmptyBounds { axis: 'y', .. })));

    let flat = Bounds::from_ranges((0.0, 1.0), (0.0, 1.0), (2.0, 2.0));
    assert!(matches!(Grid::new(flat, 0.1), Err(Error::EmptyBounds { axis: 'z', .. })));
}

#[test]
fn tiny_steps_stay_inside_the_box() {
    use crate::field::Sphere;

    let bounds = Bounds::cube(0.0, 1e-5);
    let grid = Grid::new(bounds, 1e-6).unwrap();
    assert_eq!(grid.steps(), UVec3::splat(10));
    assert!(grid.lattice_point(grid.steps()).cmple(bounds.max + 1e-12).all());

    let sphere = Sphere::new(DVec3::splat(5e-6));
    let mut welder = MeshWelder::new();
    let stats = grid.march(&sphere, 9e-12, &mut welder);
    assert_eq!(stats.voxels, 1000);
    assert!(stats.triangles > 0);

    let slack = Bounds::new(bounds.min - 1e-12, bounds.max + 1e-12);
    assert!(welder.finish().vertices.iter().all(|&v| slack.contains(v)));
}

#[test]
fn oversized_lattices_are_rejected() {
    // More steps on x than a u32 holds
    let err = Grid::new(Bounds::cube(0.0, 10.0), 1e-9).unwrap_err();
    assert!(matches!(err, Error::TooManyVoxels { .. }));
    let err = Grid::new(Bounds::UNIT_CUBE, 1e-12).unwrap_err();
    assert!(matches!(err, Error::TooManyVoxels { .. }));

    // Every axis fits, the product does not
    let err = Grid::new(Bounds::cube(0.0, 4e9), 1.0).unwrap_err();
    assert!(matches!(err, Error::TooManyVoxels { .. }));
}

#[test]
fn cells_walk_x_outermost() {
    let bounds = Bounds::from_ranges((0.0, 2.0), (0.0, 1.0), (0.0, 2.0));
    let grid = Grid::new(bounds, 1.0).unwrap();
    let cells: Vec<_> = grid.cells().collect();
    assert_eq!(cells, [
        UVec3::new(0, 0, 0),
        UVec3::new(0, 0, 1),
        UVec3::new(1, 0, 0),
        UVec3::new(1, 0, 1),
    ]);
    assert_eq!(cells.len(), grid.cell_count());
}

#[test]
fn neighbours_share_corners_exactly() {
    let grid = Grid::new(Bounds::UNIT_CUBE, 0.1).unwrap();
    let cell = UVec3::new(3, 4, 5);
    let corners = grid.voxel_corners(cell);
    assert_eq!(corners[0], grid.voxel_min(cell));

    // Corner 3 is offset (1, 0, 0), corner 1 is (0, 1, 0), corner 4 is (0, 0, 1)
    assert_eq!(corners[3], grid.voxel_corners(cell + UVec3::X)[0]);
    assert_eq!(corners[1], grid.voxel_corners(cell + UVec3::Y)[0]);
    assert_eq!(corners[4], grid.voxel_corners(cell + UVec3::Z)[0]);
    assert_eq!(corners[6], grid.voxel_corners(cell + UVec3::ONE)[0]);
}

#[test]
fn march_sphere_stats() {
    use crate::field::Sphere;

    // Only the lattice point at the origin is inside radius 0.5
    let grid = Grid::new(Bounds::UNIT_CUBE, 0.5).unwrap();
    let mut welder = MeshWelder::new();
    let stats = grid.march(&Sphere::default(), 0.25, &mut welder);

    assert_eq!(stats, MarchStats {
        voxels: 64,
        surface_voxels: 8,
        triangles: 8,
        skipped_voxels: 0,
    });
    assert_eq!(welder.triangle_count(), 8);
    assert_eq!(welder.vertex_count(), 6);
}

#[test]
fn march_skips_non_finite_voxels() {
    use crate::field::Sphere;

    let sphere = Sphere::default();
    let field = |pos: DVec3| if pos.x > 0.6 { f64::NAN } else { sphere.value(pos) };

    let grid = Grid::new(Bounds::UNIT_CUBE, 0.5).unwrap();
    let mut welder = MeshWelder::new();
    let stats = grid.march(&field, 0.25, &mut welder);

    // The x = 3 slab touches x = 1.0
    assert_eq!(stats.skipped_voxels, 16);
    assert_eq!(stats.triangles, 8);
    assert!(welder.finish().vertices.iter().all(|v| v.is_finite()));
}

#[test]
fn stats_add_assign() {
    let mut stats = MarchStats { voxels: 1, surface_voxels: 1, triangles: 2, skipped_voxels: 0 };
    stats += MarchStats { voxels: 3, surface_voxels: 0, triangles: 0, skipped_voxels: 1 };
    assert_eq!(stats, MarchStats { voxels: 4, surface_voxels: 1, triangles: 2, skipped_voxels: 1 });
}

#[cfg(feature = "multi-thread")]
#[test]
fn parallel_matches_sequential() {
    use crate::field::Torus;

    let grid = Grid::new(Bounds::UNIT_CUBE, 0.1).unwrap();
    let torus = Torus::default();

    let mut sequential = MeshWelder::new();
    let seq_stats = grid.march(&torus, 0.09, &mut sequential);
    let mut parallel = MeshWelder::new();
    let par_stats = grid.march_parallel(&torus, 0.09, &mut parallel);

    assert_eq!(seq_stats, par_stats);
    assert_eq!(sequential.finish(), parallel.finish());
}
