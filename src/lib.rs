#![warn(unused_extern_crates)]
//! Isosurface extraction with marching cubes.
//!
//! A [`ScalarField`] is sampled on a regular [`Grid`], each voxel is
//! triangulated from the classic lookup tables, and the triangles are welded
//! into an [`IndexedMesh`] that can be written as Wavefront OBJ.
//!
//! ```
//! use isocrust::{ march, MarchConfig, Sphere };
//!
//! let config = MarchConfig { isolevel: 0.25, delta: 0.1, ..Default::default() };
//! let mesh = march(&Sphere::default(), &config).unwrap();
//! assert!(!mesh.faces.is_empty());
//! ```

use log::{ debug, info };

pub use glam;

pub mod utils;

mod bounds;
pub use bounds::*;

mod config;
pub use config::*;

mod error;
pub use error::*;

pub mod field;
pub use field::{ ScalarField, Sphere, Torus };

mod grid;
pub use grid::*;

pub mod marching_cubes;

mod mesh;
pub use mesh::*;

/// Extracts the `config.isolevel` surface of `field` as a welded mesh.
pub fn march<F: ScalarField + ?Sized>(field: &F, config: &MarchConfig) -> Result<IndexedMesh> {
    march_with_stats(field, config).map(|(mesh, _)| mesh)
}

pub fn march_with_stats<F: ScalarField + ?Sized>(
    field: &F,
    config: &MarchConfig,
) -> Result<(IndexedMesh, MarchStats)> {
    let grid = config.grid()?;
    debug!("marching {} voxels ({}), isolevel {}", grid.cell_count(), grid.steps(), config.isolevel);

    let mut welder = MeshWelder::with_mode(config.weld)?;
    let stats = crate::timed!(grid.march(field, config.isolevel, &mut welder), "grid walk");
    Ok(finish(welder, stats))
}

/// [`march_with_stats`] with the voxels triangulated on the rayon pool. The
/// mesh is identical to the sequential one.
#[cfg(feature = "multi-thread")]
pub fn march_parallel<F: ScalarField + Sync + ?Sized>(
    field: &F,
    config: &MarchConfig,
) -> Result<(IndexedMesh, MarchStats)> {
    let grid = config.grid()?;
    debug!(
        "marching {} voxels ({}) on {} threads, isolevel {}",
        grid.cell_count(),
        grid.steps(),
        rayon::current_num_threads(),
        config.isolevel
    );

    let mut welder = MeshWelder::with_mode(config.weld)?;
    let stats = crate::timed!(grid.march_parallel(field, config.isolevel, &mut welder), "parallel grid walk");
    Ok(finish(welder, stats))
}

fn finish(welder: MeshWelder, stats: MarchStats) -> (IndexedMesh, MarchStats) {
    let mesh = welder.finish();
    info!(
        "{} triangles and {} vertices from {} of {} voxels",
        mesh.faces.len(),
        mesh.vertices.len(),
        stats.surface_voxels,
        stats.voxels
    );
    if let Some(bounds) = mesh.bounds() {
        debug!("mesh spans {} to {}", bounds.min, bounds.max);
    }
    (mesh, stats)
}
