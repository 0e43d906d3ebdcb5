//! Command-line driver: extracts the isosurface of a built-in field and writes
//! it as OBJ. With no arguments it meshes a radius-0.3 tube around a torus of
//! radius 0.5 into `obj/torus.obj`.

use anyhow::{ Context, Result };
use clap::{ Parser, ValueEnum };
use log::{ info, warn };
use std::{ fs, path::PathBuf };

use isocrust::{
    glam::dvec3,
    Bounds,
    IndexedMesh,
    MarchConfig,
    ScalarField,
    Sphere,
    Torus,
    WeldMode,
};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FieldKind {
    /// Squared distance from the origin
    Sphere,
    /// Squared distance from a circle in the XY plane
    Torus,
}

#[derive(Parser, Debug)]
#[command(name = "isocrust")]
#[command(about = "Extract an isosurface with marching cubes and write it as OBJ", long_about = None)]
struct Args {
    /// Scalar field to mesh
    #[arg(long, value_enum, default_value_t = FieldKind::Torus)]
    field: FieldKind,

    /// Radius of the torus center circle
    #[arg(long, default_value_t = 0.5)]
    major_radius: f64,

    /// JSON config file; options given on the command line take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Field value of the surface (default 0.09)
    #[arg(short, long, allow_negative_numbers = true)]
    isolevel: Option<f64>,

    /// Lower corner of the box
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    min: Option<Vec<f64>>,

    /// Upper corner of the box
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    max: Option<Vec<f64>>,

    /// Same range on all three axes
    #[arg(
        long,
        num_args = 2,
        value_names = ["MIN", "MAX"],
        allow_negative_numbers = true,
        conflicts_with_all = ["min", "max"]
    )]
    bounds: Option<Vec<f64>>,

    /// Voxel edge length (default 0.05)
    #[arg(short, long)]
    delta: Option<f64>,

    /// Weld vertices that round to the same multiple of this distance
    /// instead of requiring exact equality
    #[arg(long)]
    weld_tolerance: Option<f64>,

    /// Output OBJ file; parent directories are created
    #[arg(short, long, default_value = "obj/torus.obj")]
    output: PathBuf,

    /// Triangulate voxels on all cores (needs the `multi-thread` feature)
    #[arg(long)]
    parallel: bool,
}

impl Args {
    fn config(&self) -> Result<MarchConfig> {
        let mut config = match &self.config {
            Some(path) => MarchConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => MarchConfig::default(),
        };

        if let Some(isolevel) = self.isolevel {
            config.isolevel = isolevel;
        }
        if let Some(range) = &self.bounds {
            config.bounds = Bounds::cube(range[0], range[1]);
        }
        if let Some(min) = &self.min {
            config.bounds.min = dvec3(min[0], min[1], min[2]);
        }
        if let Some(max) = &self.max {
            config.bounds.max = dvec3(max[0], max[1], max[2]);
        }
        if let Some(delta) = self.delta {
            config.delta = delta;
        }
        if let Some(tolerance) = self.weld_tolerance {
            config.weld = WeldMode::Quantized { tolerance };
        }

        config.validate().context("Invalid settings")?;
        Ok(config)
    }
}

fn run<F: ScalarField + Sync>(field: &F, config: &MarchConfig, parallel: bool) -> isocrust::Result<IndexedMesh> {
    #[cfg(feature = "multi-thread")]
    if parallel {
        return isocrust::march_parallel(field, config).map(|(mesh, _)| mesh);
    }
    #[cfg(not(feature = "multi-thread"))]
    if parallel {
        warn!("built without the multi-thread feature, marching on one thread");
    }
    isocrust::march(field, config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = args.config()?;

    info!("{:?} field, {:?}", args.field, config);
    let mesh = match args.field {
        FieldKind::Sphere => run(&Sphere::default(), &config, args.parallel),
        FieldKind::Torus => run(&Torus::new(args.major_radius), &config, args.parallel),
    }
    .context("Failed to extract the surface")?;

    if mesh.faces.is_empty() {
        warn!("isolevel {} does not cross the field inside the box", config.isolevel);
    }

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    isocrust::timed!(mesh.write_obj_to_file(&args.output), "write OBJ")
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "Wrote {} vertices and {} triangles to {}",
        mesh.vertices.len(),
        mesh.faces.len(),
        args.output.display()
    );
    Ok(())
}
