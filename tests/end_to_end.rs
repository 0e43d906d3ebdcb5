use isocrust::{
    glam::{ dvec3, DVec3 },
    march,
    march_with_stats,
    Bounds,
    Error,
    IndexedMesh,
    MarchConfig,
    ScalarField,
    Sphere,
    Torus,
    WeldMode,
};

fn config(isolevel: f64, bounds: Bounds, delta: f64) -> MarchConfig {
    MarchConfig {
        isolevel,
        bounds,
        delta,
        weld: WeldMode::Exact,
    }
}

/// Every face references three distinct, valid vertices.
fn assert_well_formed(mesh: &IndexedMesh) {
    let count = mesh.vertices.len() as u32;
    for face in &mesh.faces {
        assert!(face.iter().all(|id| (1..=count).contains(id)), "{face:?}");
    }
}

#[test]
fn sphere_coarse_grid_is_an_octahedron() {
    let mesh = march(&Sphere::default(), &config(0.25, Bounds::UNIT_CUBE, 0.5)).unwrap();

    assert_eq!(mesh.faces.len(), 8);
    assert_eq!(mesh.vertices.len(), 6);
    assert_well_formed(&mesh);
    for vertex in &mesh.vertices {
        assert_eq!(vertex.length(), 0.5);
    }

    let bounds = mesh.bounds().unwrap();
    assert_eq!(bounds.min, DVec3::splat(-0.5));
    assert_eq!(bounds.max, DVec3::splat(0.5));
}

#[test]
fn sphere_vertices_stay_near_the_surface() {
    let delta = 0.1;
    let (mesh, stats) = march_with_stats(&Sphere::default(), &config(0.25, Bounds::UNIT_CUBE, delta)).unwrap();

    assert_eq!(stats.voxels, 8000);
    assert_eq!(stats.skipped_voxels, 0);
    assert_eq!(stats.triangles, mesh.faces.len());
    assert!(mesh.faces.len() > 100);
    assert_well_formed(&mesh);
    for vertex in &mesh.vertices {
        assert!((vertex.length() - 0.5).abs() <= delta, "{vertex}");
    }
}

#[test]
fn torus_vertices_cluster_around_the_center_circle() {
    let delta = 0.1;
    let torus = Torus::new(0.5);
    let mesh = march(&torus, &config(0.09, Bounds::UNIT_CUBE, delta)).unwrap();

    assert!(!mesh.faces.is_empty());
    assert_well_formed(&mesh);
    for vertex in &mesh.vertices {
        // Distance from the tube's center circle is the tube radius 0.3
        let radial = vertex.truncate().length();
        let tube = ((radial - 0.5).powi(2) + vertex.z * vertex.z).sqrt();
        assert!((tube - 0.3).abs() <= delta, "{vertex}");
        assert!(radial >= 0.2 - delta && radial <= 0.8 + delta, "{vertex}");
    }
}

#[test]
fn adjacent_voxels_weld_their_shared_face() {
    // Only edges along y are cut, at y = 0.55 - 0.2x - 0.1z
    let field = |pos: DVec3| pos.y + 0.2 * pos.x + 0.1 * pos.z;
    let bounds = Bounds::from_ranges((0.0, 2.0), (0.0, 1.0), (0.0, 1.0));
    let mesh = march(&field, &config(0.55, bounds, 1.0)).unwrap();

    // Two quads, one per voxel, sharing the two vertices on x = 1
    assert_eq!(mesh.faces.len(), 4);
    assert_eq!(mesh.vertices.len(), 6);
    assert_well_formed(&mesh);
    for vertex in &mesh.vertices {
        let expected = 0.55 - 0.2 * vertex.x - 0.1 * vertex.z;
        assert!((vertex.y - expected).abs() < 1e-12, "{vertex}");
    }

    let shared = mesh.vertices.iter().filter(|v| v.x == 1.0).count();
    assert_eq!(shared, 2);
}

#[test]
fn quantized_weld_merges_near_duplicates() {
    let torus = Torus::default();
    let exact = march(&torus, &config(0.09, Bounds::UNIT_CUBE, 0.1)).unwrap();
    let quantized = march(&torus, &MarchConfig {
        weld: WeldMode::Quantized { tolerance: 1e-9 },
        ..config(0.09, Bounds::UNIT_CUBE, 0.1)
    }).unwrap();

    // Same triangles; exact welding may keep ULP-apart copies of a position
    assert_eq!(exact.faces.len(), quantized.faces.len());
    assert!(quantized.vertices.len() <= exact.vertices.len());
    assert_well_formed(&quantized);
}

#[test]
fn vertex_ids_are_deterministic() {
    let settings = config(0.09, Bounds::UNIT_CUBE, 0.1);
    let first = march(&Torus::default(), &settings).unwrap();
    let second = march(&Torus::default(), &settings).unwrap();
    assert_eq!(first, second);
}

#[test]
fn obj_file_round_trip() {
    let mesh = march(&Torus::default(), &config(0.09, Bounds::UNIT_CUBE, 0.2)).unwrap();
    assert!(!mesh.faces.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("torus.obj");
    mesh.write_obj_to_file(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# --- Vertices ---\nv "));
    assert_eq!(text.lines().filter(|line| line.starts_with("v ")).count(), mesh.vertices.len());
    assert_eq!(text.lines().filter(|line| line.starts_with("f ")).count(), mesh.faces.len());

    let read = IndexedMesh::read_obj_from_file(&path).unwrap();
    assert_eq!(read, mesh);
}

#[test]
fn empty_surface_is_not_an_error() {
    // The whole box is outside
    let mesh = march(&Sphere::default(), &config(-1.0, Bounds::UNIT_CUBE, 0.5)).unwrap();
    assert!(mesh.faces.is_empty());
    assert!(mesh.vertices.is_empty());
    assert!(mesh.bounds().is_none());
    assert_eq!(mesh.to_obj_string(), "# --- Vertices ---\n# --- Faces ---\n");
}

#[test]
fn invalid_settings_fail_before_marching() {
    let sphere = Sphere::default();
    let err = march(&sphere, &config(0.25, Bounds::UNIT_CUBE, 0.0)).unwrap_err();
    assert!(matches!(err, Error::InvalidDelta(_)));

    let flat = Bounds::from_ranges((-1.0, 1.0), (1.0, -1.0), (-1.0, 1.0));
    let err = march(&sphere, &config(0.25, flat, 0.1)).unwrap_err();
    assert!(matches!(err, Error::EmptyBounds { axis: 'y', .. }));

    let err = march(&sphere, &config(f64::INFINITY, Bounds::UNIT_CUBE, 0.1)).unwrap_err();
    assert!(matches!(err, Error::InvalidIsolevel(_)));
}

#[test]
fn non_finite_samples_are_skipped() {
    struct Punctured;

    impl ScalarField for Punctured {
        fn value(&self, pos: DVec3) -> f64 {
            if pos == dvec3(0.5, 0.0, 0.0) { f64::INFINITY } else { pos.length_squared() }
        }
    }

    let (mesh, stats) = march_with_stats(&Punctured, &config(0.25, Bounds::UNIT_CUBE, 0.5)).unwrap();
    // The four voxels around (0.5, 0, 0) on the origin side and the four beyond it
    assert_eq!(stats.skipped_voxels, 8);
    // Of the octahedron, the four faces touching +x are gone
    assert_eq!(mesh.faces.len(), 4);
    assert!(mesh.vertices.iter().all(|v| v.is_finite() && v.x <= 0.0));
}

#[cfg(feature = "multi-thread")]
#[test]
fn parallel_walk_matches_sequential() {
    let settings = config(0.09, Bounds::UNIT_CUBE, 0.05);
    let torus = Torus::default();
    let (sequential, seq_stats) = march_with_stats(&torus, &settings).unwrap();
    let (parallel, par_stats) = isocrust::march_parallel(&torus, &settings).unwrap();
    assert_eq!(seq_stats, par_stats);
    assert_eq!(sequential, parallel);
}
