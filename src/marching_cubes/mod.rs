//! Per-voxel marching cubes: classify the corners, cut the edges, look up the
//! triangles.

pub mod tables;

use arrayvec::ArrayVec;
use bitvec::prelude::*;
use glam::DVec3;
use ordered_float::OrderedFloat;

use crate::field::ScalarField;
use tables::{ CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, SENTINEL, TRI_TABLE };

/// At most 5 triangles come out of a single voxel.
pub type Triangles = ArrayVec<[DVec3; 3], 5>;

/// Edges whose corner samples differ by no more than this are treated as
/// parallel to the surface.
pub const DEGENERATE_EDGE_EPSILON: f64 = 1e-5;

/// Inside/outside pattern of a voxel's corners. Bit `i` is set when corner `i`
/// samples strictly below the isolevel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaseIndex(pub u8);

impl CaseIndex {
    pub fn classify(values: &[f64; 8], isolevel: f64) -> Self {
        let bits = values.iter()
            .enumerate()
            .filter(|&(_, &value)| value < isolevel)
            .fold(0u8, |bits, (corner, _)| bits | (1 << corner));
        Self(bits)
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline(always)]
    pub fn edge_mask(self) -> u16 {
        EDGE_TABLE[self.index()]
    }

    /// No edge is cut: every corner is inside, or every corner is outside.
    #[inline(always)]
    pub fn is_empty(self) -> bool {
        self.edge_mask() == 0
    }

    /// Number of triangles the case produces.
    pub fn triangle_count(self) -> usize {
        TRI_TABLE[self.index()]
            .chunks_exact(3)
            .take_while(|triple| triple[0] != SENTINEL)
            .count()
    }
}

#[inline(always)]
fn edge_order_key(pos: DVec3) -> [OrderedFloat<f64>; 3] {
    pos.to_array().map(OrderedFloat)
}

/// Point on the edge `p1`-`p2` where the linearly interpolated field crosses
/// `isolevel`.
///
/// The endpoints are first put in lexicographic (x, then y, then z) order so
/// that two voxels sharing the edge compute the same bits whichever way round
/// they pass it in.
pub fn interpolate_edge(p1: DVec3, p2: DVec3, v1: f64, v2: f64, isolevel: f64) -> DVec3 {
    let (p1, p2, v1, v2) = if edge_order_key(p1) > edge_order_key(p2) {
        (p2, p1, v2, v1)
    } else {
        (p1, p2, v1, v2)
    };

    if (v1 - v2).abs() <= DEGENERATE_EDGE_EPSILON {
        return p1;
    }

    p1 + (p2 - p1) * ((isolevel - v1) / (v2 - v1))
}

/// Cut point of every edge in `case`'s mask. Entries for uncut edges are left
/// at zero and must not be read.
pub fn cut_points(corners: &[DVec3; 8], values: &[f64; 8], case: CaseIndex, isolevel: f64) -> [DVec3; 12] {
    let mut points = [DVec3::ZERO; 12];
    let mask = case.edge_mask();
    for edge in mask.view_bits::<Lsb0>()[..12].iter_ones() {
        let (a, b) = EDGE_CORNERS[edge];
        points[edge] = interpolate_edge(corners[a], corners[b], values[a], values[b], isolevel);
    }
    points
}

/// Reads the case's edge triples up to the sentinel and turns each into a
/// triangle of cut points.
pub fn triangulate(case: CaseIndex, cut_points: &[DVec3; 12]) -> Triangles {
    TRI_TABLE[case.index()]
        .chunks_exact(3)
        .take_while(|triple| triple[0] != SENTINEL)
        .map(|triple| triple_points(triple, cut_points))
        .collect()
}

#[inline(always)]
fn triple_points(triple: &[i8], cut_points: &[DVec3; 12]) -> [DVec3; 3] {
    [
        cut_points[triple[0] as usize],
        cut_points[triple[1] as usize],
        cut_points[triple[2] as usize],
    ]
}

/// Triangulates one cube given its corner positions and samples.
pub fn march_cube(corners: &[DVec3; 8], values: &[f64; 8], isolevel: f64) -> Triangles {
    let case = CaseIndex::classify(values, isolevel);
    if case.is_empty() {
        return Triangles::new();
    }

    let points = cut_points(corners, values, case, isolevel);
    triangulate(case, &points)
}

/// One grid cell: its 8 corners in [`CORNER_OFFSETS`] order and the field
/// sampled at each.
#[derive(Debug, Clone, Copy)]
pub struct Voxel {
    pub corners: [DVec3; 8],
    pub values: [f64; 8],
}

impl Voxel {
    /// Samples `field` at the given corners.
    pub fn sample<F: ScalarField + ?Sized>(corners: [DVec3; 8], field: &F) -> Self {
        Self {
            values: corners.map(|pos| field.value(pos)),
            corners,
        }
    }

    /// Cube of edge length `delta` whose minimum corner is `min_corner`.
    pub fn cube<F: ScalarField + ?Sized>(min_corner: DVec3, delta: f64, field: &F) -> Self {
        Self::sample(CORNER_OFFSETS.map(|offset| min_corner + offset * delta), field)
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|value| value.is_finite())
    }

    pub fn case(&self, isolevel: f64) -> CaseIndex {
        CaseIndex::classify(&self.values, isolevel)
    }

    pub fn triangulate(&self, isolevel: f64) -> Triangles {
        march_cube(&self.corners, &self.values, isolevel)
    }
}

/// Values that put exactly the corners set in `case` inside isolevel 0.
#[cfg(test)]
fn case_values(case: u8) -> [f64; 8] {
    std::array::from_fn(|corner| if case & (1 << corner) != 0 { -1.0 } else { 1.0 })
}

#[test]
fn classify_corners() {
    assert_eq!(CaseIndex::classify(&[1.0; 8], 0.0), CaseIndex(0));
    assert_eq!(CaseIndex::classify(&[-1.0; 8], 0.0), CaseIndex(255));

    let mut values = [1.0; 8];
    values[0] = -1.0;
    assert_eq!(CaseIndex::classify(&values, 0.0), CaseIndex(1));
    values[6] = -0.5;
    assert_eq!(CaseIndex::classify(&values, 0.0), CaseIndex(65));

    // A sample equal to the isolevel is outside
    assert_eq!(CaseIndex::classify(&[0.25; 8], 0.25), CaseIndex(0));

    for case in 0..=255u8 {
        assert_eq!(CaseIndex::classify(&case_values(case), 0.0), CaseIndex(case));
    }
}

#[test]
fn full_and_empty_cases_have_no_surface() {
    for case in [CaseIndex(0), CaseIndex(255)] {
        assert!(case.is_empty());
        assert_eq!(case.triangle_count(), 0);
    }

    let corners = CORNER_OFFSETS;
    assert!(march_cube(&corners, &[2.0; 8], 1.0).is_empty());
    assert!(march_cube(&corners, &[0.0; 8], 1.0).is_empty());
}

#[test]
fn triangle_count_matches_table() {
    let corners = CORNER_OFFSETS;
    for case in 0..=255u8 {
        let values = case_values(case);
        let triangles = march_cube(&corners, &values, 0.0);
        let case = CaseIndex(case);
        assert_eq!(triangles.len(), case.triangle_count(), "{case:?}");
        assert_eq!(triangles.is_empty(), case.is_empty(), "{case:?}");
        assert!(triangles.len() <= 5);

        // Every corner sits at ±1 so each cut lands on an edge midpoint
        for vertex in triangles.iter().flatten() {
            let halves = vertex.to_array().iter().filter(|&&c| c == 0.5).count();
            assert_eq!(halves, 1, "{case:?} produced {vertex}");
        }
    }
}

#[test]
fn interpolate_edge_linear() {
    use glam::dvec3;

    let p1 = DVec3::ZERO;
    let p2 = dvec3(0.0, 2.0, 0.0);

    assert_eq!(interpolate_edge(p1, p2, 0.0, 1.0, 0.5), dvec3(0.0, 1.0, 0.0));
    assert_eq!(interpolate_edge(p1, p2, 0.0, 1.0, 0.25), dvec3(0.0, 0.5, 0.0));
    // Crossing at an endpoint
    assert_eq!(interpolate_edge(p1, p2, 0.0, 1.0, 1.0), p2);
    assert_eq!(interpolate_edge(p1, p2, 0.0, 1.0, 0.0), p1);
}

#[test]
fn interpolate_edge_is_order_independent() {
    use glam::dvec3;

    let edges = [
        (dvec3(0.1, 0.3, -0.7), dvec3(0.1, 0.4, -0.7), 0.037, 0.291),
        (dvec3(-0.35, 0.05, 0.6), dvec3(-0.3, 0.05, 0.6), 0.8, -0.13),
        (dvec3(1.0, 2.0, 3.0), dvec3(1.0, 2.0, 3.7), -3.3, 1.9),
    ];
    for (a, b, va, vb) in edges {
        let forward = interpolate_edge(a, b, va, vb, 0.09);
        let backward = interpolate_edge(b, a, vb, va, 0.09);
        assert_eq!(forward.to_array().map(f64::to_bits), backward.to_array().map(f64::to_bits));
    }
}

#[test]
fn interpolate_degenerate_edge() {
    use glam::dvec3;

    let low = dvec3(0.0, 0.0, 1.0);
    let high = dvec3(0.0, 0.0, 1.5);

    // Lower corner wins no matter the argument order
    assert_eq!(interpolate_edge(low, high, 0.5, 0.500001, 0.2), low);
    assert_eq!(interpolate_edge(high, low, 0.500001, 0.5, 0.2), low);
    assert_eq!(interpolate_edge(high, low, 1.0, 1.0, 1.0), low);
}

#[test]
fn single_voxel_around_sphere() {
    use crate::field::Sphere;

    // Radius 0.5 sphere; only the corner at the origin is inside
    let voxel = Voxel::cube(DVec3::ZERO, 0.75, &Sphere::default());
    assert_eq!(voxel.case(0.25), CaseIndex(1));

    let triangles = voxel.triangulate(0.25);
    assert_eq!(triangles.len(), 1);
    for vertex in triangles.iter().flatten() {
        assert!(vertex.cmpge(DVec3::ZERO).all() && vertex.cmple(DVec3::splat(0.75)).all());
        assert!((vertex.length() - 0.5).abs() < 0.75);
    }
}

#[test]
fn voxel_detects_non_finite_samples() {
    let field = |pos: DVec3| if pos.x > 0.5 { f64::NAN } else { pos.x };
    assert!(!Voxel::cube(DVec3::ZERO, 1.0, &field).is_finite());
    assert!(Voxel::cube(DVec3::ZERO, 0.5, &field).is_finite());
}
