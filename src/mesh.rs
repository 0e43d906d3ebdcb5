use std::{
    fs::File,
    io::{ BufRead, BufReader, BufWriter, Write },
    path::Path,
};

use ahash::AHashMap;
use glam::{ DVec3, dvec3 };
use ordered_float::OrderedFloat;
use serde::{ Deserialize, Serialize };

use crate::{
    bounds::Bounds,
    error::{ Error, Result },
};

/// 1-based index into [`IndexedMesh::vertices`], as used by OBJ faces.
pub type VertexId = u32;

type WeldKey = [OrderedFloat<f64>; 3];

/// How the welder decides that two positions are the same vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WeldMode {
    /// Bit-for-bit equal coordinates (`0.0` and `-0.0` are equal).
    ///
    /// Positions a few ULPs apart stay separate vertices. These appear where
    /// the surface passes through or right next to a lattice corner, since
    /// the cut points of the edges meeting there round differently.
    #[default]
    Exact,
    /// Coordinates rounded to the nearest multiple of `tolerance` are equal.
    /// The first position seen in a bucket is the one kept.
    Quantized { tolerance: f64 },
}

impl WeldMode {
    /// Fails on a quantization tolerance that is not positive and finite.
    pub fn validate(&self) -> Result<()> {
        match *self {
            WeldMode::Quantized { tolerance } if !tolerance.is_finite() || tolerance <= 0.0 => {
                Err(Error::InvalidWeldTolerance(tolerance))
            }
            _ => Ok(()),
        }
    }

    fn key(&self, pos: DVec3) -> WeldKey {
        match *self {
            WeldMode::Exact => pos.to_array().map(OrderedFloat),
            WeldMode::Quantized { tolerance } => (pos / tolerance).round().to_array().map(OrderedFloat),
        }
    }
}

/// Accumulates triangles while welding their corners into shared vertices.
///
/// IDs are handed out in first-seen order starting at 1, so a sequential walk
/// always numbers the same field the same way.
#[derive(Debug, Default)]
pub struct MeshWelder {
    mode: WeldMode,
    ids: AHashMap<WeldKey, VertexId>,
    vertices: Vec<DVec3>,
    faces: Vec<[VertexId; 3]>,
}

impl MeshWelder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: WeldMode) -> Result<Self> {
        mode.validate()?;
        Ok(Self {
            mode,
            ..Default::default()
        })
    }

    pub fn mode(&self) -> WeldMode {
        self.mode
    }

    /// ID of the vertex at `pos`, inserting it if no equal position is known.
    pub fn weld(&mut self, pos: DVec3) -> VertexId {
        let next_id = self.vertices.len() as VertexId + 1;
        let id = *self.ids.entry(self.mode.key(pos)).or_insert(next_id);
        if id == next_id {
            self.vertices.push(pos);
        }
        id
    }

    pub fn add_triangle(&mut self, a: VertexId, b: VertexId, c: VertexId) {
        let count = self.vertices.len() as VertexId;
        assert!(
            [a, b, c].iter().all(|id| (1..=count).contains(id)),
            "triangle ({a}, {b}, {c}) references a vertex that was never welded"
        );
        self.faces.push([a, b, c]);
    }

    /// Welds the three corners and records the triangle.
    pub fn add_face(&mut self, face: [DVec3; 3]) {
        let [a, b, c] = face.map(|pos| self.weld(pos));
        self.add_triangle(a, b, c);
    }

    pub fn extend_faces<'a, I: IntoIterator<Item = &'a [DVec3; 3]>>(&mut self, faces: I) {
        faces.into_iter().for_each(|face| self.add_face(*face));
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// Drops the weld map and hands over the finished mesh.
    pub fn finish(self) -> IndexedMesh {
        IndexedMesh {
            vertices: self.vertices,
            faces: self.faces,
        }
    }
}

/// Triangle soup; every face owns its own corner positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnindexedMesh {
    pub faces: Vec<[DVec3; 3]>,
}

impl UnindexedMesh {
    pub fn index(&self) -> IndexedMesh {
        let mut welder = MeshWelder::new();
        welder.extend_faces(&self.faces);
        welder.finish()
    }

    pub fn index_with(&self, mode: WeldMode) -> Result<IndexedMesh> {
        let mut welder = MeshWelder::with_mode(mode)?;
        welder.extend_faces(&self.faces);
        Ok(welder.finish())
    }
}

/// Welded mesh. `faces` hold 1-based [`VertexId`]s into `vertices`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedMesh {
    pub vertices: Vec<DVec3>,
    pub faces: Vec<[VertexId; 3]>,
}

impl IndexedMesh {
    pub fn vertex(&self, id: VertexId) -> Option<DVec3> {
        let index = (id as usize).checked_sub(1)?;
        self.vertices.get(index).copied()
    }

    /// Corner positions of every face, `None` for a face that references a
    /// vertex the mesh does not have.
    pub fn triangles(&self) -> impl Iterator<Item = Option<[DVec3; 3]>> + '_ {
        self.faces
            .iter()
            .map(|&[a, b, c]| Some([self.vertex(a)?, self.vertex(b)?, self.vertex(c)?]))
    }

    /// Tight box around the vertices, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Bounds> {
        let (first, rest) = self.vertices.split_first()?;
        let mut bounds = Bounds::new(*first, *first);
        rest.iter().for_each(|&pos| bounds.expand(pos));
        Some(bounds)
    }

    pub fn write_obj<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "# --- Vertices ---")?;
        for pos in self.vertices.iter() {
            writeln!(writer, "v {} {} {}", pos.x, pos.y, pos.z)?;
        }
        writeln!(writer, "# --- Faces ---")?;
        for [a, b, c] in self.faces.iter() {
            writeln!(writer, "f {a} {b} {c}")?;
        }
        Ok(())
    }

    pub fn to_obj_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail
        let _ = self.write_obj(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn write_obj_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_obj(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Parses `v x y z` and `f i j k` lines. Blank lines and `#` comments are
    /// skipped; anything else is an error.
    pub fn read_obj<R: BufRead>(reader: R) -> Result<Self> {
        let mut mesh = Self::default();
        let mut face_lines = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line_no = index + 1;
            let line = line?;
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                None => continue,
                Some(token) if token.starts_with('#') => continue,
                Some("v") => {
                    let [x, y, z] = parse_triple::<f64>(tokens, line_no, "coordinate")?;
                    mesh.vertices.push(dvec3(x, y, z));
                }
                Some("f") => {
                    mesh.faces.push(parse_triple::<VertexId>(tokens, line_no, "vertex id")?);
                    face_lines.push(line_no);
                }
                Some(other) => {
                    return Err(Error::ObjParse {
                        line: line_no,
                        message: format!("unsupported directive `{other}`"),
                    });
                }
            }
        }

        let count = mesh.vertices.len() as VertexId;
        for (face, line) in mesh.faces.iter().zip(face_lines) {
            if let Some(id) = face.iter().find(|id| !(1..=count).contains(*id)) {
                return Err(Error::ObjParse {
                    line,
                    message: format!("vertex id {id} out of range 1..={count}"),
                });
            }
        }

        Ok(mesh)
    }

    pub fn from_obj_str(text: &str) -> Result<Self> {
        Self::read_obj(text.as_bytes())
    }

    pub fn read_obj_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_obj(BufReader::new(File::open(path)?))
    }
}

fn parse_triple<'a, T: std::str::FromStr>(
    mut tokens: impl Iterator<Item = &'a str>,
    line: usize,
    what: &str,
) -> Result<[T; 3]> {
    let mut parse_next = || -> Result<T> {
        let token = tokens.next().ok_or_else(|| Error::ObjParse {
            line,
            message: "expected 3 values, found fewer".to_string(),
        })?;
        token.parse().map_err(|_| Error::ObjParse {
            line,
            message: format!("invalid {what} `{token}`"),
        })
    };
    let triple = [parse_next()?, parse_next()?, parse_next()?];

    if let Some(extra) = tokens.next() {
        return Err(Error::ObjParse {
            line,
            message: format!("unexpected trailing value `{extra}`"),
        });
    }
    Ok(triple)
}

#[test]
fn weld_assigns_ids_in_first_seen_order() {
    let mut welder = MeshWelder::new();
    let a = dvec3(0.0, 0.5, 1.0);
    let b = dvec3(1.0, 0.5, 1.0);

    assert_eq!(welder.weld(a), 1);
    assert_eq!(welder.weld(b), 2);
    assert_eq!(welder.weld(a), 1);
    assert_eq!(welder.weld(dvec3(-0.0, 0.5, 1.0)), 1);
    assert_eq!(welder.weld(dvec3(0.0, 0.5, 1.0 + f64::EPSILON)), 3);
    assert_eq!(welder.vertex_count(), 3);
}

#[test]
fn weld_shared_edge() {
    let mut welder = MeshWelder::new();
    welder.add_face([DVec3::ZERO, DVec3::X, DVec3::Y]);
    welder.add_face([DVec3::X, DVec3::ONE, DVec3::Y]);

    assert_eq!(welder.vertex_count(), 4);
    assert_eq!(welder.triangle_count(), 2);

    let mesh = welder.finish();
    assert_eq!(mesh.faces, vec![[1, 2, 3], [2, 4, 3]]);
    assert_eq!(mesh.vertex(4), Some(DVec3::ONE));
    assert_eq!(mesh.vertex(0), None);
    assert_eq!(mesh.vertex(5), None);

    let triangles: Vec<_> = mesh.triangles().collect();
    assert_eq!(triangles[1], Some([DVec3::X, DVec3::ONE, DVec3::Y]));
}

#[test]
fn triangles_with_bad_ids() {
    let mesh = IndexedMesh {
        vertices: vec![DVec3::ZERO, DVec3::X, DVec3::Y],
        faces: vec![[1, 2, 3], [0, 1, 2], [1, 2, 4]],
    };
    let triangles: Vec<_> = mesh.triangles().collect();
    assert_eq!(triangles, [Some([DVec3::ZERO, DVec3::X, DVec3::Y]), None, None]);
}

#[test]
fn weld_quantized() {
    let mode = WeldMode::Quantized { tolerance: 1e-5 };
    let mut welder = MeshWelder::with_mode(mode).unwrap();
    assert_eq!(welder.mode(), mode);
    let first = dvec3(0.1, 0.2, 0.3);
    assert_eq!(welder.weld(first), 1);
    assert_eq!(welder.weld(dvec3(0.1 + 1e-9, 0.2, 0.3 - 1e-9)), 1);
    assert_eq!(welder.weld(dvec3(0.1, 0.2 + 1e-4, 0.3)), 2);

    // The first position seen is the one kept
    assert_eq!(welder.finish().vertices[0], first);
}

#[test]
fn weld_rejects_bad_tolerance() {
    for tolerance in [0.0, -1e-6, f64::NAN, f64::INFINITY] {
        let mode = WeldMode::Quantized { tolerance };
        assert!(matches!(mode.validate(), Err(Error::InvalidWeldTolerance(_))));
        assert!(matches!(MeshWelder::with_mode(mode), Err(Error::InvalidWeldTolerance(_))));

        let soup = UnindexedMesh { faces: vec![[DVec3::ZERO, DVec3::X, DVec3::Y]] };
        assert!(matches!(soup.index_with(mode), Err(Error::InvalidWeldTolerance(_))));
    }
    assert!(WeldMode::Exact.validate().is_ok());
    assert_eq!(MeshWelder::new().mode(), WeldMode::Exact);
}

#[test]
#[should_panic]
fn triangle_needs_welded_vertices() {
    let mut welder = MeshWelder::new();
    welder.weld(DVec3::ZERO);
    welder.add_triangle(1, 1, 2);
}

#[test]
fn unindexed_mesh_index() {
    let soup = UnindexedMesh {
        faces: vec![
            [DVec3::ZERO, DVec3::X, DVec3::Z],
            [DVec3::Z, DVec3::X, DVec3::ONE],
            [DVec3::ONE, DVec3::X, DVec3::ZERO],
        ],
    };
    let mesh = soup.index();
    assert_eq!(mesh.vertices, vec![DVec3::ZERO, DVec3::X, DVec3::Z, DVec3::ONE]);
    assert_eq!(mesh.faces, vec![[1, 2, 3], [3, 2, 4], [4, 2, 1]]);
}

#[test]
fn obj_text_layout() {
    let mesh = IndexedMesh {
        vertices: vec![dvec3(0.5, -1.0, 0.0), dvec3(0.25, 0.0, 1e-7), dvec3(-0.0, 2.0, 0.1)],
        faces: vec![[1, 2, 3]],
    };
    assert_eq!(
        mesh.to_obj_string(),
        "# --- Vertices ---\n\
         v 0.5 -1 0\n\
         v 0.25 0 0.0000001\n\
         v -0 2 0.1\n\
         # --- Faces ---\n\
         f 1 2 3\n"
    );
}

#[test]
fn obj_round_trip() {
    let mesh = IndexedMesh {
        vertices: vec![
            dvec3(0.1, 0.2, 0.30000000000000004),
            dvec3(-0.4999999999999999, 1.0 / 3.0, 7e-12),
            dvec3(123456.789, -0.0, 0.5),
            dvec3(0.25, 0.75, -0.125),
        ],
        faces: vec![[1, 2, 3], [3, 4, 1], [2, 4, 3]],
    };

    let parsed = IndexedMesh::from_obj_str(&mesh.to_obj_string()).unwrap();
    assert_eq!(parsed.faces, mesh.faces);
    for (a, b) in parsed.vertices.iter().zip(mesh.vertices.iter()) {
        assert_eq!(a.to_array().map(f64::to_bits), b.to_array().map(f64::to_bits));
    }
}

#[test]
fn obj_parse_errors() {
    let err = |text: &str| match IndexedMesh::from_obj_str(text) {
        Err(Error::ObjParse { line, message }) => (line, message),
        other => panic!("expected a parse error, got {other:?}"),
    };

    assert_eq!(err("v 0 0 0\nvn 0 0 1\n").0, 2);
    assert_eq!(err("v 0 0\n").0, 1);
    assert_eq!(err("v 0 0 0 1\n").0, 1);
    assert_eq!(err("v 0 zero 0\n"), (1, "invalid coordinate `zero`".to_string()));
    assert_eq!(err("v 0 0 0\n\n# faces\nf 1 1 2\n"), (4, "vertex id 2 out of range 1..=1".to_string()));
    assert_eq!(err("v 0 0 0\nf 0 1 1\n").0, 2);
    assert_eq!(err("v 0 0 0\nf 1/1 1 1\n").0, 2);

    let empty = IndexedMesh::from_obj_str("# nothing\n\n").unwrap();
    assert!(empty.vertices.is_empty() && empty.faces.is_empty());
    assert_eq!(empty.bounds(), None);
}

#[test]
fn mesh_bounds() {
    let mesh = IndexedMesh {
        vertices: vec![dvec3(0.5, -1.0, 0.0), dvec3(-0.25, 0.0, 2.0)],
        faces: Vec::new(),
    };
    let bounds = mesh.bounds().unwrap();
    assert_eq!(bounds.min, dvec3(-0.25, -1.0, 0.0));
    assert_eq!(bounds.max, dvec3(0.5, 0.0, 2.0));
}
