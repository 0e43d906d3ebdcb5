use thiserror::Error;

/// Errors raised while configuring a run or reading and writing meshes.
#[derive(Error, Debug)]
pub enum Error {
    /// An axis of the bounding box has no extent (or is not finite).
    #[error("empty bounds on {axis} axis: min {min}, max {max}")]
    EmptyBounds {
        axis: char,
        min: f64,
        max: f64,
    },

    /// The lattice step must be positive and finite.
    #[error("voxel size must be positive and finite, got {0}")]
    InvalidDelta(f64),

    /// The lattice has more voxels than can be indexed.
    #[error("lattice of {x} x {y} x {z} voxels is too large")]
    TooManyVoxels {
        x: f64,
        y: f64,
        z: f64,
    },

    #[error("isolevel must be finite, got {0}")]
    InvalidIsolevel(f64),

    #[error("weld tolerance must be positive and finite, got {0}")]
    InvalidWeldTolerance(f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),

    /// A line of an OBJ file could not be understood.
    #[error("OBJ line {line}: {message}")]
    ObjParse {
        line: usize,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[test]
fn error_display() {
    let err = Error::EmptyBounds { axis: 'y', min: 1.0, max: -1.0 };
    assert_eq!(err.to_string(), "empty bounds on y axis: min 1, max -1");

    let err = Error::InvalidDelta(0.0);
    assert_eq!(err.to_string(), "voxel size must be positive and finite, got 0");

    let err = Error::TooManyVoxels { x: 1e10, y: 2.0, z: 2.0 };
    assert_eq!(err.to_string(), "lattice of 10000000000 x 2 x 2 voxels is too large");

    let err = Error::ObjParse { line: 3, message: "expected 3 vertex ids".into() };
    assert_eq!(err.to_string(), "OBJ line 3: expected 3 vertex ids");
}
