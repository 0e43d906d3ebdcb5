use std::{ fs::File, io::BufReader, path::Path };

use serde::{ Deserialize, Serialize };

use crate::{
    bounds::Bounds,
    error::{ Error, Result },
    grid::Grid,
    mesh::WeldMode,
};

/// Everything a run needs besides the field itself.
///
/// Missing JSON keys fall back to [`MarchConfig::default`], which is a
/// radius-0.3 tube (isolevel `0.3²`) over `[-1, 1]³` with a 0.05 step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarchConfig {
    pub isolevel: f64,
    pub bounds: Bounds,
    /// Edge length of a voxel
    pub delta: f64,
    pub weld: WeldMode,
}

impl Default for MarchConfig {
    fn default() -> Self {
        Self {
            isolevel: 0.09,
            bounds: Bounds::UNIT_CUBE,
            delta: 0.05,
            weld: WeldMode::Exact,
        }
    }
}

impl MarchConfig {
    pub fn validate(&self) -> Result<()> {
        self.grid().map(drop)
    }

    /// Checks every setting and lays out the lattice.
    pub fn grid(&self) -> Result<Grid> {
        if !self.isolevel.is_finite() {
            return Err(Error::InvalidIsolevel(self.isolevel));
        }
        self.weld.validate()?;
        Grid::new(self.bounds, self.delta)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[test]
fn default_config() {
    let config = MarchConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.grid().unwrap().steps(), glam::UVec3::splat(40));
}

#[test]
fn config_from_json() {
    let config = MarchConfig::from_json_str(r#"{ "isolevel": 0.25, "delta": 0.5 }"#).unwrap();
    assert_eq!(config.isolevel, 0.25);
    assert_eq!(config.delta, 0.5);
    assert_eq!(config.bounds, Bounds::UNIT_CUBE);
    assert_eq!(config.weld, WeldMode::Exact);

    let config = MarchConfig::from_json_str(
        r#"{
            "bounds": { "min": [0.0, 0.0, -2.0], "max": [1.0, 3.0, 2.0] },
            "weld": { "mode": "quantized", "tolerance": 1e-6 }
        }"#,
    ).unwrap();
    assert_eq!(config.bounds, Bounds::from_ranges((0.0, 1.0), (0.0, 3.0), (-2.0, 2.0)));
    assert_eq!(config.weld, WeldMode::Quantized { tolerance: 1e-6 });

    let text = config.to_json_string().unwrap();
    assert_eq!(MarchConfig::from_json_str(&text).unwrap(), config);
}

#[test]
fn config_errors() {
    assert!(matches!(MarchConfig::from_json_str("{ \"delta\": 0 }"), Err(Error::InvalidDelta(_))));
    assert!(matches!(MarchConfig::from_json_str("{ \"delta\": \"big\" }"), Err(Error::Json(_))));
    assert!(matches!(MarchConfig::from_json_str("{ \"step\": 0.1 }"), Err(Error::Json(_))));
    assert!(matches!(
        MarchConfig::from_json_str(r#"{ "weld": { "mode": "quantized", "tolerance": -1.0 } }"#),
        Err(Error::InvalidWeldTolerance(_))
    ));
    assert!(matches!(
        MarchConfig::from_json_file("/nonexistent/isocrust.json"),
        Err(Error::Io(_))
    ));

    let config = MarchConfig { isolevel: f64::NAN, ..Default::default() };
    assert!(matches!(config.validate(), Err(Error::InvalidIsolevel(_))));

    let config = MarchConfig { bounds: Bounds::cube(1.0, 1.0), ..Default::default() };
    assert!(matches!(config.validate(), Err(Error::EmptyBounds { axis: 'x', .. })));
}
