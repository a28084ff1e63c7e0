use serde_json::Value;
use std::path::Path;

use crate::core::beam_geometry::{BeamGeometry, BeamIntrinsics};
use crate::types::{XriError, XriResult};

const ALTITUDE_KEY: &str = "beam_altitude_angles";
const AZIMUTH_KEY: &str = "beam_azimuth_angles";

/// Parse beam intrinsics from a sensor metadata JSON document.
///
/// The angle arrays may sit at the top level or under a `beam_intrinsics`
/// object. Absent or empty arrays are configuration errors.
pub fn parse_intrinsics(json: &str) -> XriResult<BeamIntrinsics> {
    let doc: Value = serde_json::from_str(json)?;
    let section = match doc.get("beam_intrinsics") {
        Some(nested) => nested,
        None => &doc,
    };

    let intrinsics = BeamIntrinsics {
        beam_altitude_angles: angle_array(section, ALTITUDE_KEY)?,
        beam_azimuth_angles: angle_array(section, AZIMUTH_KEY)?,
    };
    // Empty tables are rejected here so a bad file fails at load time
    BeamGeometry::new(&intrinsics)?;
    Ok(intrinsics)
}

fn angle_array(section: &Value, key: &str) -> XriResult<Vec<f64>> {
    let values = section
        .get(key)
        .ok_or_else(|| XriError::Configuration(format!("beam intrinsics missing required key '{}'", key)))?
        .as_array()
        .ok_or_else(|| XriError::Configuration(format!("'{}' must be an array", key)))?;

    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64().ok_or_else(|| {
                XriError::Configuration(format!("'{}'[{}] is not a number: {}", key, i, v))
            })
        })
        .collect()
}

/// Load beam intrinsics from a JSON file
pub fn load_intrinsics<P: AsRef<Path>>(path: P) -> XriResult<BeamIntrinsics> {
    log::info!("Loading beam intrinsics: {}", path.as_ref().display());
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_intrinsics(&content)
}

/// Load intrinsics and build the radian lookup tables in one step
pub fn load_beam_geometry<P: AsRef<Path>>(path: P) -> XriResult<BeamGeometry> {
    BeamGeometry::new(&load_intrinsics(path)?)
}
