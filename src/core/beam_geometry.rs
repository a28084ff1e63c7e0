use serde::{Deserialize, Serialize};

use crate::types::{XriError, XriResult};

/// Per-row altitude and per-column azimuth angles of the sensor, in degrees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamIntrinsics {
    pub beam_altitude_angles: Vec<f64>,
    pub beam_azimuth_angles: Vec<f64>,
}

/// Radian lookup tables resolving a pixel to its beam angles
#[derive(Debug, Clone)]
pub struct BeamGeometry {
    altitude: Vec<f64>,
    azimuth: Vec<f64>,
}

impl BeamGeometry {
    /// Convert intrinsics once into radian lookup tables
    pub fn new(intrinsics: &BeamIntrinsics) -> XriResult<Self> {
        if intrinsics.beam_altitude_angles.is_empty() {
            return Err(XriError::Configuration(
                "beam_altitude_angles must not be empty".to_string(),
            ));
        }
        if intrinsics.beam_azimuth_angles.is_empty() {
            return Err(XriError::Configuration(
                "beam_azimuth_angles must not be empty".to_string(),
            ));
        }

        log::debug!(
            "Beam geometry: {} altitude angles, {} azimuth angles",
            intrinsics.beam_altitude_angles.len(),
            intrinsics.beam_azimuth_angles.len()
        );

        Ok(Self {
            altitude: intrinsics.beam_altitude_angles.iter().map(|a| a.to_radians()).collect(),
            azimuth: intrinsics.beam_azimuth_angles.iter().map(|a| a.to_radians()).collect(),
        })
    }

    /// (altitude, azimuth) in radians for a pixel.
    ///
    /// Indices past the end of a table clamp to its last entry, which covers
    /// imagery resized beyond the sensor's native row/column count.
    #[inline]
    pub fn angle_for(&self, row: usize, col: usize) -> (f64, f64) {
        let alt = self.altitude[row.min(self.altitude.len() - 1)];
        let azi = self.azimuth[col.min(self.azimuth.len() - 1)];
        (alt, azi)
    }

    pub fn rows(&self) -> usize {
        self.altitude.len()
    }

    pub fn cols(&self) -> usize {
        self.azimuth.len()
    }
}

impl TryFrom<&BeamIntrinsics> for BeamGeometry {
    type Error = XriError;

    fn try_from(value: &BeamIntrinsics) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
