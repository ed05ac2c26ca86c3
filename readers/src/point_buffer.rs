use nalgebra::Vector3;

use crate::{ScanError, ScanResult};

/// Largest number of points a scan may hold. Range images address points by `i32` source index
pub const MAX_POINTS: usize = i32::MAX as usize;

pub(crate) fn check_point_count(num_points: usize) -> ScanResult<()> {
    if num_points > MAX_POINTS {
        return Err(ScanError::Format(format!(
            "Scan holds {} points, at most {} are supported",
            num_points, MAX_POINTS
        )));
    }
    Ok(())
}

/// The points of a single scan in the sensor frame, together with one intensity value per point. Positions
/// and intensities are parallel arrays and always have the same length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointBuffer {
    positions: Vec<Vector3<f32>>,
    intensities: Vec<f32>,
}

impl PointBuffer {
    /// Creates a new `PointBuffer`. If no intensities are given, all intensities are zero
    pub fn new(positions: Vec<Vector3<f32>>, intensities: Option<Vec<f32>>) -> ScanResult<Self> {
        check_point_count(positions.len())?;
        let intensities = match intensities {
            Some(intensities) => {
                if intensities.len() != positions.len() {
                    return Err(ScanError::Format(format!(
                        "Got {} intensity values for {} points",
                        intensities.len(),
                        positions.len()
                    )));
                }
                intensities
            }
            None => vec![0.0; positions.len()],
        };

        Ok(Self {
            positions,
            intensities,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vector3<f32>] {
        &self.positions
    }

    pub fn intensities(&self) -> &[f32] {
        &self.intensities
    }

    pub fn position(&self, index: usize) -> &Vector3<f32> {
        &self.positions[index]
    }

    pub fn intensity(&self, index: usize) -> f32 {
        self.intensities[index]
    }
}
