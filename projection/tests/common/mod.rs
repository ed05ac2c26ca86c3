use std::{fs, path::Path};

use anyhow::{Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use rand::{thread_rng, Rng};

/// A point as stored in a scan file: position, intensity and packed label
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RawPoint {
    pub position: [f32; 3],
    pub intensity: f32,
    pub label: u32,
}

impl RawPoint {
    pub fn new(x: f32, y: f32, z: f32, intensity: f32, label: u32) -> Self {
        Self {
            position: [x, y, z],
            intensity,
            label,
        }
    }
}

/// The three points of the reference scenario: two points straight ahead at 1m and 2m, one to the left
pub fn reference_points() -> Vec<RawPoint> {
    vec![
        RawPoint::new(1.0, 0.0, 0.0, 10.0, 5),
        RawPoint::new(0.0, 1.0, 0.0, 20.0, 0x0002_0005),
        RawPoint::new(2.0, 0.0, 0.0, 30.0, 5),
    ]
}

/// Generate `count` random points around the sensor
pub fn gen_random_points(count: usize) -> Vec<RawPoint> {
    let mut rng = thread_rng();
    (0..count)
        .map(|_| {
            RawPoint::new(
                rng.gen_range(-80.0..80.0),
                rng.gen_range(-80.0..80.0),
                rng.gen_range(-3.0..2.0),
                rng.gen_range(0.0..1.0),
                rng.gen_range(0..260u32) | (rng.gen_range(0..4u32) << 16),
            )
        })
        .collect()
}

fn write_position_and_intensity(bytes: &mut Vec<u8>, point: &RawPoint) -> Result<()> {
    for coordinate in point.position.iter() {
        bytes.write_f32::<LittleEndian>(*coordinate)?;
    }
    bytes.write_f32::<LittleEndian>(point.intensity)?;
    Ok(())
}

/// Writes the points as `[x, y, z, intensity]` rows
pub fn write_separate_scan(points: &[RawPoint], path: &Path) -> Result<()> {
    let mut bytes = Vec::with_capacity(points.len() * 16);
    for point in points {
        write_position_and_intensity(&mut bytes, point)?;
    }
    fs::write(path, bytes).with_context(|| format!("Could not write {}", path.display()))
}

/// Writes the labels of the points as a `.label` file
pub fn write_label_file(points: &[RawPoint], path: &Path) -> Result<()> {
    let mut bytes = Vec::with_capacity(points.len() * 4);
    for point in points {
        bytes.write_u32::<LittleEndian>(point.label)?;
    }
    fs::write(path, bytes).with_context(|| format!("Could not write {}", path.display()))
}

/// Writes the points as `[x, y, z, intensity, label]` rows
pub fn write_combined_scan(points: &[RawPoint], path: &Path) -> Result<()> {
    let mut bytes = Vec::with_capacity(points.len() * 20);
    for point in points {
        write_position_and_intensity(&mut bytes, point)?;
        bytes.write_u32::<LittleEndian>(point.label)?;
    }
    fs::write(path, bytes).with_context(|| format!("Could not write {}", path.display()))
}

/// Minimal dataset config for a small range image
pub fn test_config_yaml(height: usize, width: usize) -> String {
    format!(
        r#"
lidar:
  manufacturer: velodyne
  H: {}
  W: {}
  fov_up: 3.0
  fov_down: -25.0
labels:
  0: "unlabeled"
  5: "pole"
color_map:
  0: [0, 0, 0]
  5: [0, 0, 255]
mapping_color_map:
  0: [0, 0, 0]
  1: [255, 255, 255]
learning_map:
  5: 1
"#,
        height, width
    )
}
