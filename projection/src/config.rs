use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::colors::{InstanceColorTable, SemanticColorTable};
use crate::labels::{ClassRemapTable, SemanticId};
use crate::projector::ProjectionParams;

/// Channel order of the color triples in the configuration
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorOrder {
    Bgr,
    Rgb,
}

impl Default for ColorOrder {
    fn default() -> Self {
        ColorOrder::Bgr
    }
}

/// Sensor section of the dataset configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LidarConfig {
    /// Name of the directory below the dataset root that holds the scans
    pub manufacturer: String,
    #[serde(rename = "H")]
    pub height: usize,
    #[serde(rename = "W")]
    pub width: usize,
    pub fov_up: f32,
    pub fov_down: f32,
}

impl Default for LidarConfig {
    fn default() -> Self {
        let params = ProjectionParams::default();
        Self {
            manufacturer: "velodyne".into(),
            height: params.height,
            width: params.width,
            fov_up: params.fov_up,
            fov_down: params.fov_down,
        }
    }
}

/// Dataset configuration in the layout of the SemanticKITTI YAML files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default)]
    pub lidar: LidarConfig,
    /// Class names, only used for reporting
    #[serde(default)]
    pub labels: BTreeMap<SemanticId, String>,
    pub color_map: BTreeMap<SemanticId, [u8; 3]>,
    /// Colors of the reduced classes, used instead of `color_map` when remapping is enabled
    #[serde(default)]
    pub mapping_color_map: Option<BTreeMap<SemanticId, [u8; 3]>>,
    #[serde(default)]
    pub learning_map: Option<BTreeMap<SemanticId, SemanticId>>,
    #[serde(default)]
    pub color_order: ColorOrder,
}

impl DatasetConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Could not open config file {}", path.display()))?;
        let config: Self = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Could not parse config file {}", path.display()))?;
        config
            .projection_params()
            .with_context(|| format!("Invalid lidar section in {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Could not parse config")?;
        config.projection_params()?;
        Ok(config)
    }

    pub fn projection_params(&self) -> Result<ProjectionParams> {
        ProjectionParams::new(
            self.lidar.height,
            self.lidar.width,
            self.lidar.fov_up,
            self.lidar.fov_down,
        )
    }

    /// Semantic colors to use. With `mapping`, the colors of the reduced classes are required
    pub fn semantic_color_table(&self, mapping: bool) -> Result<SemanticColorTable> {
        let color_map = if mapping {
            self.mapping_color_map
                .as_ref()
                .ok_or_else(|| anyhow!("Class remapping requires a mapping_color_map"))?
        } else {
            &self.color_map
        };
        Ok(SemanticColorTable::from_color_map(color_map))
    }

    pub fn instance_color_table(&self, seed: u64) -> InstanceColorTable {
        InstanceColorTable::with_seed(seed)
    }

    pub fn remap_table(&self) -> Result<ClassRemapTable> {
        let learning_map = self
            .learning_map
            .as_ref()
            .ok_or_else(|| anyhow!("Class remapping requires a learning_map"))?;
        Ok(learning_map.iter().map(|(from, to)| (*from, *to)).collect())
    }

    pub fn class_name(&self, id: SemanticId) -> Option<&str> {
        self.labels.get(&id).map(String::as_str)
    }
}
