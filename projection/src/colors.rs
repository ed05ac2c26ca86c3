use std::collections::BTreeMap;

use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;

use crate::labels::{InstanceId, LabelContext, SemanticId};
use crate::projector::RangeImage;

/// Color with all channels in `[0, 1]`, in the channel order of the color configuration
pub type Rgb = [f32; 3];

pub const BLACK: Rgb = [0.0, 0.0, 0.0];
/// Color of points that belong to no instance (instance id 0)
pub const UNASSIGNED_INSTANCE_COLOR: Rgb = [0.1, 0.1, 0.1];
/// Number of entries in the instance color table
pub const INSTANCE_TABLE_SIZE: usize = 100_000;
/// Seed used for the instance colors unless another one is requested
pub const DEFAULT_INSTANCE_SEED: u64 = 0x5EED;

/// Number of black rows appended after the largest configured semantic id
const SEMANTIC_TABLE_HEADROOM: usize = 100;

/// Lookup table from semantic id to color, built from 8-bit color triples
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticColorTable {
    colors: Vec<Rgb>,
}

impl SemanticColorTable {
    pub fn from_color_map(color_map: &BTreeMap<SemanticId, [u8; 3]>) -> Self {
        let max_key = color_map
            .keys()
            .next_back()
            .map(|key| *key as usize + 1)
            .unwrap_or(0);
        let mut colors = vec![BLACK; max_key + SEMANTIC_TABLE_HEADROOM];
        for (id, color) in color_map {
            colors[*id as usize] = [
                color[0] as f32 / 255.0,
                color[1] as f32 / 255.0,
                color[2] as f32 / 255.0,
            ];
        }
        Self { colors }
    }

    /// Color of the given id. Ids beyond the table are black
    pub fn color(&self, id: SemanticId) -> Rgb {
        self.colors.get(id as usize).copied().unwrap_or(BLACK)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Random but reproducible colors for object instances
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceColorTable {
    colors: Vec<Rgb>,
}

impl InstanceColorTable {
    pub fn with_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let channel = Uniform::new(0.0f32, 1.0);
        let mut colors = (0..INSTANCE_TABLE_SIZE)
            .map(|_| [rng.sample(channel), rng.sample(channel), rng.sample(channel)])
            .collect::<Vec<_>>();
        colors[0] = UNASSIGNED_INSTANCE_COLOR;
        Self { colors }
    }

    pub fn color(&self, id: InstanceId) -> Rgb {
        self.colors[id as usize]
    }
}

impl Default for InstanceColorTable {
    fn default() -> Self {
        Self::with_seed(DEFAULT_INSTANCE_SEED)
    }
}

/// Per-point colors, parallel to the points of a scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointColors {
    pub semantic: Vec<Rgb>,
    pub instance: Vec<Rgb>,
}

/// Labels and colors of the visible point of every pixel. Empty pixels have label 0 and a black color
#[derive(Debug, Clone, PartialEq)]
pub struct PixelLabels {
    pub height: usize,
    pub width: usize,
    pub semantic_ids: Vec<SemanticId>,
    pub instance_ids: Vec<InstanceId>,
    pub semantic_colors: Vec<Rgb>,
    pub instance_colors: Vec<Rgb>,
}

impl PixelLabels {
    fn new(height: usize, width: usize) -> Self {
        let num_pixels = height * width;
        Self {
            height,
            width,
            semantic_ids: vec![0; num_pixels],
            instance_ids: vec![0; num_pixels],
            semantic_colors: vec![BLACK; num_pixels],
            instance_colors: vec![BLACK; num_pixels],
        }
    }
}

/// Turns semantic and instance ids into colors. The tables are built once and shared by every scan
#[derive(Debug, Clone)]
pub struct ColorResolver {
    semantic: SemanticColorTable,
    instance: InstanceColorTable,
}

impl ColorResolver {
    pub fn new(semantic: SemanticColorTable, instance: InstanceColorTable) -> Self {
        Self { semantic, instance }
    }

    pub fn semantic_color(&self, id: SemanticId) -> Rgb {
        self.semantic.color(id)
    }

    pub fn instance_color(&self, id: InstanceId) -> Rgb {
        self.instance.color(id)
    }

    pub fn colorize_points(&self, labels: &LabelContext) -> PointColors {
        PointColors {
            semantic: labels
                .semantic_ids()
                .par_iter()
                .map(|id| self.semantic_color(*id))
                .collect(),
            instance: labels
                .instance_ids()
                .par_iter()
                .map(|id| self.instance_color(*id))
                .collect(),
        }
    }

    /// Scatters the labels of the visible points into the pixels of `image`. `labels` must belong to the scan that
    /// `image` was projected from
    pub fn colorize_pixels(&self, image: &RangeImage, labels: &LabelContext) -> PixelLabels {
        let mut pixels = PixelLabels::new(image.height(), image.width());
        for (pixel, index) in image.indices().iter().enumerate() {
            if *index < 0 {
                continue;
            }
            let semantic = labels.semantic(*index as usize);
            let instance = labels.instance(*index as usize);
            pixels.semantic_ids[pixel] = semantic;
            pixels.instance_ids[pixel] = instance;
            pixels.semantic_colors[pixel] = self.semantic_color(semantic);
            pixels.instance_colors[pixel] = self.instance_color(instance);
        }
        pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::{ProjectionParams, Projector};
    use nalgebra::Vector3;
    use readers::{PointBuffer, ScanResult};

    fn color_map() -> BTreeMap<SemanticId, [u8; 3]> {
        vec![(0, [0, 0, 0]), (10, [245, 150, 100]), (40, [255, 0, 255])]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_semantic_table_has_headroom() {
        let table = SemanticColorTable::from_color_map(&color_map());
        assert_eq!(table.len(), 41 + 100);
        assert_eq!(table.color(40), [1.0, 0.0, 1.0]);
        assert_eq!(table.color(10)[0], 245.0 / 255.0);
        assert_eq!(table.color(11), BLACK);
        assert_eq!(table.color(u16::MAX), BLACK);
    }

    #[test]
    fn test_empty_color_map() {
        let table = SemanticColorTable::from_color_map(&BTreeMap::new());
        assert_eq!(table.len(), 100);
        assert_eq!(table.color(3), BLACK);
    }

    #[test]
    fn test_instance_table() {
        let table = InstanceColorTable::with_seed(7);
        assert_eq!(table.color(0), UNASSIGNED_INSTANCE_COLOR);
        for id in [1u16, 2, 500, u16::MAX].iter() {
            assert!(table.color(*id).iter().all(|c| (0.0..1.0).contains(c)));
        }
        assert_eq!(table, InstanceColorTable::with_seed(7));
        assert_ne!(table, InstanceColorTable::with_seed(8));
    }

    #[test]
    fn test_colorize_points_and_pixels() -> ScanResult<()> {
        let points = PointBuffer::new(
            vec![
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(2.0, 0.0, 0.0),
            ],
            Some(vec![10.0, 20.0, 30.0]),
        )?;
        let labels = LabelContext::from_packed(&[10, 0x0002_0028, 40], 3)?;
        let resolver = ColorResolver::new(
            SemanticColorTable::from_color_map(&color_map()),
            InstanceColorTable::default(),
        );

        let point_colors = resolver.colorize_points(&labels);
        assert_eq!(point_colors.semantic.len(), 3);
        assert_eq!(point_colors.semantic[2], [1.0, 0.0, 1.0]);
        assert_eq!(point_colors.instance[0], UNASSIGNED_INSTANCE_COLOR);
        assert_eq!(point_colors.instance[1], resolver.instance_color(2));

        let projector = Projector::new(ProjectionParams {
            height: 2,
            width: 4,
            ..Default::default()
        })
        .expect("Invalid test params");
        let projection = projector.project(&points);
        let pixels = resolver.colorize_pixels(&projection.image, &labels);

        // Point 0 occludes point 2 in pixel (0, 2)
        assert_eq!(pixels.semantic_ids[2], 10);
        assert_eq!(pixels.semantic_colors[2], resolver.semantic_color(10));
        assert_eq!(pixels.semantic_ids[1], 40);
        assert_eq!(pixels.instance_ids[1], 2);
        assert_eq!(pixels.instance_colors[1], resolver.instance_color(2));
        // Empty pixels keep their default
        assert_eq!(pixels.semantic_ids[0], 0);
        assert_eq!(pixels.semantic_colors[0], BLACK);
        assert_eq!(pixels.instance_colors[7], BLACK);
        Ok(())
    }
}
