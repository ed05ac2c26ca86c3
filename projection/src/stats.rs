use std::{fmt::Display, time::Duration};

use itertools::Itertools;

use crate::labels::SemanticId;
use crate::scan::ProcessedScan;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanStats {
    pub total_points: usize,
    pub labeled: bool,
    pub occupied_pixels: usize,
    pub total_pixels: usize,
    /// Distinct semantic ids with their point counts, sorted by id
    pub semantic_classes: Vec<(SemanticId, usize)>,
    pub runtime: Duration,
}

impl ScanStats {
    pub fn from_processed(scan: &ProcessedScan, runtime: Duration) -> Self {
        let image = &scan.projection.image;
        let semantic_classes = scan
            .labels
            .as_ref()
            .map(|labels| {
                labels
                    .labels
                    .semantic_ids()
                    .iter()
                    .copied()
                    .counts()
                    .into_iter()
                    .sorted()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            total_points: scan.points.len(),
            labeled: scan.labels.is_some(),
            occupied_pixels: image.occupied_pixels(),
            total_pixels: image.height() * image.width(),
            semantic_classes,
            runtime,
        }
    }

    /// Fraction of pixels that hold a point
    pub fn coverage(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.occupied_pixels as f64 / self.total_pixels as f64
        }
    }
}

impl Display for ScanStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Runtime: {}ms", self.runtime.as_secs_f64() * 1000.0)?;
        writeln!(f, "Points: {}", self.total_points)?;
        writeln!(
            f,
            "Occupied pixels: {} of {} ({:.1}%)",
            self.occupied_pixels,
            self.total_pixels,
            self.coverage() * 100.0
        )?;
        if self.labeled {
            writeln!(f, "Semantic classes: {}", self.semantic_classes.len())?;
        }
        Ok(())
    }
}
