use std::path::Path;

use anyhow::Result;
use log::info;
use readers::{
    check_extension, read_label_file, read_scan_file, DecodedScan, PointBuffer, ScanLayout,
    ScanResult, LABEL_EXTENSIONS, SCAN_EXTENSIONS,
};

use crate::colors::{ColorResolver, PixelLabels, PointColors};
use crate::labels::{ClassRemapTable, LabelContext};
use crate::projector::{ProjectionParams, Projection, Projector};

/// A decoded scan, with or without per-point labels
#[derive(Debug, Clone, PartialEq)]
pub enum Scan {
    Plain(PointBuffer),
    Labeled(PointBuffer, LabelContext),
}

impl Scan {
    /// Attaches packed labels to `points`. Fails with `CountMismatch` if there is not one label per point
    pub fn with_labels(points: PointBuffer, packed_labels: &[u32]) -> ScanResult<Self> {
        let labels = LabelContext::from_packed(packed_labels, points.len())?;
        Ok(Scan::Labeled(points, labels))
    }

    pub fn from_decoded(decoded: DecodedScan) -> ScanResult<Self> {
        match decoded.labels {
            Some(labels) => Self::with_labels(decoded.points, &labels),
            None => Ok(Scan::Plain(decoded.points)),
        }
    }

    pub fn points(&self) -> &PointBuffer {
        match self {
            Scan::Plain(points) => points,
            Scan::Labeled(points, _) => points,
        }
    }

    pub fn labels(&self) -> Option<&LabelContext> {
        match self {
            Scan::Plain(_) => None,
            Scan::Labeled(_, labels) => Some(labels),
        }
    }

    pub fn len(&self) -> usize {
        self.points().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points().is_empty()
    }

    /// Drops the labels of a labeled scan
    pub fn into_plain(self) -> Self {
        match self {
            Scan::Labeled(points, _) => Scan::Plain(points),
            plain => plain,
        }
    }
}

/// Opens a `.bin` scan. Scans in the combined layout are always labeled, scans in the separate layout never are
pub fn open_scan<P: AsRef<Path>>(path: P, layout: ScanLayout) -> ScanResult<Scan> {
    Scan::from_decoded(read_scan_file(path, layout)?)
}

/// Opens a `.bin` scan in the separate layout together with its `.label` file
pub fn open_scan_with_labels<P: AsRef<Path>, Q: AsRef<Path>>(
    scan_path: P,
    label_path: Q,
) -> ScanResult<Scan> {
    // Check both names before touching either file
    check_extension(scan_path.as_ref(), SCAN_EXTENSIONS)?;
    check_extension(label_path.as_ref(), LABEL_EXTENSIONS)?;

    let decoded = read_scan_file(scan_path, ScanLayout::Separate)?;
    let labels = read_label_file(label_path)?;
    Scan::with_labels(decoded.points, &labels)
}

/// Label-derived outputs of a processed scan
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledOutput {
    pub labels: LabelContext,
    pub point_colors: PointColors,
    pub pixel_labels: PixelLabels,
}

/// Everything that is derived from one scan. Replaced as a whole when the next scan is processed
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedScan {
    pub points: PointBuffer,
    pub projection: Projection,
    pub labels: Option<LabeledOutput>,
}

/// Runs the full pipeline (remapping, projection, colorization) on scans, using one set of parameters and color
/// tables for a whole session
#[derive(Debug, Clone)]
pub struct ScanProcessor {
    projector: Projector,
    colors: ColorResolver,
    remap: Option<ClassRemapTable>,
}

impl ScanProcessor {
    pub fn new(
        params: ProjectionParams,
        colors: ColorResolver,
        remap: Option<ClassRemapTable>,
    ) -> Result<Self> {
        Ok(Self {
            projector: Projector::new(params)?,
            colors,
            remap,
        })
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn colors(&self) -> &ColorResolver {
        &self.colors
    }

    pub fn process(&self, scan: Scan) -> ProcessedScan {
        let (points, labels) = match scan {
            Scan::Plain(points) => (points, None),
            Scan::Labeled(points, labels) => (points, Some(labels)),
        };

        let projection = self.projector.project(&points);

        let labels = labels.map(|mut labels| {
            if let Some(ref table) = self.remap {
                labels.remap(table);
            }
            let point_colors = self.colors.colorize_points(&labels);
            let pixel_labels = self.colors.colorize_pixels(&projection.image, &labels);
            LabeledOutput {
                labels,
                point_colors,
                pixel_labels,
            }
        });

        info!(
            "Processed scan with {} points ({}), {} occupied pixels",
            points.len(),
            if labels.is_some() {
                "labeled"
            } else {
                "unlabeled"
            },
            projection.image.occupied_pixels()
        );

        ProcessedScan {
            points,
            projection,
            labels,
        }
    }
}
