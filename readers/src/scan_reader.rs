use std::{
    ffi::OsStr,
    fs::File,
    io::{Cursor, Read},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;
use memmap::{Mmap, MmapOptions};
use nalgebra::Vector3;

use crate::{point_buffer::check_point_count, PointBuffer, ScanError, ScanResult};

/// File extensions accepted for point cloud scans
pub const SCAN_EXTENSIONS: &[&str] = &["bin"];
/// File extensions accepted for per-point label files
pub const LABEL_EXTENSIONS: &[&str] = &["label"];

const BYTES_PER_VALUE: usize = 4;

/// Memory layout of a scan file
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScanLayout {
    /// Rows of `[x, y, z, intensity]` as f32. Labels, if any, live in a separate `.label` file
    Separate,
    /// Rows of `[x, y, z, intensity, label]`, where the label column holds the bit pattern of a u32
    Combined,
}

impl ScanLayout {
    pub fn values_per_point(&self) -> usize {
        match self {
            ScanLayout::Separate => 4,
            ScanLayout::Combined => 5,
        }
    }

    pub fn bytes_per_point(&self) -> usize {
        self.values_per_point() * BYTES_PER_VALUE
    }
}

impl Default for ScanLayout {
    fn default() -> Self {
        ScanLayout::Separate
    }
}

/// Result of decoding a scan stream. `labels` is only present for the combined layout
#[derive(Debug, Clone, Default)]
pub struct DecodedScan {
    pub points: PointBuffer,
    pub labels: Option<Vec<u32>>,
}

fn check_stream_length(num_bytes: usize, row_width: usize, what: &str) -> ScanResult<usize> {
    if num_bytes % row_width != 0 {
        return Err(ScanError::Format(format!(
            "{} stream of {} bytes is not a multiple of the row width ({} bytes)",
            what, num_bytes, row_width
        )));
    }
    let num_rows = num_bytes / row_width;
    check_point_count(num_rows)?;
    Ok(num_rows)
}

/// Decodes a flat little-endian stream of f32 values into points and intensities. In the combined layout, the
/// fifth column of every row is read as a u32 label
pub fn decode_scan(bytes: &[u8], layout: ScanLayout) -> ScanResult<DecodedScan> {
    let num_points = check_stream_length(bytes.len(), layout.bytes_per_point(), "Scan")?;

    let mut positions = Vec::with_capacity(num_points);
    let mut intensities = Vec::with_capacity(num_points);
    let mut labels = match layout {
        ScanLayout::Combined => Some(Vec::with_capacity(num_points)),
        ScanLayout::Separate => None,
    };

    let mut reader = Cursor::new(bytes);
    for _ in 0..num_points {
        let x = reader.read_f32::<LittleEndian>()?;
        let y = reader.read_f32::<LittleEndian>()?;
        let z = reader.read_f32::<LittleEndian>()?;
        positions.push(Vector3::new(x, y, z));
        intensities.push(reader.read_f32::<LittleEndian>()?);
        if let Some(ref mut labels) = labels {
            labels.push(reader.read_u32::<LittleEndian>()?);
        }
    }

    Ok(DecodedScan {
        points: PointBuffer::new(positions, Some(intensities))?,
        labels,
    })
}

/// Decodes a flat little-endian stream of u32 labels, one per point
pub fn decode_labels(bytes: &[u8]) -> ScanResult<Vec<u32>> {
    let num_labels = check_stream_length(bytes.len(), BYTES_PER_VALUE, "Label")?;
    let mut labels = vec![0; num_labels];
    Cursor::new(bytes).read_u32_into::<LittleEndian>(&mut labels)?;
    Ok(labels)
}

/// Is the extension of `path` one of `extensions`?
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| extensions.contains(&ext))
        .unwrap_or_default()
}

/// Returns an error if the extension of `path` is not one of `allowed_extensions`
pub fn check_extension(path: &Path, allowed_extensions: &[&str]) -> ScanResult<()> {
    if !has_extension(path, allowed_extensions) {
        return Err(ScanError::Format(format!(
            "File {} does not have one of the extensions {:?}",
            path.display(),
            allowed_extensions
        )));
    }
    Ok(())
}

/// Maps the whole file into memory. Zero-length files can't be mapped, so they yield `None`
fn map_file(path: &Path) -> ScanResult<Option<Mmap>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    let mmapped_file = unsafe { MmapOptions::new().map(&file)? };
    Ok(Some(mmapped_file))
}

/// Reads a `.bin` scan file with the given layout
pub fn read_scan_file<P: AsRef<Path>>(path: P, layout: ScanLayout) -> ScanResult<DecodedScan> {
    let path = path.as_ref();
    check_extension(path, SCAN_EXTENSIONS)?;
    let mapped = map_file(path)?;
    let decoded = decode_scan(mapped.as_deref().unwrap_or(&[]), layout)?;
    debug!(
        "Read {} points from {} ({:?} layout)",
        decoded.points.len(),
        path.display(),
        layout
    );
    Ok(decoded)
}

/// Reads a `.label` file holding one packed u32 label per point
pub fn read_label_file<P: AsRef<Path>>(path: P) -> ScanResult<Vec<u32>> {
    let path = path.as_ref();
    check_extension(path, LABEL_EXTENSIONS)?;
    let mapped = map_file(path)?;
    let labels = decode_labels(mapped.as_deref().unwrap_or(&[]))?;
    debug!("Read {} labels from {}", labels.len(), path.display());
    Ok(labels)
}

/// Reads all remaining bytes of `reader` and decodes them as a scan. Used for streams that don't come from a file
pub fn read_scan<R: Read>(mut reader: R, layout: ScanLayout) -> ScanResult<DecodedScan> {
    let mut bytes = vec![];
    reader.read_to_end(&mut bytes)?;
    decode_scan(&bytes, layout)
}
