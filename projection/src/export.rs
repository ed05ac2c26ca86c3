//! Conversion of range images and color grids into 8-bit PNG images.

use std::{fs::File, io::BufWriter, path::Path};

use anyhow::{anyhow, ensure, Context, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder};

use crate::colors::Rgb;
use crate::config::ColorOrder;
use crate::projector::{PointProjection, RangeImage};

/// Ranges are compressed with `range^(1/RANGE_POWER)` before normalization, so that near structure stays visible
pub const RANGE_POWER: f32 = 16.0;

/// Min-max normalizes `values` in place over their finite entries. Non-finite entries become 0, as do all
/// values if the finite ones are equal
fn normalize(values: &mut [f32]) {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), v| {
            (min.min(*v), max.max(*v))
        });
    let extent = max - min;
    for value in values.iter_mut() {
        *value = if value.is_finite() && extent > 0.0 {
            (*value - min) / extent
        } else {
            0.0
        };
    }
}

/// Per-pixel display intensity in `[0, 1]`. Occupied pixels hold their compressed range, empty pixels get the
/// smallest compressed range, i.e. 0 after normalization
pub fn range_display_values(image: &RangeImage) -> Vec<f32> {
    let mut values = image
        .ranges()
        .iter()
        .map(|range| {
            if *range > 0.0 {
                range.powf(1.0 / RANGE_POWER)
            } else {
                f32::NAN
            }
        })
        .collect::<Vec<_>>();

    let min = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold(f32::INFINITY, |min, v| min.min(*v));
    if !min.is_finite() {
        return vec![0.0; values.len()];
    }
    for value in values.iter_mut().filter(|v| v.is_nan()) {
        *value = min;
    }
    normalize(&mut values);
    values
}

/// Per-point display intensity in `[0, 1]` from the depth of every point. Points with a non-finite depth get 0
pub fn point_range_display_values(projections: &[PointProjection]) -> Vec<f32> {
    let mut values = projections
        .iter()
        .map(|p| p.depth.powf(1.0 / RANGE_POWER))
        .collect::<Vec<_>>();
    normalize(&mut values);
    values
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn checked_pixel_count(width: usize, height: usize, channels: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|px| px.checked_mul(channels))
        .ok_or_else(|| anyhow!("Image dimensions overflow when computing buffer size"))
}

fn write_png(path: &Path, data: &[u8], width: usize, height: usize, color: ColorType) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output PNG at {}", path.display()))?;
    let encoder = PngEncoder::new_with_quality(
        BufWriter::new(file),
        CompressionType::Fast,
        FilterType::NoFilter,
    );
    encoder
        .write_image(data, width as u32, height as u32, color)
        .with_context(|| format!("Failed to encode PNG {}", path.display()))?;
    Ok(())
}

/// Writes the range image as an 8-bit grayscale PNG
pub fn write_range_png(path: &Path, image: &RangeImage) -> Result<()> {
    let data = range_display_values(image)
        .into_iter()
        .map(to_byte)
        .collect::<Vec<_>>();
    write_png(path, &data, image.width(), image.height(), ColorType::L8)
}

/// Writes a row-major color grid as an 8-bit RGB PNG. Colors in BGR order are swizzled to RGB
pub fn write_color_png(
    path: &Path,
    colors: &[Rgb],
    width: usize,
    height: usize,
    order: ColorOrder,
) -> Result<()> {
    ensure!(
        colors.len() == checked_pixel_count(width, height, 1)?,
        "Color grid has {} entries, expected {}x{}",
        colors.len(),
        width,
        height
    );

    let mut data = Vec::with_capacity(checked_pixel_count(width, height, 3)?);
    for color in colors {
        let rgb = match order {
            ColorOrder::Rgb => *color,
            ColorOrder::Bgr => [color[2], color[1], color[0]],
        };
        data.extend(rgb.iter().map(|c| to_byte(*c)));
    }
    write_png(path, &data, width, height, ColorType::Rgb8)
}
