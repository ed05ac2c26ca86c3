use std::{convert::TryFrom, f64::consts::PI};

use anyhow::{anyhow, Result};
use log::debug;
use nalgebra::Vector3;
use rayon::prelude::*;
use readers::PointBuffer;
use serde::{Deserialize, Serialize};

/// Sentinel for range, xyz and intensity of pixels that no point maps to
pub const UNSET_VALUE: f32 = -1.0;
/// Sentinel for the source index of pixels that no point maps to
pub const UNSET_INDEX: i32 = -1;

/// Guards the pitch computation against points at the sensor origin
const DEPTH_EPSILON: f64 = 1e-8;

/// Sensor model for the spherical projection. Field of view bounds are in degrees
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionParams {
    pub height: usize,
    pub width: usize,
    pub fov_up: f32,
    pub fov_down: f32,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            height: 64,
            width: 1024,
            fov_up: 3.0,
            fov_down: -25.0,
        }
    }
}

impl ProjectionParams {
    pub fn new(height: usize, width: usize, fov_up: f32, fov_down: f32) -> Result<Self> {
        let params = Self {
            height,
            width,
            fov_up,
            fov_down,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.height == 0 || self.width == 0 {
            return Err(anyhow!(
                "Range image size must be non-zero (got {}x{})",
                self.height,
                self.width
            ));
        }
        if !self.fov_up.is_finite() || !self.fov_down.is_finite() {
            return Err(anyhow!("Field of view bounds must be finite"));
        }
        if self.fov_up.abs() + self.fov_down.abs() == 0.0 {
            return Err(anyhow!("Total vertical field of view must not be zero"));
        }
        Ok(())
    }

    pub fn num_pixels(&self) -> usize {
        self.height * self.width
    }
}

/// Where a single point lands in the range image. Every point has one, including points that are occluded by
/// a nearer point in the same pixel
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointProjection {
    pub row: usize,
    pub col: usize,
    /// Euclidean distance of the point to the sensor
    pub depth: f32,
}

/// Dense `height x width` grid holding, per pixel, the attributes of the nearest point that maps to it
#[derive(Debug, Clone, PartialEq)]
pub struct RangeImage {
    height: usize,
    width: usize,
    range: Vec<f32>,
    xyz: Vec<Vector3<f32>>,
    intensity: Vec<f32>,
    index: Vec<i32>,
    mask: Vec<bool>,
}

impl RangeImage {
    /// Creates a range image with all pixels set to the sentinel values
    pub fn new(height: usize, width: usize) -> Self {
        let num_pixels = height * width;
        Self {
            height,
            width,
            range: vec![UNSET_VALUE; num_pixels],
            xyz: vec![Vector3::repeat(UNSET_VALUE); num_pixels],
            intensity: vec![UNSET_VALUE; num_pixels],
            index: vec![UNSET_INDEX; num_pixels],
            mask: vec![false; num_pixels],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn pixel(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.height && col < self.width,
            "Pixel ({}, {}) is outside of the {}x{} range image",
            row,
            col,
            self.height,
            self.width
        );
        row * self.width + col
    }

    pub fn range(&self, row: usize, col: usize) -> f32 {
        self.range[self.pixel(row, col)]
    }

    pub fn xyz(&self, row: usize, col: usize) -> &Vector3<f32> {
        &self.xyz[self.pixel(row, col)]
    }

    pub fn intensity(&self, row: usize, col: usize) -> f32 {
        self.intensity[self.pixel(row, col)]
    }

    /// Index of the point that is visible in this pixel, or `None` if the pixel is empty
    pub fn index(&self, row: usize, col: usize) -> Option<usize> {
        let index = self.index[self.pixel(row, col)];
        if index >= 0 {
            Some(index as usize)
        } else {
            None
        }
    }

    pub fn is_occupied(&self, row: usize, col: usize) -> bool {
        self.mask[self.pixel(row, col)]
    }

    /// Row-major ranges of all pixels
    pub fn ranges(&self) -> &[f32] {
        &self.range
    }

    pub fn positions(&self) -> &[Vector3<f32>] {
        &self.xyz
    }

    pub fn intensities(&self) -> &[f32] {
        &self.intensity
    }

    /// Row-major source point indices, `UNSET_INDEX` for empty pixels
    pub fn indices(&self) -> &[i32] {
        &self.index
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn occupied_pixels(&self) -> usize {
        self.mask.iter().filter(|occupied| **occupied).count()
    }

    /// Writes the point into the pixel if the pixel is empty or the point is strictly nearer than the point that
    /// currently occupies it. Returns whether the pixel was written
    fn insert_point(
        &mut self,
        projection: &PointProjection,
        point_index: usize,
        position: &Vector3<f32>,
        intensity: f32,
    ) -> bool {
        // `PointBuffer` never holds more than `MAX_POINTS`, so this only rejects indices from a foreign buffer
        let source_index = match i32::try_from(point_index) {
            Ok(index) => index,
            Err(_) => return false,
        };
        let pixel = self.pixel(projection.row, projection.col);
        if self.index[pixel] >= 0 && projection.depth >= self.range[pixel] {
            return false;
        }

        self.range[pixel] = projection.depth;
        self.xyz[pixel] = *position;
        self.intensity[pixel] = intensity;
        self.index[pixel] = source_index;
        self.mask[pixel] = true;
        true
    }
}

/// Output of projecting one scan
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub image: RangeImage,
    /// One entry per input point, in input order
    pub points: Vec<PointProjection>,
}

/// Spherical projection of point clouds into range images
#[derive(Debug, Clone)]
pub struct Projector {
    params: ProjectionParams,
    fov_up: f64,
    fov_down: f64,
    fov: f64,
}

impl Projector {
    /// Creates a projector, failing if `params` describe an empty image or a zero field of view
    pub fn new(params: ProjectionParams) -> Result<Self> {
        params.validate()?;
        let fov_up = (params.fov_up as f64).to_radians();
        let fov_down = (params.fov_down as f64).to_radians();
        Ok(Self {
            params,
            fov_up,
            fov_down,
            fov: fov_down.abs() + fov_up.abs(),
        })
    }

    pub fn params(&self) -> &ProjectionParams {
        &self.params
    }

    /// Upper bound of the vertical field of view in radians
    pub fn fov_up_radians(&self) -> f64 {
        self.fov_up
    }

    /// Lower bound of the vertical field of view in radians
    pub fn fov_down_radians(&self) -> f64 {
        self.fov_down
    }

    /// Computes the pixel of a single point. Points outside of the field of view are pinned to the image border
    pub fn project_point(&self, position: &Vector3<f32>) -> PointProjection {
        let x = position.x as f64;
        let y = position.y as f64;
        let z = position.z as f64;
        let depth = (x * x + y * y + z * z).sqrt();

        let yaw = -y.atan2(x);
        let pitch = (z / (depth + DEPTH_EPSILON)).clamp(-1.0, 1.0).asin();

        let u = 0.5 * (yaw / PI + 1.0);
        let v = 1.0 - (pitch + self.fov_down.abs()) / self.fov;

        PointProjection {
            row: Self::to_pixel(v, self.params.height),
            col: Self::to_pixel(u, self.params.width),
            depth: depth as f32,
        }
    }

    fn to_pixel(normalized: f64, size: usize) -> usize {
        let max = size.saturating_sub(1) as f64;
        (normalized * size as f64).floor().min(max).max(0.0) as usize
    }

    /// Projects all points of `points` into a fresh range image. If several points fall into the same pixel, the
    /// nearest one is kept. Among points with exactly the same depth, the one with the smallest index is kept.
    /// Points with a non-finite depth get a `PointProjection` but never occupy a pixel
    pub fn project(&self, points: &PointBuffer) -> Projection {
        let projections = points
            .positions()
            .par_iter()
            .map(|position| self.project_point(position))
            .collect::<Vec<_>>();

        let mut image = RangeImage::new(self.params.height, self.params.width);
        for (point_index, projection) in projections.iter().enumerate() {
            if !projection.depth.is_finite() {
                continue;
            }
            image.insert_point(
                projection,
                point_index,
                points.position(point_index),
                points.intensity(point_index),
            );
        }

        debug!(
            "Projected {} points into {} of {} pixels",
            points.len(),
            image.occupied_pixels(),
            self.params.num_pixels()
        );

        Projection {
            image,
            points: projections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{thread_rng, Rng};

    fn buffer(points: &[(f32, f32, f32, f32)]) -> PointBuffer {
        PointBuffer::new(
            points.iter().map(|p| Vector3::new(p.0, p.1, p.2)).collect(),
            Some(points.iter().map(|p| p.3).collect()),
        )
        .expect("Invalid test points")
    }

    fn projector(height: usize, width: usize) -> Projector {
        Projector::new(ProjectionParams {
            height,
            width,
            ..Default::default()
        })
        .expect("Invalid test params")
    }

    #[test]
    fn test_three_point_scenario() {
        let points = buffer(&[
            (1.0, 0.0, 0.0, 10.0),
            (0.0, 1.0, 0.0, 20.0),
            (2.0, 0.0, 0.0, 30.0),
        ]);
        let projection = projector(2, 4).project(&points);

        assert_eq!(projection.points[0].row, 0);
        assert_eq!(projection.points[0].col, 2);
        assert_eq!(projection.points[1].row, 0);
        assert_eq!(projection.points[1].col, 1);
        assert_eq!(projection.points[2].row, 0);
        assert_eq!(projection.points[2].col, 2);
        assert_eq!(projection.points[2].depth, 2.0);

        let image = &projection.image;
        assert_eq!(image.index(0, 2), Some(0));
        assert_eq!(image.range(0, 2), 1.0);
        assert_eq!(image.intensity(0, 2), 10.0);
        assert_eq!(image.index(0, 1), Some(1));
        assert_eq!(image.intensity(0, 1), 20.0);
        // Index 0 is a valid source index and its pixel is occupied
        assert!(image.is_occupied(0, 2));
        assert_eq!(image.occupied_pixels(), 2);
    }

    #[test]
    fn test_nearest_point_wins_regardless_of_order() {
        let near_first = buffer(&[(2.0, 0.0, 0.0, 1.0), (5.0, 0.0, 0.0, 2.0)]);
        let far_first = buffer(&[(5.0, 0.0, 0.0, 2.0), (2.0, 0.0, 0.0, 1.0)]);
        let projector = projector(64, 1024);

        let a = projector.project(&near_first);
        let b = projector.project(&far_first);
        let (row, col) = (a.points[0].row, a.points[0].col);

        assert_eq!(a.image.range(row, col), 2.0);
        assert_eq!(a.image.index(row, col), Some(0));
        assert_eq!(b.image.range(row, col), 2.0);
        assert_eq!(b.image.index(row, col), Some(1));
        assert_eq!(a.image.xyz(row, col), &Vector3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_equal_depth_keeps_smaller_index() {
        let points = buffer(&[(3.0, 0.0, 0.0, 1.0), (3.0, 0.0, 0.0, 2.0), (3.0, 0.0, 0.0, 3.0)]);
        let projection = projector(64, 1024).project(&points);
        let p = projection.points[0];
        assert_eq!(projection.image.index(p.row, p.col), Some(0));
        assert_eq!(projection.image.intensity(p.row, p.col), 1.0);
    }

    #[test]
    fn test_empty_scan_is_all_sentinel() {
        let projection = projector(4, 8).project(&PointBuffer::default());
        let image = &projection.image;

        assert!(projection.points.is_empty());
        assert_eq!(image.ranges().len(), 32);
        assert!(image.ranges().iter().all(|r| *r == UNSET_VALUE));
        assert!(image.intensities().iter().all(|i| *i == UNSET_VALUE));
        assert!(image
            .positions()
            .iter()
            .all(|p| *p == Vector3::repeat(UNSET_VALUE)));
        assert!(image.indices().iter().all(|i| *i == UNSET_INDEX));
        assert!(image.mask().iter().all(|m| !*m));
    }

    #[test]
    fn test_vertical_boundaries() {
        let height = 64;
        let projector = projector(height, 1024);

        let up = 3.0f64.to_radians();
        let top = projector.project_point(&Vector3::new(up.cos() as f32, 0.0, up.sin() as f32));
        assert_eq!(top.row, 0);

        let down = (-25.0f64).to_radians();
        let bottom =
            projector.project_point(&Vector3::new(down.cos() as f32, 0.0, down.sin() as f32));
        assert_eq!(bottom.row, height - 1);

        // Far outside of the field of view, pinned to the border instead of dropped
        assert_eq!(projector.project_point(&Vector3::new(0.0, 0.0, 10.0)).row, 0);
        assert_eq!(
            projector.project_point(&Vector3::new(0.0, 0.0, -10.0)).row,
            height - 1
        );
    }

    #[test]
    fn test_horizontal_boundaries() {
        let width = 1024;
        let projector = projector(64, width);

        // atan2(-0, -1) = -pi, so yaw = pi
        let yaw_pi = projector.project_point(&Vector3::new(-1.0, -0.0, 0.0));
        assert_eq!(yaw_pi.col, width - 1);

        // atan2(0, -1) = pi, so yaw = -pi
        let yaw_minus_pi = projector.project_point(&Vector3::new(-1.0, 0.0, 0.0));
        assert_eq!(yaw_minus_pi.col, 0);

        let forward = projector.project_point(&Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(forward.col, width / 2);
    }

    #[test]
    fn test_zero_range_point() {
        let points = buffer(&[(0.0, 0.0, 0.0, 7.0)]);
        let projection = projector(64, 1024).project(&points);
        let p = projection.points[0];
        assert_eq!(p.depth, 0.0);
        assert_eq!(projection.image.index(p.row, p.col), Some(0));
    }

    #[test]
    fn test_non_finite_points_do_not_occupy_pixels() {
        let points = buffer(&[(f32::NAN, 0.0, 0.0, 1.0), (f32::INFINITY, 1.0, 0.0, 2.0)]);
        let projection = projector(8, 16).project(&points);
        assert_eq!(projection.points.len(), 2);
        assert_eq!(projection.image.occupied_pixels(), 0);
    }

    #[test]
    fn test_projection_is_deterministic() {
        let mut rng = thread_rng();
        let points = (0..5000)
            .map(|_| {
                (
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(0.0..1.0),
                )
            })
            .collect::<Vec<_>>();
        let points = buffer(&points);
        let projector = projector(16, 64);

        let first = projector.project(&points);
        let second = projector.project(&points);
        assert_eq!(first, second);

        // Every occupied pixel holds the nearest of all points that project into it
        for (point_index, p) in first.points.iter().enumerate() {
            let visible = first
                .image
                .index(p.row, p.col)
                .expect("Pixel of a projected point must be occupied");
            let visible_depth = first.points[visible].depth;
            assert!(visible_depth <= p.depth);
            if visible_depth == p.depth {
                assert!(visible <= point_index);
            }
        }
    }

    #[test]
    fn test_params_validation() {
        assert!(ProjectionParams::new(64, 1024, 3.0, -25.0).is_ok());
        assert!(ProjectionParams::new(0, 1024, 3.0, -25.0).is_err());
        assert!(ProjectionParams::new(64, 1024, 0.0, 0.0).is_err());
        assert!(ProjectionParams::new(64, 1024, f32::NAN, -25.0).is_err());
    }

    #[test]
    fn test_projector_rejects_invalid_params() {
        let zero_fov = ProjectionParams {
            fov_up: 0.0,
            fov_down: 0.0,
            ..Default::default()
        };
        assert!(Projector::new(zero_fov).is_err());

        let empty = ProjectionParams {
            height: 0,
            ..Default::default()
        };
        assert!(Projector::new(empty).is_err());
        assert!(Projector::new(ProjectionParams::default()).is_ok());
    }

    #[test]
    fn test_insert_point_rejects_unaddressable_index() {
        let mut image = RangeImage::new(1, 1);
        let projection = PointProjection {
            row: 0,
            col: 0,
            depth: 1.0,
        };
        let position = Vector3::new(1.0, 0.0, 0.0);

        let too_large = i32::MAX as usize + 1;
        assert!(!image.insert_point(&projection, too_large, &position, 0.5));
        assert_eq!(image.index(0, 0), None);
        assert!(!image.is_occupied(0, 0));

        assert!(image.insert_point(&projection, i32::MAX as usize, &position, 0.5));
        assert_eq!(image.index(0, 0), Some(i32::MAX as usize));
    }
}
