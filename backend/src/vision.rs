use std::fmt::Debug;

use anyhow::{Result, bail};
#[cfg(test)]
use mockall::automock;
use opencv::{
    core::{
        Mat, MatTraitConst, Point2f, Size, TermCriteria, TermCriteria_COUNT, TermCriteria_EPS,
        Vector,
    },
    imgproc::good_features_to_track,
    video::calc_optical_flow_pyr_lk,
};

use crate::models::{Detection, OpticalFlow};

/// The vision primitives consumed by the tracker.
#[cfg_attr(test, automock)]
pub trait Vision: Debug {
    /// Detects up to `max_points` salient points inside the non-zero pixels of `mask`.
    ///
    /// Points are ranked by quality and no two are closer than `min_distance`. The result may
    /// be empty.
    fn detect_points(
        &self,
        grayscale: &Mat,
        mask: &Mat,
        max_points: i32,
        quality_level: f64,
        min_distance: f64,
    ) -> Result<Vec<Point2f>>;

    /// Follows `points` from `prev` to `next`.
    ///
    /// Returns one position and one success flag per input point, in the same order as
    /// `points`.
    fn track_points(
        &self,
        prev: &Mat,
        next: &Mat,
        points: &[Point2f],
    ) -> Result<(Vec<Point2f>, Vec<bool>)>;
}

/// [`Vision`] backed by OpenCV corner detection and pyramidal Lucas-Kanade.
#[derive(Debug)]
pub struct DefaultVision {
    block_size: i32,
    window_size: Size,
    max_level: i32,
    criteria: TermCriteria,
    min_eigen_threshold: f64,
}

impl DefaultVision {
    pub fn new(detection: &Detection, optical_flow: &OpticalFlow) -> Result<Self> {
        if optical_flow.window_size <= 0 {
            bail!("invalid optical flow window size {}", optical_flow.window_size);
        }
        let criteria = TermCriteria::new(
            TermCriteria_COUNT + TermCriteria_EPS,
            optical_flow.max_iterations,
            optical_flow.epsilon,
        )?;

        Ok(Self {
            block_size: detection.block_size,
            window_size: Size::new(optical_flow.window_size, optical_flow.window_size),
            max_level: optical_flow.max_level,
            criteria,
            min_eigen_threshold: optical_flow.min_eigen_threshold,
        })
    }
}

impl Vision for DefaultVision {
    fn detect_points(
        &self,
        grayscale: &Mat,
        mask: &Mat,
        max_points: i32,
        quality_level: f64,
        min_distance: f64,
    ) -> Result<Vec<Point2f>> {
        let mut corners = Vector::<Point2f>::new();
        good_features_to_track(
            grayscale,
            &mut corners,
            max_points,
            quality_level,
            min_distance,
            mask,
            self.block_size,
            false,
            0.04,
        )?;

        Ok(corners.to_vec())
    }

    fn track_points(
        &self,
        prev: &Mat,
        next: &Mat,
        points: &[Point2f],
    ) -> Result<(Vec<Point2f>, Vec<bool>)> {
        if points.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        if prev.size()? != next.size()? {
            bail!("cannot track points between frames of different sizes");
        }

        let prev_points = Vector::<Point2f>::from_slice(points);
        let mut next_points = Vector::<Point2f>::new();
        let mut status = Vector::<u8>::new();
        let mut errors = Vector::<f32>::new();
        calc_optical_flow_pyr_lk(
            prev,
            next,
            &prev_points,
            &mut next_points,
            &mut status,
            &mut errors,
            self.window_size,
            self.max_level,
            self.criteria,
            0,
            self.min_eigen_threshold,
        )?;
        if next_points.len() != points.len() || status.len() != points.len() {
            bail!(
                "optical flow returned {} points and {} flags for {} inputs",
                next_points.len(),
                status.len(),
                points.len()
            );
        }

        Ok((
            next_points.to_vec(),
            status.into_iter().map(|flag| flag == 1).collect(),
        ))
    }
}
