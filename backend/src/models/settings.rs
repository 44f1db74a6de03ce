use serde::{Deserialize, Serialize};

use super::deserialize_with_ok_or_default;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, deserialize_with = "deserialize_with_ok_or_default")]
    pub detection: Detection,
    #[serde(default, deserialize_with = "deserialize_with_ok_or_default")]
    pub optical_flow: OpticalFlow,
    /// Fraction of the seeded points that must still be followed before re-seeding.
    #[serde(default = "reload_threshold_default")]
    pub reload_threshold: f32,
    #[serde(default, deserialize_with = "deserialize_with_ok_or_default")]
    pub capture: Capture,
    #[serde(default, deserialize_with = "deserialize_with_ok_or_default")]
    pub overlay: Overlay,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            detection: Detection::default(),
            optical_flow: OpticalFlow::default(),
            reload_threshold: reload_threshold_default(),
            capture: Capture::default(),
            overlay: Overlay::default(),
        }
    }
}

fn reload_threshold_default() -> f32 {
    0.5
}

/// Parameters for seeding points inside a region.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default = "max_points_default")]
    pub max_points: i32,
    #[serde(default = "quality_level_default")]
    pub quality_level: f64,
    #[serde(default = "min_distance_default")]
    pub min_distance: f64,
    #[serde(default = "block_size_default")]
    pub block_size: i32,
}

impl Default for Detection {
    fn default() -> Self {
        Self {
            max_points: max_points_default(),
            quality_level: quality_level_default(),
            min_distance: min_distance_default(),
            block_size: block_size_default(),
        }
    }
}

fn max_points_default() -> i32 {
    100
}

fn quality_level_default() -> f64 {
    0.1
}

fn min_distance_default() -> f64 {
    7.0
}

fn block_size_default() -> i32 {
    7
}

/// Parameters for pyramidal Lucas-Kanade point following.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpticalFlow {
    #[serde(default = "window_size_default")]
    pub window_size: i32,
    #[serde(default = "max_level_default")]
    pub max_level: i32,
    #[serde(default = "max_iterations_default")]
    pub max_iterations: i32,
    #[serde(default = "epsilon_default")]
    pub epsilon: f64,
    #[serde(default = "min_eigen_threshold_default")]
    pub min_eigen_threshold: f64,
}

impl Default for OpticalFlow {
    fn default() -> Self {
        Self {
            window_size: window_size_default(),
            max_level: max_level_default(),
            max_iterations: max_iterations_default(),
            epsilon: epsilon_default(),
            min_eigen_threshold: min_eigen_threshold_default(),
        }
    }
}

fn window_size_default() -> i32 {
    15
}

fn max_level_default() -> i32 {
    2
}

fn max_iterations_default() -> i32 {
    10
}

fn epsilon_default() -> f64 {
    0.03
}

fn min_eigen_threshold_default() -> f64 {
    1e-4
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    #[serde(default)]
    pub camera_index: i32,
    /// Frames discarded after opening the camera. The first few are usually black.
    #[serde(default = "warmup_frames_default")]
    pub warmup_frames: u32,
    #[serde(default = "flip_horizontal_default")]
    pub flip_horizontal: bool,
    /// Requested frame width, the camera may pick another one.
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            camera_index: 0,
            warmup_frames: warmup_frames_default(),
            flip_horizontal: flip_horizontal_default(),
            width: None,
            height: None,
        }
    }
}

fn warmup_frames_default() -> u32 {
    10
}

fn flip_horizontal_default() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    #[serde(default = "point_radius_default")]
    pub point_radius: i32,
    #[serde(default = "wait_key_millis_default")]
    pub wait_key_millis: i32,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            point_radius: point_radius_default(),
            wait_key_millis: wait_key_millis_default(),
        }
    }
}

fn point_radius_default() -> i32 {
    5
}

fn wait_key_millis_default() -> i32 {
    10
}
