use anyhow::{Context, Result, bail};
use backend::{Capture, Frame};
use log::{debug, info};
use opencv::{
    core::{Mat, MatTraitConst, flip},
    videoio::{
        CAP_ANY, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH, VideoCapture, VideoCaptureTrait,
        VideoCaptureTraitConst,
    },
};

/// A live camera producing [`Frame`]s.
pub struct Camera {
    capture: VideoCapture,
    flip_horizontal: bool,
}

impl Camera {
    /// Opens the camera and discards the warm-up frames.
    pub fn open(settings: &Capture) -> Result<Self> {
        let mut capture = VideoCapture::new(settings.camera_index, CAP_ANY)
            .with_context(|| format!("failed to open camera {}", settings.camera_index))?;
        if !capture.is_opened()? {
            bail!("camera {} is not available", settings.camera_index);
        }
        if let Some(width) = settings.width {
            capture.set(CAP_PROP_FRAME_WIDTH, width as f64)?;
        }
        if let Some(height) = settings.height {
            capture.set(CAP_PROP_FRAME_HEIGHT, height as f64)?;
        }

        let mut camera = Self {
            capture,
            flip_horizontal: settings.flip_horizontal,
        };
        for _ in 0..settings.warmup_frames {
            camera.read_mat()?;
        }
        debug!(target: "capture", "discarded {} warm-up frames", settings.warmup_frames);
        info!(
            target: "capture",
            "camera {} opened at {}x{}",
            settings.camera_index,
            camera.capture.get(CAP_PROP_FRAME_WIDTH)?,
            camera.capture.get(CAP_PROP_FRAME_HEIGHT)?
        );

        Ok(camera)
    }

    /// Grabs the next frame, mirrored when configured.
    ///
    /// Returns [`None`] once the camera stops producing frames.
    pub fn read(&mut self) -> Result<Option<Frame>> {
        let Some(mat) = self.read_mat()? else {
            return Ok(None);
        };
        let mat = if self.flip_horizontal {
            let mut flipped = Mat::default();
            flip(&mat, &mut flipped, 1)?;
            flipped
        } else {
            mat
        };

        Frame::new(mat).map(Some)
    }

    fn read_mat(&mut self) -> Result<Option<Mat>> {
        let mut mat = Mat::default();
        if !self.capture.read(&mut mat)? || mat.empty() {
            return Ok(None);
        }

        Ok(Some(mat))
    }
}
