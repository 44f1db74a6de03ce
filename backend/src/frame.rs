use anyhow::{Result, bail};
use opencv::{
    core::{Mat, MatTraitConst, Size},
    imgproc::{COLOR_BGR2GRAY, COLOR_BGRA2GRAY, cvt_color_def},
};

/// A captured image paired with its grayscale derivative.
#[derive(Debug)]
pub struct Frame {
    mat: Mat,
    grayscale: Mat,
}

impl Frame {
    /// Creates a [`Frame`] from a BGR, BGRA or single-channel `mat`.
    pub fn new(mat: Mat) -> Result<Self> {
        let grayscale = to_grayscale(&mat)?;

        Ok(Self { mat, grayscale })
    }

    /// Gets the original image.
    #[inline]
    pub fn mat(&self) -> &Mat {
        &self.mat
    }

    #[inline]
    pub fn grayscale(&self) -> &Mat {
        &self.grayscale
    }

    #[inline]
    pub fn size(&self) -> Result<Size> {
        Ok(self.grayscale.size()?)
    }
}

fn to_grayscale(mat: &impl MatTraitConst) -> Result<Mat> {
    let code = match mat.channels() {
        1 => return Ok(mat.try_clone()?),
        3 => COLOR_BGR2GRAY,
        4 => COLOR_BGRA2GRAY,
        channels => bail!("unsupported frame with {channels} channels"),
    };
    let mut grayscale = Mat::default();
    cvt_color_def(mat, &mut grayscale, code)?;

    Ok(grayscale)
}
