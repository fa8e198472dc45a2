//! Image decoding into 8-bit rasters.
//!
//! Every raster handed to the classifiers has 8-bit samples and either one
//! channel (grayscale) or three channels in blue, green, red order. Grayscale
//! files are kept single-channel so near-infrared captures stay detectable.

use opencv::core::{self, AlgorithmHint, Mat, Rect};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

// Keeps grayscale files single-channel and reduces deeper samples to 8-bit.
const IMREAD_FLAGS: i32 = imgcodecs::IMREAD_ANYCOLOR;

/// Decoded image owned for the duration of one classification pass.
pub struct Raster {
    mat: Mat,
}

impl Raster {
    /// Wraps an in-memory matrix, dropping alpha and rejecting other layouts.
    pub fn from_mat(mat: Mat) -> Result<Self, LoadError> {
        if mat.empty() || mat.rows() <= 0 || mat.cols() <= 0 {
            return Err(LoadError::EmptyRaster);
        }
        if mat.depth() != core::CV_8U {
            return Err(LoadError::UnsupportedLayout {
                channels: mat.channels(),
                depth: mat.depth(),
            });
        }

        let mat = match mat.channels() {
            1 | 3 => mat,
            4 => {
                let mut bgr = Mat::default();
                imgproc::cvt_color(
                    &mat,
                    &mut bgr,
                    imgproc::COLOR_BGRA2BGR,
                    0,
                    AlgorithmHint::ALGO_HINT_DEFAULT,
                )?;
                bgr
            }
            channels => {
                return Err(LoadError::UnsupportedLayout {
                    channels,
                    depth: mat.depth(),
                })
            }
        };

        let mat = if mat.is_continuous() {
            mat
        } else {
            mat.try_clone()?
        };
        Ok(Self { mat })
    }

    pub fn width(&self) -> usize {
        self.mat.cols() as usize
    }

    pub fn height(&self) -> usize {
        self.mat.rows() as usize
    }

    pub fn channels(&self) -> usize {
        self.mat.channels() as usize
    }

    pub fn is_color(&self) -> bool {
        self.channels() == 3
    }

    pub fn as_mat(&self) -> &Mat {
        &self.mat
    }

    /// Single-channel intensity copy of the raster.
    pub fn to_gray(&self) -> opencv::Result<Mat> {
        if !self.is_color() {
            return self.mat.try_clone();
        }
        let mut gray = Mat::default();
        imgproc::cvt_color(
            &self.mat,
            &mut gray,
            imgproc::COLOR_BGR2GRAY,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;
        Ok(gray)
    }

    /// Hue (0-179), saturation and value planes, interleaved.
    pub fn to_hsv(&self) -> opencv::Result<Mat> {
        let mut hsv = Mat::default();
        if self.is_color() {
            imgproc::cvt_color(
                &self.mat,
                &mut hsv,
                imgproc::COLOR_BGR2HSV,
                0,
                AlgorithmHint::ALGO_HINT_DEFAULT,
            )?;
        } else {
            let mut bgr = Mat::default();
            imgproc::cvt_color(
                &self.mat,
                &mut bgr,
                imgproc::COLOR_GRAY2BGR,
                0,
                AlgorithmHint::ALGO_HINT_DEFAULT,
            )?;
            imgproc::cvt_color(
                &bgr,
                &mut hsv,
                imgproc::COLOR_BGR2HSV,
                0,
                AlgorithmHint::ALGO_HINT_DEFAULT,
            )?;
        }
        Ok(hsv)
    }

    /// HSV copy of `region` only. Grayscale rasters go through [`Raster::to_hsv`].
    pub fn hsv_region(&self, region: Rect) -> opencv::Result<Mat> {
        if !self.is_color() {
            let hsv = self.to_hsv()?;
            return Mat::roi(&hsv, region)?.try_clone();
        }
        let patch = Mat::roi(&self.mat, region)?.try_clone()?;
        let mut hsv = Mat::default();
        imgproc::cvt_color(
            &patch,
            &mut hsv,
            imgproc::COLOR_BGR2HSV,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;
        Ok(hsv)
    }
}

/// Decodes the file at `path`.
pub fn load_raster(path: &Path) -> Result<Raster, LoadError> {
    let path_string = path
        .to_str()
        .map(|value| value.to_owned())
        .ok_or_else(|| LoadError::InvalidPath(path.to_path_buf()))?;

    let image = imgcodecs::imread(&path_string, IMREAD_FLAGS).map_err(LoadError::OpenCv)?;
    if image.empty() {
        return Err(LoadError::UnreadableImage(path.to_path_buf()));
    }
    Raster::from_mat(image)
}

/// Errors raised while turning a file into a [`Raster`].
#[derive(Debug)]
pub enum LoadError {
    InvalidPath(PathBuf),
    UnreadableImage(PathBuf),
    EmptyRaster,
    UnsupportedLayout { channels: i32, depth: i32 },
    OpenCv(opencv::Error),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath(path) => write!(
                f,
                "unable to convert path {} to UTF-8 string",
                path.display()
            ),
            Self::UnreadableImage(path) => {
                write!(f, "image at {} could not be decoded", path.display())
            }
            Self::EmptyRaster => write!(f, "raster has no pixels"),
            Self::UnsupportedLayout { channels, depth } => write!(
                f,
                "unsupported raster layout: {} channels at depth {}",
                channels, depth
            ),
            Self::OpenCv(error) => write!(f, "opencv error: {}", error),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::OpenCv(error) => Some(error),
            _ => None,
        }
    }
}

impl From<opencv::Error> for LoadError {
    fn from(error: opencv::Error) -> Self {
        Self::OpenCv(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{solid_bgr, solid_gray, write_image};
    use opencv::core::Scalar;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_color_png_as_three_channels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("color.png");
        write_image(&path, &solid_bgr(32, 48, [10, 200, 30]));

        let raster = load_raster(&path).unwrap();
        assert_eq!(raster.channels(), 3);
        assert_eq!((raster.width(), raster.height()), (48, 32));
        assert!(raster.is_color());
    }

    #[test]
    fn keeps_grayscale_png_single_channel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nir.png");
        write_image(&path, &solid_gray(16, 16, 90));

        let raster = load_raster(&path).unwrap();
        assert_eq!(raster.channels(), 1);
        assert!(!raster.is_color());
    }

    #[test]
    fn zero_byte_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        fs::write(&path, b"").unwrap();

        assert!(matches!(
            load_raster(&path),
            Err(LoadError::UnreadableImage(_))
        ));
    }

    #[test]
    fn corrupt_bytes_are_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.png");
        fs::write(&path, b"definitely not a png").unwrap();

        assert!(load_raster(&path).is_err());
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let mat = Mat::new_rows_cols_with_default(
            8,
            8,
            core::CV_8UC4,
            Scalar::from((1.0, 2.0, 3.0, 255.0)),
        )
        .unwrap();
        let raster = Raster::from_mat(mat).unwrap();
        assert_eq!(raster.channels(), 3);
    }

    #[test]
    fn sixteen_bit_matrix_is_rejected() {
        let mat =
            Mat::new_rows_cols_with_default(8, 8, core::CV_16UC1, Scalar::all(1000.0)).unwrap();
        assert!(matches!(
            Raster::from_mat(mat),
            Err(LoadError::UnsupportedLayout { channels: 1, .. })
        ));
    }

    #[test]
    fn empty_matrix_is_rejected() {
        assert!(matches!(
            Raster::from_mat(Mat::default()),
            Err(LoadError::EmptyRaster)
        ));
    }
}
