//! Blur detection via the variance of the Laplacian.

use super::{ClassifyError, ReasonCode, SharpnessConfig, Stage, StageOutcome};
use crate::raster::Raster;
use opencv::core::{self, Mat, Scalar};
use opencv::imgproc;

/// Population variance of the 3x3 Laplacian response over the grayscale image.
pub fn laplacian_variance(raster: &Raster) -> Result<f64, ClassifyError> {
    let gray = raster.to_gray()?;
    let mut laplacian = Mat::default();
    imgproc::laplacian(
        &gray,
        &mut laplacian,
        core::CV_64F,
        1,
        1.0,
        0.0,
        core::BORDER_DEFAULT,
    )?;

    let mut mean = Scalar::default();
    let mut stddev = Scalar::default();
    core::mean_std_dev(&laplacian, &mut mean, &mut stddev, &Mat::default())?;
    Ok(stddev[0] * stddev[0])
}

pub fn classify(
    raster: &Raster,
    config: &SharpnessConfig,
) -> Result<StageOutcome, ClassifyError> {
    let variance = laplacian_variance(raster)?;
    let outcome = if variance < config.variance_threshold {
        StageOutcome::matched(Stage::Sharpness, ReasonCode::Blur)
    } else {
        StageOutcome::clear(Stage::Sharpness)
    };
    Ok(outcome.with_metric("laplacian_variance", variance))
}
