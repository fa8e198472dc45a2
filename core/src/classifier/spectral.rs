//! Near-infrared detection.
//!
//! NIR captures are desaturated everywhere, so one row through the image
//! centre is enough: a single pixel above the saturation threshold marks the
//! image as visible-color.

use super::pixels::Plane;
use super::{ClassifyError, ReasonCode, SpectralConfig, Stage, StageOutcome};
use crate::raster::Raster;
use opencv::core::Rect;
use std::ops::Range;

/// Column span of the centre strip, clamped to the image width.
pub fn strip_columns(width: usize, strip_width: usize) -> Range<usize> {
    let start = width.saturating_sub(strip_width) / 2;
    let end = width.min(start + strip_width);
    start..end
}

pub fn classify(raster: &Raster, config: &SpectralConfig) -> Result<StageOutcome, ClassifyError> {
    if !raster.is_color() {
        return Ok(StageOutcome::matched(Stage::Spectral, ReasonCode::NirGrayscale));
    }

    let columns = strip_columns(raster.width(), config.strip_width);
    let strip = Rect::new(
        columns.start as i32,
        (raster.height() / 2) as i32,
        columns.len() as i32,
        1,
    );
    let hsv = raster.hsv_region(strip)?;
    let plane = Plane::new(&hsv)?;

    let max_saturation = plane
        .pixels(0..plane.height())
        .map(|pixel| pixel[1])
        .max()
        .unwrap_or(0);

    let outcome = if max_saturation > config.saturation_threshold {
        StageOutcome::clear(Stage::Spectral)
    } else {
        StageOutcome::matched(Stage::Spectral, ReasonCode::NirLowSaturation)
    };
    Ok(outcome.with_metric("max_strip_saturation", max_saturation as f64))
}
