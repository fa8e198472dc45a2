//! Global desaturation check, disabled by default.
//!
//! Matches scenes that are mostly gray (darkness, heavy snow, dormant
//! vegetation) unless the gray regions are themselves mostly green foliage.

use super::pixels::{ratio, Plane};
use super::{ClassifyError, ReasonCode, SaturationConfig, Stage, StageOutcome};
use crate::raster::Raster;

pub fn classify(
    raster: &Raster,
    config: &SaturationConfig,
) -> Result<StageOutcome, ClassifyError> {
    if !raster.is_color() {
        return Ok(StageOutcome::clear(Stage::Saturation));
    }

    let hsv = raster.to_hsv()?;
    let hsv = Plane::new(&hsv)?;
    let hue_range = config.green_hue_min..=config.green_hue_max;

    let mut total = 0usize;
    let mut low_saturation = 0usize;
    let mut green_low_saturation = 0usize;
    for pixel in hsv.pixels(0..hsv.height()) {
        total += 1;
        if pixel[1] < config.saturation_threshold {
            low_saturation += 1;
            if hue_range.contains(&pixel[0]) {
                green_low_saturation += 1;
            }
        }
    }

    let low_ratio = ratio(low_saturation, total);
    let outcome =
        StageOutcome::clear(Stage::Saturation).with_metric("low_saturation_ratio", low_ratio);
    if low_ratio < config.low_sat_ratio_threshold || low_saturation == 0 {
        return Ok(outcome);
    }

    let green_ratio = ratio(green_low_saturation, low_saturation);
    let mut outcome = outcome.with_metric("green_in_low_saturation_ratio", green_ratio);
    if green_ratio < config.green_allowance {
        outcome.reason = Some(ReasonCode::LowSaturation);
    }
    Ok(outcome)
}
