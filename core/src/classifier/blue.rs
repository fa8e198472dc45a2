//! Snow detection through blue-dominant pixels in the lower frame.
//!
//! Camera white balance tends to push snow towards blue. A blue lower half
//! only counts as snow when the upper half is not clearly vegetated.

use super::pixels::{bottom_band, dominates, ratio, top_band, Plane};
use super::{BlueDominanceConfig, ClassifyError, ReasonCode, Stage, StageOutcome};
use crate::raster::Raster;

pub fn classify(
    raster: &Raster,
    config: &BlueDominanceConfig,
) -> Result<StageOutcome, ClassifyError> {
    if !raster.is_color() {
        return Ok(StageOutcome::clear(Stage::BlueDominance));
    }

    let bgr = Plane::new(raster.as_mat())?;
    let bottom = bottom_band(raster.height(), config.band_fraction);
    let mut total = 0usize;
    let mut blue = 0usize;
    for pixel in bgr.pixels(bottom) {
        total += 1;
        if dominates(pixel[0], [pixel[2], pixel[1]], config.blue_margin) {
            blue += 1;
        }
    }

    let blue_ratio = ratio(blue, total);
    let outcome =
        StageOutcome::clear(Stage::BlueDominance).with_metric("blue_ratio", blue_ratio);
    if blue_ratio <= config.blue_ratio_threshold {
        return Ok(outcome);
    }

    let hsv = raster.to_hsv()?;
    let hsv = Plane::new(&hsv)?;
    let hue_range = config.green_hue_min..=config.green_hue_max;
    let mut top_total = 0usize;
    let mut green = 0usize;
    for pixel in hsv.pixels(top_band(raster.height(), config.band_fraction)) {
        top_total += 1;
        if hue_range.contains(&pixel[0]) && pixel[1] > config.green_min_saturation {
            green += 1;
        }
    }

    let green_ratio = ratio(green, top_total);
    let mut outcome = outcome.with_metric("green_top_ratio", green_ratio);
    if green_ratio <= config.green_top_threshold {
        outcome.reason = Some(ReasonCode::BlueSnow);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fill_rows, raster, solid_bgr, solid_gray};

    fn split_scene(top: [u8; 3], bottom: [u8; 3]) -> Raster {
        let mut image = solid_bgr(60, 40, top);
        fill_rows(&mut image, 30, 60, bottom);
        raster(image)
    }

    #[test]
    fn green_top_overrides_blue_bottom() {
        let outcome = classify(
            &split_scene([0, 255, 0], [255, 0, 0]),
            &BlueDominanceConfig::default(),
        )
        .unwrap();
        assert!(!outcome.is_match());
        assert_eq!(outcome.metric("blue_ratio"), Some(1.0));
        assert_eq!(outcome.metric("green_top_ratio"), Some(1.0));
    }

    #[test]
    fn blue_throughout_is_snow() {
        let outcome = classify(
            &split_scene([255, 0, 0], [255, 0, 0]),
            &BlueDominanceConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome.reason, Some(ReasonCode::BlueSnow));
        assert_eq!(outcome.metric("green_top_ratio"), Some(0.0));
    }

    #[test]
    fn neutral_bottom_stops_early() {
        let outcome = classify(
            &split_scene([255, 0, 0], [200, 200, 200]),
            &BlueDominanceConfig::default(),
        )
        .unwrap();
        assert!(!outcome.is_match());
        assert!(outcome.metric("green_top_ratio").is_none());
    }

    #[test]
    fn blue_share_must_exceed_threshold() {
        // Exactly 40% of the bottom half is blue.
        let mut image = solid_bgr(60, 40, [200, 200, 200]);
        fill_rows(&mut image, 30, 42, [255, 0, 0]);
        let outcome = classify(&raster(image), &BlueDominanceConfig::default()).unwrap();
        assert_eq!(outcome.metric("blue_ratio"), Some(0.4));
        assert!(!outcome.is_match());
    }

    #[test]
    fn pale_green_top_does_not_override() {
        // Green hue but saturation below the floor.
        let outcome = classify(
            &split_scene([120, 130, 120], [255, 0, 0]),
            &BlueDominanceConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome.reason, Some(ReasonCode::BlueSnow));
    }

    #[test]
    fn single_row_image_has_empty_top_band() {
        let outcome =
            classify(&raster(solid_bgr(1, 10, [255, 0, 0])), &BlueDominanceConfig::default())
                .unwrap();
        assert_eq!(outcome.metric("green_top_ratio"), Some(0.0));
        assert_eq!(outcome.reason, Some(ReasonCode::BlueSnow));
    }

    #[test]
    fn grayscale_raster_is_not_evaluated() {
        let outcome =
            classify(&raster(solid_gray(10, 10, 255)), &BlueDominanceConfig::default()).unwrap();
        assert!(!outcome.is_match());
    }
}
