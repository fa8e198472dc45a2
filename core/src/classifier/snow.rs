//! Deep-snow detection over the bottom band of the frame.
//!
//! Snow on the ground yields a band that is bright and texturally flat, both
//! overall and row by row. A band dominated by green pixels is treated as
//! vegetation and never matches, whatever its flatness.

use super::pixels::{bottom_band, dominates, mean_std, ratio, Plane};
use super::{ClassifyError, ReasonCode, SnowFlatnessConfig, Stage, StageOutcome};
use crate::raster::Raster;

/// Statistics over the bottom band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandStatistics {
    pub std_dev: f64,
    pub mean_brightness: f64,
    pub flat_row_ratio: f64,
    pub green_ratio: f64,
}

/// Computes band statistics, or `None` when the band has no rows.
pub fn band_statistics(
    raster: &Raster,
    config: &SnowFlatnessConfig,
) -> Result<Option<BandStatistics>, ClassifyError> {
    let rows = bottom_band(raster.height(), config.band_fraction);
    if rows.is_empty() {
        return Ok(None);
    }

    let gray = raster.to_gray()?;
    let gray = Plane::new(&gray)?;
    let Some((mean_brightness, std_dev)) = mean_std(gray.pixels(rows.clone()).map(|p| p[0]))
    else {
        return Ok(None);
    };

    let flat_rows = rows
        .clone()
        .filter(|&y| {
            mean_std(gray.row(y).iter().copied())
                .map(|(_, row_std)| row_std < config.flat_row_std)
                .unwrap_or(false)
        })
        .count();

    let bgr = Plane::new(raster.as_mat())?;
    let mut total = 0usize;
    let mut green = 0usize;
    for pixel in bgr.pixels(rows.clone()) {
        total += 1;
        if dominates(pixel[1], [pixel[2], pixel[0]], config.green_margin) {
            green += 1;
        }
    }

    Ok(Some(BandStatistics {
        std_dev,
        mean_brightness,
        flat_row_ratio: ratio(flat_rows, rows.len()),
        green_ratio: ratio(green, total),
    }))
}

pub fn classify(
    raster: &Raster,
    config: &SnowFlatnessConfig,
) -> Result<StageOutcome, ClassifyError> {
    if !raster.is_color() {
        return Ok(StageOutcome::clear(Stage::SnowFlatness));
    }
    let Some(stats) = band_statistics(raster, config)? else {
        return Ok(StageOutcome::clear(Stage::SnowFlatness));
    };

    let snow = stats.green_ratio <= config.green_ratio_threshold
        && stats.std_dev < config.std_threshold
        && stats.flat_row_ratio > config.flat_row_ratio
        && stats.mean_brightness > config.min_brightness;

    let outcome = if snow {
        StageOutcome::matched(Stage::SnowFlatness, ReasonCode::SnowBlockage)
    } else {
        StageOutcome::clear(Stage::SnowFlatness)
    };
    Ok(outcome
        .with_metric("band_std_dev", stats.std_dev)
        .with_metric("band_mean_brightness", stats.mean_brightness)
        .with_metric("flat_row_ratio", stats.flat_row_ratio)
        .with_metric("green_ratio", stats.green_ratio))
}
