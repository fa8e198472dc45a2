//! Row-band views and counting helpers over interleaved 8-bit planes.

use super::ClassifyError;
use opencv::core::Mat;
use opencv::prelude::*;
use std::ops::Range;
use std::slice::ChunksExact;

/// Borrowed view over a continuous interleaved matrix.
pub(crate) struct Plane<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    channels: usize,
}

impl<'a> Plane<'a> {
    pub(crate) fn new(mat: &'a Mat) -> Result<Self, ClassifyError> {
        let data = mat.data_bytes()?;
        Ok(Self {
            data,
            width: mat.cols() as usize,
            height: mat.rows() as usize,
            channels: mat.channels() as usize,
        })
    }

    pub(crate) fn width(&self) -> usize {
        self.width
    }

    pub(crate) fn height(&self) -> usize {
        self.height
    }

    fn stride(&self) -> usize {
        self.width * self.channels
    }

    /// Samples of row `y`, all channels interleaved.
    pub(crate) fn row(&self, y: usize) -> &'a [u8] {
        let stride = self.stride();
        &self.data[y * stride..(y + 1) * stride]
    }

    /// Per-pixel channel tuples over the given rows.
    pub(crate) fn pixels(&self, rows: Range<usize>) -> ChunksExact<'a, u8> {
        let stride = self.stride();
        let end = rows.end.min(self.height);
        let start = rows.start.min(end);
        self.data[start * stride..end * stride].chunks_exact(self.channels)
    }
}

/// Rows from `trunc(height * (1 - fraction))` down to the last row.
pub(crate) fn bottom_band(height: usize, fraction: f64) -> Range<usize> {
    let start = (height as f64 * (1.0 - fraction)) as usize;
    start.min(height)..height
}

/// Rows from the top edge down to `trunc(height * fraction)`.
pub(crate) fn top_band(height: usize, fraction: f64) -> Range<usize> {
    let end = (height as f64 * fraction) as usize;
    0..end.min(height)
}

/// `count / total`, or zero for an empty denominator.
pub(crate) fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// True when `value` exceeds both `others` by more than `margin`.
pub(crate) fn dominates(value: u8, others: [u8; 2], margin: i32) -> bool {
    let value = value as i32;
    others.iter().all(|&other| value > other as i32 + margin)
}

/// Population mean and standard deviation; `None` for no samples.
pub(crate) fn mean_std<I>(values: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = u8>,
{
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for value in values {
        let value = value as f64;
        count += 1;
        sum += value;
        sum_sq += value * value;
    }
    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
    Some((mean, variance.sqrt()))
}
