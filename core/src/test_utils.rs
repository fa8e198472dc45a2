//! Synthetic image builders shared by the unit tests.

use crate::raster::Raster;
use opencv::core::{self, Mat, Rect, Scalar, Vector};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;
use std::path::Path;

fn bgr_scalar(color: [u8; 3]) -> Scalar {
    Scalar::from((color[0] as f64, color[1] as f64, color[2] as f64, 0.0))
}

pub fn solid_bgr(rows: i32, cols: i32, color: [u8; 3]) -> Mat {
    Mat::new_rows_cols_with_default(rows, cols, core::CV_8UC3, bgr_scalar(color)).unwrap()
}

pub fn solid_gray(rows: i32, cols: i32, value: u8) -> Mat {
    Mat::new_rows_cols_with_default(rows, cols, core::CV_8UC1, Scalar::all(value as f64)).unwrap()
}

/// Paints rows `start..end` (all columns) with `color`.
pub fn fill_rows(image: &mut Mat, start: i32, end: i32, color: [u8; 3]) {
    let rect = Rect::new(0, start, image.cols(), end - start);
    imgproc::rectangle(
        image,
        rect,
        bgr_scalar(color),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )
    .unwrap();
}

/// Alternating square cells of `first` and `second`.
pub fn checkerboard(rows: i32, cols: i32, cell: i32, first: [u8; 3], second: [u8; 3]) -> Mat {
    let mut image = solid_bgr(rows, cols, first);
    for y in (0..rows).step_by(cell as usize) {
        for x in (0..cols).step_by(cell as usize) {
            if ((x / cell) + (y / cell)) % 2 == 1 {
                let rect = Rect::new(x, y, cell, cell);
                imgproc::rectangle(
                    &mut image,
                    rect,
                    bgr_scalar(second),
                    imgproc::FILLED,
                    imgproc::LINE_8,
                    0,
                )
                .unwrap();
            }
        }
    }
    image
}

/// A sharp, saturated scene that no stage flags under default thresholds.
pub fn vegetated_scene() -> Mat {
    checkerboard(64, 64, 8, [0, 0, 255], [0, 255, 0])
}

pub fn raster(mat: Mat) -> Raster {
    Raster::from_mat(mat).unwrap()
}

pub fn write_image(path: &Path, image: &Mat) {
    let params = Vector::<i32>::new();
    imgcodecs::imwrite(path.to_string_lossy().as_ref(), image, &params).unwrap();
}
