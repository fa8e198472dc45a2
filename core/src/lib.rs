//! Quality-control triage engine for camera-trap imagery.
//!
//! The crate decodes images into [`Raster`]s, runs a fixed set of heuristic
//! classifiers over them and moves flagged files into a quarantine directory
//! under the dataset root. Run results are plain data (`RunSummary`,
//! `FileReport`) that serialise for downstream consumers.

pub mod classifier;
pub mod operations;
pub mod progress;
pub mod raster;
pub mod reporting;
pub mod router;

#[cfg(test)]
mod test_utils;

pub use classifier::{
    ClassificationResult, ClassifierConfig, ConfigError, ImageClassifier, ReasonCode, Stage,
    StageOutcome,
};
pub use operations::{ensure_directory, move_into, MoveError};
pub use raster::{load_raster, LoadError, Raster};
pub use reporting::{
    format_inspection, print_inspection, print_summary, write_json, ReportingError,
};
pub use router::{
    FileReport, FileStatus, QualityControlRouter, RouterError, RoutingDecision, RunSummary,
    ThreadingMode,
};
