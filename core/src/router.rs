//! Directory-level quality-control pass.
//!
//! Candidate files are collected before anything moves, so relocation never
//! disturbs the walk. The quarantine subtree is pruned from the walk, which
//! makes repeated runs over the same root idempotent.

use crate::classifier::{ClassificationResult, ClassifierConfig, ImageClassifier, ReasonCode};
use crate::operations::{ensure_directory, move_into, MoveError};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use walkdir::WalkDir;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThreadingMode {
    Parallel,
    #[default]
    Sequential,
}

/// What to do with one classified image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingDecision {
    Retain,
    Relocate { reasons: Vec<ReasonCode> },
}

impl RoutingDecision {
    pub fn from_result(result: &ClassificationResult) -> Self {
        let reasons = result.reasons();
        if reasons.is_empty() {
            Self::Retain
        } else {
            Self::Relocate { reasons }
        }
    }
}

/// Final state of one candidate file after a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Retained,
    Relocated,
    /// Flagged during a dry run; left in place.
    Flagged,
    Unreadable,
    MoveFailed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub reasons: Vec<ReasonCode>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub destination: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Complete record of a run, suitable for serialisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub generated_at: String,
    pub root: PathBuf,
    pub quarantine: PathBuf,
    pub dry_run: bool,
    pub files: Vec<FileReport>,
}

impl RunSummary {
    fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|file| file.status == status).count()
    }

    /// Files that decoded and went through the classifiers.
    pub fn checked(&self) -> usize {
        self.files.len() - self.unreadable()
    }

    pub fn relocated(&self) -> usize {
        self.count(FileStatus::Relocated)
    }

    pub fn retained(&self) -> usize {
        self.count(FileStatus::Retained)
    }

    pub fn flagged(&self) -> usize {
        self.files.iter().filter(|file| !file.reasons.is_empty()).count()
    }

    pub fn unreadable(&self) -> usize {
        self.count(FileStatus::Unreadable)
    }

    pub fn move_failures(&self) -> usize {
        self.count(FileStatus::MoveFailed)
    }

    /// Files matching at least one reason, in processing order.
    pub fn flagged_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|file| !file.reasons.is_empty())
    }
}

/// Runs the enabled classifiers over a dataset and quarantines flagged files.
#[derive(Clone, Debug, Default)]
pub struct QualityControlRouter {
    classifier: ImageClassifier,
    threading: ThreadingMode,
    dry_run: bool,
}

impl QualityControlRouter {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            classifier: ImageClassifier::new(config),
            threading: ThreadingMode::default(),
            dry_run: false,
        }
    }

    pub fn with_threading(mut self, threading: ThreadingMode) -> Self {
        self.threading = threading;
        self
    }

    /// When true, classifies and logs but leaves every file in place.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        self.classifier.config()
    }

    pub fn quarantine_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.config().quarantine_dir)
    }

    /// Image files under `root`, sorted, excluding the quarantine subtree.
    pub fn collect_candidates(&self, root: &Path) -> Vec<PathBuf> {
        let quarantine = self.quarantine_dir(root);
        let mut candidates: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| entry.path() != quarantine.as_path())
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    tracing::warn!("Skipping unreadable entry: {}", error);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| self.config().accepts_extension(path))
            .collect();
        candidates.sort();
        candidates
    }

    pub fn run(&self, root: &Path, progress_bar: &ProgressBar) -> Result<RunSummary, RouterError> {
        if !root.is_dir() {
            return Err(RouterError::InvalidRoot(root.to_path_buf()));
        }
        let quarantine = self.quarantine_dir(root);
        if !self.dry_run {
            ensure_directory(&quarantine).map_err(RouterError::QuarantineUnavailable)?;
        }

        let candidates = self.collect_candidates(root);
        progress_bar.set_length(candidates.len() as u64);

        let files: Vec<FileReport> = match self.threading {
            ThreadingMode::Sequential => candidates
                .iter()
                .map(|path| {
                    let evaluation = self.evaluate(path, progress_bar);
                    self.route(evaluation, &quarantine)
                })
                .collect(),
            // Classification is independent per file; moves stay sequential so
            // destination names cannot race.
            ThreadingMode::Parallel => {
                let evaluations: Vec<Evaluation> = candidates
                    .par_iter()
                    .map(|path| self.evaluate(path, progress_bar))
                    .collect();
                evaluations
                    .into_iter()
                    .map(|evaluation| self.route(evaluation, &quarantine))
                    .collect()
            }
        };

        Ok(RunSummary {
            generated_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| String::from("unknown")),
            root: root.to_path_buf(),
            quarantine,
            dry_run: self.dry_run,
            files,
        })
    }

    fn evaluate(&self, path: &Path, progress_bar: &ProgressBar) -> Evaluation {
        progress_bar.inc(1);
        progress_bar.set_message(format!("Checking: {}", path.display()));

        let result = match self.classifier.classify_path(path) {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!("Could not read: {} ({})", path.display(), error);
                return Evaluation {
                    path: path.to_path_buf(),
                    decision: None,
                };
            }
        };

        let decision = RoutingDecision::from_result(&result);
        match &decision {
            RoutingDecision::Retain => tracing::info!("Checked image: {}", path.display()),
            RoutingDecision::Relocate { reasons } => tracing::info!(
                "Checked image: {} flagged [{}]",
                path.display(),
                join_reasons(reasons)
            ),
        }
        Evaluation {
            path: path.to_path_buf(),
            decision: Some(decision),
        }
    }

    fn route(&self, evaluation: Evaluation, quarantine: &Path) -> FileReport {
        let Evaluation { path, decision } = evaluation;
        let mut report = FileReport {
            path,
            status: FileStatus::Retained,
            reasons: Vec::new(),
            destination: None,
            error: None,
        };

        match decision {
            None => report.status = FileStatus::Unreadable,
            Some(RoutingDecision::Retain) => {}
            Some(RoutingDecision::Relocate { reasons }) => {
                report.reasons = reasons;
                if self.dry_run {
                    report.status = FileStatus::Flagged;
                    return report;
                }
                match move_into(&report.path, quarantine) {
                    Ok(destination) => {
                        tracing::info!(
                            "Moved {} -> {}",
                            report.path.display(),
                            destination.display()
                        );
                        report.status = FileStatus::Relocated;
                        report.destination = Some(destination);
                    }
                    Err(error) => {
                        tracing::warn!("Could not move {}: {}", report.path.display(), error);
                        report.status = FileStatus::MoveFailed;
                        report.error = Some(error.to_string());
                    }
                }
            }
        }
        report
    }
}

struct Evaluation {
    path: PathBuf,
    /// `None` when the file could not be decoded.
    decision: Option<RoutingDecision>,
}

pub fn join_reasons(reasons: &[ReasonCode]) -> String {
    reasons
        .iter()
        .map(|reason| reason.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Conditions that abort a run before any file is processed.
#[derive(Debug)]
pub enum RouterError {
    InvalidRoot(PathBuf),
    QuarantineUnavailable(MoveError),
}

impl Display for RouterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRoot(path) => write!(f, "{} is not a directory", path.display()),
            Self::QuarantineUnavailable(error) => {
                write!(f, "cannot create quarantine directory: {}", error)
            }
        }
    }
}

impl Error for RouterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::QuarantineUnavailable(error) => Some(error),
            Self::InvalidRoot(_) => None,
        }
    }
}
