use crate::classifier::ClassificationResult;
use crate::router::{join_reasons, FileStatus, RunSummary};
use std::error::Error;
use std::fmt::{Display, Formatter, Write};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug)]
pub enum ReportingError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl Display for ReportingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "io error: {}", error),
            Self::Serialization(error) => write!(f, "serialization error: {}", error),
        }
    }
}

impl Error for ReportingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            Self::Serialization(error) => Some(error),
        }
    }
}

pub fn print_summary(summary: &RunSummary) {
    let flagged: Vec<_> = summary.flagged_files().collect();
    if !flagged.is_empty() {
        if summary.dry_run {
            println!("Flagged files (dry run, nothing moved):");
        } else {
            println!("Quality-control files:");
        }
        for file in flagged {
            let location = match (&file.destination, file.status) {
                (Some(destination), _) => format!(" -> {}", destination.display()),
                (None, FileStatus::MoveFailed) => String::from(" (move failed)"),
                (None, _) => String::new(),
            };
            println!(
                "  {} [{}]{}",
                file.path.display(),
                join_reasons(&file.reasons),
                location
            );
        }
        println!();
    }

    println!("Checked:    {}", summary.checked());
    println!("Retained:   {}", summary.retained());
    println!("Relocated:  {}", summary.relocated());
    println!("Unreadable: {}", summary.unreadable());
    if summary.move_failures() > 0 {
        println!("Failed:     {}", summary.move_failures());
    }
}

/// Prints every stage outcome and its metrics for one image.
pub fn print_inspection(path: &Path, result: &ClassificationResult) {
    print!("{}", format_inspection(path, result));
}

pub fn format_inspection(path: &Path, result: &ClassificationResult) -> String {
    let mut text = format!("{}\n", path.display());
    for outcome in &result.outcomes {
        let verdict = match (&outcome.reason, &outcome.error) {
            (Some(reason), _) => reason.as_str().to_string(),
            (None, Some(error)) => format!("error: {}", error),
            (None, None) => String::from("clear"),
        };
        // Writing to a String cannot fail.
        let _ = writeln!(text, "  {:<15} {}", outcome.stage.name(), verdict);
        for metric in &outcome.metrics {
            let _ = writeln!(text, "    {:<30} {:.4}", metric.name, metric.value);
        }
    }
    text
}

pub fn write_json(summary: &RunSummary, output_path: &Path) -> Result<(), ReportingError> {
    let file = File::create(output_path).map_err(ReportingError::Io)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, summary).map_err(ReportingError::Serialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ReasonCode, Stage, StageOutcome};
    use crate::router::FileReport;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn summary() -> RunSummary {
        RunSummary {
            generated_at: String::from("2024-03-01T08:00:00Z"),
            root: PathBuf::from("/data/traps"),
            quarantine: PathBuf::from("/data/traps/Quality_Control"),
            dry_run: false,
            files: vec![
                FileReport {
                    path: PathBuf::from("/data/traps/a.jpg"),
                    status: FileStatus::Relocated,
                    reasons: vec![ReasonCode::Blur],
                    destination: Some(PathBuf::from("/data/traps/Quality_Control/a.jpg")),
                    error: None,
                },
                FileReport {
                    path: PathBuf::from("/data/traps/b.jpg"),
                    status: FileStatus::Retained,
                    reasons: Vec::new(),
                    destination: None,
                    error: None,
                },
            ],
        }
    }

    #[test]
    fn write_json_serializes_reports() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report.json");
        write_json(&summary(), &output).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        let files = value["files"].as_array().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["status"], "relocated");
        assert_eq!(files[0]["reasons"][0], "blur");
        assert!(files[1].get("reasons").is_none());
        assert!(files[1].get("destination").is_none());
        assert_eq!(value["dry_run"], false);
    }

    #[test]
    fn written_report_reads_back() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report.json");
        let original = summary();
        write_json(&original, &output).unwrap();

        let parsed: RunSummary =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn inspection_shows_verdicts_metrics_and_errors() {
        let result = ClassificationResult {
            outcomes: vec![
                StageOutcome::matched(Stage::Sharpness, ReasonCode::Blur)
                    .with_metric("laplacian_variance", 12.5),
                StageOutcome::clear(Stage::SnowFlatness),
                StageOutcome {
                    error: Some(String::from("opencv error: conversion failed")),
                    ..StageOutcome::clear(Stage::BlueDominance)
                },
            ],
        };
        let text = format_inspection(Path::new("site/IMG_0007.JPG"), &result);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "site/IMG_0007.JPG");
        assert!(lines[1].starts_with("  sharpness") && lines[1].ends_with("blur"));
        assert!(lines[2].contains("laplacian_variance") && lines[2].ends_with("12.5000"));
        assert!(lines[3].ends_with("clear"));
        assert!(lines[4].ends_with("error: opencv error: conversion failed"));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn write_json_reports_missing_directory() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("missing").join("report.json");
        assert!(matches!(
            write_json(&summary(), &output),
            Err(ReportingError::Io(_))
        ));
    }
}
