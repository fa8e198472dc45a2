//! Heuristic image quality-control stages.
//!
//! Each stage is an independent statistical predicate over one [`Raster`]:
//!
//! - [`spectral`]: near-infrared captures (grayscale or desaturated)
//! - [`sharpness`]: blur via the variance of the Laplacian
//! - [`snow`]: deep snow through a flat, bright ground band
//! - [`saturation`]: globally desaturated scenes without green cover
//! - [`blue`]: snow under a blue white-balance cast
//!
//! Stages never short-circuit each other. [`ImageClassifier`] runs every
//! enabled stage and keeps all matched reasons, so a single image can be
//! flagged for several causes at once.

pub mod blue;
mod config;
pub(crate) mod pixels;
pub mod saturation;
pub mod sharpness;
pub mod snow;
pub mod spectral;

pub use config::{
    default_extensions, BlueDominanceConfig, ClassifierConfig, ConfigError, SaturationConfig,
    SharpnessConfig, SnowFlatnessConfig, SpectralConfig, DEFAULT_CONFIG_FILE,
    DEFAULT_QUARANTINE_DIR,
};

use crate::raster::{load_raster, LoadError, Raster};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Why an image was routed out of the usable dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    NirGrayscale,
    NirLowSaturation,
    Blur,
    SnowBlockage,
    LowSaturation,
    BlueSnow,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NirGrayscale => "nir_grayscale",
            Self::NirLowSaturation => "nir_low_saturation",
            Self::Blur => "blur",
            Self::SnowBlockage => "snow_blockage",
            Self::LowSaturation => "low_saturation",
            Self::BlueSnow => "blue_snow",
        }
    }
}

impl Display for ReasonCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classifier stage. Declaration order is evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Spectral,
    Sharpness,
    SnowFlatness,
    Saturation,
    BlueDominance,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Spectral,
        Stage::Sharpness,
        Stage::SnowFlatness,
        Stage::Saturation,
        Stage::BlueDominance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Spectral => "spectral",
            Self::Sharpness => "sharpness",
            Self::SnowFlatness => "snow_flatness",
            Self::Saturation => "saturation",
            Self::BlueDominance => "blue_dominance",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|stage| stage.name() == normalized)
    }

    /// Runs this stage's predicate with its section of `config`.
    pub fn evaluate(
        self,
        raster: &Raster,
        config: &ClassifierConfig,
    ) -> Result<StageOutcome, ClassifyError> {
        match self {
            Self::Spectral => spectral::classify(raster, &config.spectral),
            Self::Sharpness => sharpness::classify(raster, &config.sharpness),
            Self::SnowFlatness => snow::classify(raster, &config.snow_flatness),
            Self::Saturation => saturation::classify(raster, &config.saturation),
            Self::BlueDominance => blue::classify(raster, &config.blue_dominance),
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A named statistic a stage computed on its way to a verdict.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Metric {
    pub name: &'static str,
    pub value: f64,
}

/// Verdict of a single stage for a single raster.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    /// The matched reason, if any.
    pub reason: Option<ReasonCode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
    /// Set when the stage could not evaluate and defaulted to no match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageOutcome {
    pub fn clear(stage: Stage) -> Self {
        Self {
            stage,
            reason: None,
            metrics: Vec::new(),
            error: None,
        }
    }

    pub fn matched(stage: Stage, reason: ReasonCode) -> Self {
        Self {
            reason: Some(reason),
            ..Self::clear(stage)
        }
    }

    fn failed(stage: Stage, error: &ClassifyError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::clear(stage)
        }
    }

    pub fn with_metric(mut self, name: &'static str, value: f64) -> Self {
        self.metrics.push(Metric { name, value });
        self
    }

    pub fn is_match(&self) -> bool {
        self.reason.is_some()
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|metric| metric.name == name)
            .map(|metric| metric.value)
    }
}

/// Outcomes of every evaluated stage for one raster, in evaluation order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub outcomes: Vec<StageOutcome>,
}

impl ClassificationResult {
    pub fn reasons(&self) -> Vec<ReasonCode> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.reason)
            .collect()
    }

    pub fn is_flagged(&self) -> bool {
        self.outcomes.iter().any(StageOutcome::is_match)
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|outcome| outcome.stage == stage)
    }
}

/// Runs the configured stages against rasters.
#[derive(Clone, Debug, Default)]
pub struct ImageClassifier {
    config: ClassifierConfig,
}

impl ImageClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Evaluates every enabled stage.
    pub fn classify(&self, raster: &Raster) -> ClassificationResult {
        self.run_stages(raster, self.config.enabled_stages())
    }

    /// Evaluates every stage regardless of toggles.
    pub fn inspect(&self, raster: &Raster) -> ClassificationResult {
        self.run_stages(raster, Stage::ALL)
    }

    /// The outcomes of `result` that belong to enabled stages.
    pub fn enabled_outcomes(&self, result: &ClassificationResult) -> ClassificationResult {
        ClassificationResult {
            outcomes: result
                .outcomes
                .iter()
                .filter(|outcome| self.config.is_enabled(outcome.stage))
                .cloned()
                .collect(),
        }
    }

    /// Decodes `path` and evaluates every enabled stage.
    pub fn classify_path(&self, path: &Path) -> Result<ClassificationResult, LoadError> {
        let raster = load_raster(path)?;
        Ok(self.classify(&raster))
    }

    fn run_stages<I>(&self, raster: &Raster, stages: I) -> ClassificationResult
    where
        I: IntoIterator<Item = Stage>,
    {
        let outcomes = stages
            .into_iter()
            .map(|stage| match stage.evaluate(raster, &self.config) {
                Ok(outcome) => {
                    tracing::debug!(stage = %stage, metrics = ?outcome.metrics, "stage evaluated");
                    outcome
                }
                Err(error) => {
                    tracing::warn!("Stage {} failed, treating as no match: {}", stage, error);
                    StageOutcome::failed(stage, &error)
                }
            })
            .collect();
        ClassificationResult { outcomes }
    }
}

/// Failure inside a stage; the stage then reports no match.
#[derive(Debug)]
pub enum ClassifyError {
    OpenCv(opencv::Error),
}

impl Display for ClassifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenCv(error) => write!(f, "opencv error: {}", error),
        }
    }
}

impl Error for ClassifyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::OpenCv(error) => Some(error),
        }
    }
}

impl From<opencv::Error> for ClassifyError {
    fn from(error: opencv::Error) -> Self {
        Self::OpenCv(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{raster, solid_bgr, solid_gray, vegetated_scene, write_image};

    #[test]
    fn stage_names_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_name(stage.name()), Some(stage));
        }
        assert_eq!(Stage::from_name("Blue-Dominance"), Some(Stage::BlueDominance));
        assert_eq!(Stage::from_name("exposure"), None);
    }

    #[test]
    fn reason_codes_serialize_as_snake_case() {
        let json = serde_json::to_string(&ReasonCode::NirLowSaturation).unwrap();
        assert_eq!(json, "\"nir_low_saturation\"");
        assert_eq!(ReasonCode::SnowBlockage.to_string(), "snow_blockage");
    }

    #[test]
    fn vegetated_scene_is_not_flagged() {
        let classifier = ImageClassifier::default();
        let result = classifier.classify(&raster(vegetated_scene()));
        assert!(!result.is_flagged(), "unexpected reasons {:?}", result.reasons());
        assert_eq!(result.outcomes.len(), 4);
    }

    #[test]
    fn all_matching_reasons_are_collected() {
        // Uniform black: desaturated centre strip and no texture.
        let classifier = ImageClassifier::default();
        let result = classifier.classify(&raster(solid_bgr(40, 40, [0, 0, 0])));
        assert_eq!(
            result.reasons(),
            vec![ReasonCode::NirLowSaturation, ReasonCode::Blur]
        );
        assert!(result.is_flagged());
    }

    #[test]
    fn disabled_saturation_stage_is_skipped_but_inspectable() {
        let classifier = ImageClassifier::default();
        let image = raster(solid_bgr(20, 20, [128, 128, 128]));

        let result = classifier.classify(&image);
        assert!(result.outcome(Stage::Saturation).is_none());

        let inspected = classifier.inspect(&image);
        assert_eq!(inspected.outcomes.len(), Stage::ALL.len());
        assert_eq!(
            inspected.outcome(Stage::Saturation).and_then(|o| o.reason),
            Some(ReasonCode::LowSaturation)
        );
    }

    #[test]
    fn grayscale_raster_only_needs_intensity_stages() {
        let classifier = ImageClassifier::default();
        let result = classifier.classify(&raster(solid_gray(20, 20, 200)));
        assert_eq!(
            result.reasons(),
            vec![ReasonCode::NirGrayscale, ReasonCode::Blur]
        );
        assert!(result.outcomes.iter().all(|outcome| outcome.error.is_none()));
    }

    #[test]
    fn stage_failure_counts_as_no_match() {
        let error = ClassifyError::OpenCv(opencv::Error::new(
            opencv::core::StsError,
            "conversion failed",
        ));
        let failed = StageOutcome::failed(Stage::Sharpness, &error);
        assert!(!failed.is_match());
        assert!(failed.metrics.is_empty());
        assert!(failed
            .error
            .as_deref()
            .is_some_and(|message| message.contains("conversion failed")));

        let result = ClassificationResult {
            outcomes: vec![StageOutcome::clear(Stage::Spectral), failed],
        };
        assert!(!result.is_flagged());
        assert!(result.reasons().is_empty());
    }

    #[test]
    fn enabled_outcomes_drop_disabled_stages() {
        let classifier = ImageClassifier::default();
        let image = raster(solid_bgr(20, 20, [128, 128, 128]));
        let inspected = classifier.inspect(&image);
        assert!(inspected.reasons().contains(&ReasonCode::LowSaturation));

        let enabled = classifier.enabled_outcomes(&inspected);
        assert!(enabled.outcome(Stage::Saturation).is_none());
        assert_eq!(enabled, classifier.classify(&image));
    }

    #[test]
    fn classify_path_reports_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("dark.png");
        write_image(&good, &solid_bgr(16, 16, [0, 0, 0]));
        let bad = dir.path().join("broken.jpg");
        std::fs::write(&bad, b"not an image").unwrap();

        let classifier = ImageClassifier::default();
        let result = classifier.classify_path(&good).unwrap();
        assert_eq!(
            result.reasons(),
            vec![ReasonCode::NirLowSaturation, ReasonCode::Blur]
        );
        assert!(matches!(
            classifier.classify_path(&bad),
            Err(LoadError::UnreadableImage(_))
        ));
    }

    #[test]
    fn all_stages_disabled_never_flags() {
        let mut config = ClassifierConfig::default();
        for stage in Stage::ALL {
            config.set_enabled(stage, false);
        }
        let classifier = ImageClassifier::new(config);
        let result = classifier.classify(&raster(solid_bgr(10, 10, [0, 0, 0])));
        assert!(result.outcomes.is_empty());
        assert!(!result.is_flagged());
    }
}
