//! Thresholds and toggles for the quality-control stages.
//!
//! The configuration is plain data loaded once before a run and shared
//! read-only by every classifier invocation. It can be written to and read
//! from TOML so thresholds can be retuned per dataset without recompiling:
//!
//! ```toml
//! quarantine_dir = "Quality_Control"
//!
//! [sharpness]
//! enabled = true
//! variance_threshold = 120.0
//!
//! [saturation]
//! enabled = true
//! ```

use super::Stage;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "trapqc.toml";

/// Name of the quarantine subdirectory created under the dataset root.
pub const DEFAULT_QUARANTINE_DIR: &str = "Quality_Control";

/// Near-infrared detection on a horizontal strip through the image centre.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    pub enabled: bool,
    /// Maximum strip width in pixels, centred horizontally.
    pub strip_width: usize,
    /// A strip pixel above this saturation marks the image as visible-color.
    pub saturation_threshold: u8,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strip_width: 500,
            saturation_threshold: 20,
        }
    }
}

/// Laplacian-variance blur detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharpnessConfig {
    pub enabled: bool,
    /// Lower values are stricter; 50 only catches heavy blur, 200 also
    /// catches mild blur and darkening.
    pub variance_threshold: f64,
}

impl Default for SharpnessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            variance_threshold: 150.0,
        }
    }
}

/// Deep-snow detection over the ground-proximate bottom band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowFlatnessConfig {
    pub enabled: bool,
    /// Share of the image height, measured from the bottom edge.
    pub band_fraction: f64,
    /// Band intensity standard deviation must fall below this.
    pub std_threshold: f64,
    /// Rows with a standard deviation below this count as flat.
    pub flat_row_std: f64,
    /// Share of flat rows required.
    pub flat_row_ratio: f64,
    /// Mean band brightness must exceed this, so flat shadows are kept.
    pub min_brightness: f64,
    /// Green must exceed red and blue by more than this to count as foliage.
    pub green_margin: i32,
    /// Above this share of foliage pixels the band is treated as vegetation.
    pub green_ratio_threshold: f64,
}

impl Default for SnowFlatnessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            band_fraction: 0.1,
            std_threshold: 12.0,
            flat_row_std: 12.0,
            flat_row_ratio: 0.6,
            min_brightness: 50.0,
            green_margin: 20,
            green_ratio_threshold: 0.5,
        }
    }
}

/// Global desaturation check (dark scenes, heavy snow, little live foliage).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaturationConfig {
    pub enabled: bool,
    /// Pixels below this saturation count as low-saturation.
    pub saturation_threshold: u8,
    /// Share of low-saturation pixels that makes the image a candidate.
    pub low_sat_ratio_threshold: f64,
    /// Inclusive hue bounds in OpenCV units (0-179).
    pub green_hue_min: u8,
    pub green_hue_max: u8,
    /// A green share at or above this among low-saturation pixels keeps the image.
    pub green_allowance: f64,
}

impl Default for SaturationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            saturation_threshold: 100,
            low_sat_ratio_threshold: 0.75,
            green_hue_min: 35,
            green_hue_max: 85,
            green_allowance: 0.5,
        }
    }
}

/// Snow detection through a white-balance blue cast in the lower image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueDominanceConfig {
    pub enabled: bool,
    /// Share of the image height inspected for blue dominance (bottom) and
    /// green cover (top).
    pub band_fraction: f64,
    /// Blue must exceed red and green by more than this.
    pub blue_margin: i32,
    /// Blue-dominant share must exceed this to continue.
    pub blue_ratio_threshold: f64,
    /// Inclusive hue bounds in OpenCV units (0-179).
    pub green_hue_min: u8,
    pub green_hue_max: u8,
    /// Green pixels in the top band need more saturation than this.
    pub green_min_saturation: u8,
    /// Above this green share in the top band the image is kept.
    pub green_top_threshold: f64,
}

impl Default for BlueDominanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            band_fraction: 0.5,
            blue_margin: 20,
            blue_ratio_threshold: 0.4,
            green_hue_min: 35,
            green_hue_max: 85,
            green_min_saturation: 30,
            green_top_threshold: 0.5,
        }
    }
}

/// Root quality-control configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Quarantine subdirectory name, created under the dataset root.
    pub quarantine_dir: String,
    /// Lower-case file extensions considered images.
    pub extensions: Vec<String>,
    pub spectral: SpectralConfig,
    pub sharpness: SharpnessConfig,
    pub snow_flatness: SnowFlatnessConfig,
    pub saturation: SaturationConfig,
    pub blue_dominance: BlueDominanceConfig,
}

pub fn default_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "bmp", "tif", "tiff"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            quarantine_dir: DEFAULT_QUARANTINE_DIR.to_string(),
            extensions: default_extensions(),
            spectral: SpectralConfig::default(),
            sharpness: SharpnessConfig::default(),
            snow_flatness: SnowFlatnessConfig::default(),
            saturation: SaturationConfig::default(),
            blue_dominance: BlueDominanceConfig::default(),
        }
    }
}

impl ClassifierConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            source,
            path: path.to_path_buf(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations, falling back to defaults.
    pub fn load_or_default() -> Self {
        for candidate in default_config_paths() {
            if !candidate.exists() {
                continue;
            }
            match Self::load(&candidate) {
                Ok(config) => return config,
                Err(error) => tracing::warn!("Ignoring config file: {}", error),
            }
        }
        Self::default()
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            source,
            path: path.to_path_buf(),
        })
    }

    pub fn is_enabled(&self, stage: Stage) -> bool {
        match stage {
            Stage::Spectral => self.spectral.enabled,
            Stage::Sharpness => self.sharpness.enabled,
            Stage::SnowFlatness => self.snow_flatness.enabled,
            Stage::Saturation => self.saturation.enabled,
            Stage::BlueDominance => self.blue_dominance.enabled,
        }
    }

    pub fn set_enabled(&mut self, stage: Stage, enabled: bool) {
        match stage {
            Stage::Spectral => self.spectral.enabled = enabled,
            Stage::Sharpness => self.sharpness.enabled = enabled,
            Stage::SnowFlatness => self.snow_flatness.enabled = enabled,
            Stage::Saturation => self.saturation.enabled = enabled,
            Stage::BlueDominance => self.blue_dominance.enabled = enabled,
        }
    }

    pub fn with_stage(mut self, stage: Stage, enabled: bool) -> Self {
        self.set_enabled(stage, enabled);
        self
    }

    /// Enabled stages in evaluation order.
    pub fn enabled_stages(&self) -> impl Iterator<Item = Stage> + '_ {
        Stage::ALL
            .into_iter()
            .filter(move |stage| self.is_enabled(*stage))
    }

    /// Whether `path` carries one of the configured image extensions.
    pub fn accepts_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Rejects values the stages cannot interpret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.quarantine_dir.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::Invalid(format!(
                "quarantine_dir must be a plain directory name, got {:?}",
                self.quarantine_dir
            )));
        }
        if self
            .extensions
            .iter()
            .any(|ext| ext.trim_start_matches('.').trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "extensions must not contain empty entries".to_string(),
            ));
        }
        if self.spectral.strip_width == 0 {
            return Err(ConfigError::Invalid(
                "spectral.strip_width must be positive".to_string(),
            ));
        }

        let fractions = [
            ("snow_flatness.band_fraction", self.snow_flatness.band_fraction),
            ("snow_flatness.flat_row_ratio", self.snow_flatness.flat_row_ratio),
            (
                "snow_flatness.green_ratio_threshold",
                self.snow_flatness.green_ratio_threshold,
            ),
            (
                "saturation.low_sat_ratio_threshold",
                self.saturation.low_sat_ratio_threshold,
            ),
            ("saturation.green_allowance", self.saturation.green_allowance),
            ("blue_dominance.band_fraction", self.blue_dominance.band_fraction),
            (
                "blue_dominance.blue_ratio_threshold",
                self.blue_dominance.blue_ratio_threshold,
            ),
            (
                "blue_dominance.green_top_threshold",
                self.blue_dominance.green_top_threshold,
            ),
        ];
        let thresholds = [
            ("sharpness.variance_threshold", self.sharpness.variance_threshold),
            ("snow_flatness.std_threshold", self.snow_flatness.std_threshold),
            ("snow_flatness.flat_row_std", self.snow_flatness.flat_row_std),
            ("snow_flatness.min_brightness", self.snow_flatness.min_brightness),
        ];
        for (field, value) in thresholds {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a finite number, got {}",
                    field, value
                )));
            }
        }

        for (field, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must lie in [0, 1], got {}",
                    field, value
                )));
            }
        }

        let hue_ranges = [
            (
                "saturation",
                self.saturation.green_hue_min,
                self.saturation.green_hue_max,
            ),
            (
                "blue_dominance",
                self.blue_dominance.green_hue_min,
                self.blue_dominance.green_hue_max,
            ),
        ];
        for (section, min, max) in hue_ranges {
            if min > max || max > 179 {
                return Err(ConfigError::Invalid(format!(
                    "{} green hue range {}..={} must be ordered and within 0..=179",
                    section, min, max
                )));
            }
        }
        Ok(())
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(mut dir) = config_dir() {
        dir.push("trapqc");
        dir.push(DEFAULT_CONFIG_FILE);
        paths.push(dir);
    }
    paths
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
    Serialize(toml::ser::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => {
                write!(f, "config io error for {}: {}", path.display(), source)
            }
            Self::Parse { source, path } => {
                write!(f, "invalid config TOML in {}: {}", path.display(), source)
            }
            Self::Serialize(error) => write!(f, "failed to serialize config: {}", error),
            Self::Invalid(message) => write!(f, "invalid config: {}", message),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Serialize(error) => Some(error),
            Self::Invalid(_) => None,
        }
    }
}
