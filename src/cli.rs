use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use trapqc_core::{ClassifierConfig, ConfigError, Stage, ThreadingMode};

pub const USAGE: &str = "\
usage: trapqc [run] <root> [options]
       trapqc inspect <image> [--config=<path>]

options:
  --config=<path>        load classifier settings from a TOML file
  --enable=<stage>       enable a stage (repeatable)
  --disable=<stage>      disable a stage (repeatable)
  --blur-threshold=<v>   Laplacian variance below which an image is blurred
  --dry-run              classify and report without moving files
  --no-thread            process files sequentially
  --report=<path>        write a JSON run report
  --write-config=<path>  save the effective settings as TOML
  --quiet                hide the progress bar

stages: spectral, sharpness, snow_flatness, saturation, blue_dominance";

#[derive(Debug, PartialEq)]
pub enum Command {
    Run(RunConfig),
    Inspect(InspectConfig),
}

/// Adjustments layered over the loaded classifier settings.
#[derive(Debug, Default, PartialEq)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub enable: Vec<Stage>,
    pub disable: Vec<Stage>,
    pub blur_threshold: Option<f64>,
}

#[derive(Debug, PartialEq)]
pub struct RunConfig {
    pub root: PathBuf,
    pub overrides: ConfigOverrides,
    pub threading: ThreadingMode,
    pub dry_run: bool,
    pub report: Option<PathBuf>,
    pub write_config: Option<PathBuf>,
    pub show_progress: bool,
}

#[derive(Debug, PartialEq)]
pub struct InspectConfig {
    pub image: PathBuf,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CliError {
    MissingRoot,
    MissingImage,
    InvalidFlag(String),
    InvalidValue { flag: String, value: String },
    UnknownStage(String),
    Help,
}

impl Command {
    pub fn from_env() -> Result<Self, CliError> {
        Self::from_iter(env::args().skip(1))
    }

    pub fn from_iter<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter().peekable();
        let first = args.peek().cloned();
        match first.as_deref() {
            Some("inspect") => {
                args.next();
                InspectConfig::parse(args).map(Command::Inspect)
            }
            Some("run") => {
                args.next();
                RunConfig::parse(args).map(Command::Run)
            }
            Some("--help") | Some("-h") | Some("help") => Err(CliError::Help),
            Some(_) => RunConfig::parse(args).map(Command::Run),
            None => Err(CliError::MissingRoot),
        }
    }
}

impl ConfigOverrides {
    /// Consumes `arg` if it is a settings flag.
    fn accept(&mut self, arg: &str) -> Result<bool, CliError> {
        if let Some(value) = arg.strip_prefix("--config=") {
            self.config_path = Some(PathBuf::from(value));
            return Ok(true);
        }
        if let Some(value) = arg.strip_prefix("--enable=") {
            self.enable.push(parse_stage(value)?);
            return Ok(true);
        }
        if let Some(value) = arg.strip_prefix("--disable=") {
            self.disable.push(parse_stage(value)?);
            return Ok(true);
        }
        if let Some(value) = arg.strip_prefix("--blur-threshold=") {
            let threshold = value
                .parse::<f64>()
                .ok()
                .filter(|threshold| threshold.is_finite())
                .ok_or_else(|| CliError::InvalidValue {
                    flag: String::from("--blur-threshold"),
                    value: value.to_string(),
                })?;
            self.blur_threshold = Some(threshold);
            return Ok(true);
        }
        Ok(false)
    }

    /// Loads the base settings, applies the flags and validates the result.
    pub fn resolve(&self) -> Result<ClassifierConfig, ConfigError> {
        let mut config = match &self.config_path {
            Some(path) => ClassifierConfig::load(path)?,
            None => ClassifierConfig::load_or_default(),
        };
        for stage in &self.enable {
            config.set_enabled(*stage, true);
        }
        for stage in &self.disable {
            config.set_enabled(*stage, false);
        }
        if let Some(threshold) = self.blur_threshold {
            config.sharpness.variance_threshold = threshold;
        }
        config.validate()?;
        Ok(config)
    }
}

impl RunConfig {
    fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: Iterator<Item = String>,
    {
        let mut root: Option<PathBuf> = None;
        let mut overrides = ConfigOverrides::default();
        let mut threading = ThreadingMode::Parallel;
        let mut dry_run = false;
        let mut report: Option<PathBuf> = None;
        let mut write_config: Option<PathBuf> = None;
        let mut show_progress = true;

        for arg in args {
            if arg.starts_with("--") {
                if overrides.accept(&arg)? {
                    continue;
                }
                match arg.as_str() {
                    "--help" => return Err(CliError::Help),
                    "--no-thread" => threading = ThreadingMode::Sequential,
                    "--dry-run" => dry_run = true,
                    "--quiet" => show_progress = false,
                    _ => {
                        if let Some(value) = arg.strip_prefix("--root=") {
                            root = Some(PathBuf::from(value));
                        } else if let Some(value) = arg.strip_prefix("--report=") {
                            report = Some(PathBuf::from(value));
                        } else if let Some(value) = arg.strip_prefix("--write-config=") {
                            write_config = Some(PathBuf::from(value));
                        } else {
                            return Err(CliError::InvalidFlag(arg));
                        }
                    }
                }
                continue;
            }

            if root.is_none() {
                root = Some(PathBuf::from(&arg));
                continue;
            }

            return Err(CliError::InvalidFlag(arg));
        }

        let root = root.ok_or(CliError::MissingRoot)?;

        Ok(Self {
            root,
            overrides,
            threading,
            dry_run,
            report,
            write_config,
            show_progress,
        })
    }
}

impl InspectConfig {
    fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: Iterator<Item = String>,
    {
        let mut image: Option<PathBuf> = None;
        let mut overrides = ConfigOverrides::default();

        for arg in args {
            if arg.starts_with("--") {
                if arg == "--help" {
                    return Err(CliError::Help);
                }
                if overrides.accept(&arg)? {
                    continue;
                }
                return Err(CliError::InvalidFlag(arg));
            }

            if image.is_none() {
                image = Some(PathBuf::from(&arg));
                continue;
            }

            return Err(CliError::InvalidFlag(arg));
        }

        let image = image.ok_or(CliError::MissingImage)?;
        Ok(Self { image, overrides })
    }
}

fn parse_stage(value: &str) -> Result<Stage, CliError> {
    Stage::from_name(value).ok_or_else(|| CliError::UnknownStage(value.to_string()))
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRoot => write!(f, "root directory argument is required"),
            Self::MissingImage => write!(f, "image path argument is required"),
            Self::InvalidFlag(flag) => write!(f, "unrecognized argument: {}", flag),
            Self::InvalidValue { flag, value } => {
                write!(f, "invalid value for {}: {}", flag, value)
            }
            Self::UnknownStage(name) => write!(f, "unknown stage: {}", name),
            Self::Help => write!(f, "{}", USAGE),
        }
    }
}

impl Error for CliError {}
