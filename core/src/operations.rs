use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum MoveError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    MissingFileName(PathBuf),
}

impl Display for MoveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => write!(f, "failed to move {}: {}", path.display(), source),
            Self::MissingFileName(path) => write!(f, "file name not found for {}", path.display()),
        }
    }
}

impl Error for MoveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Creates `directory` and its parents; an existing directory is fine.
pub fn ensure_directory(directory: &Path) -> Result<(), MoveError> {
    fs::create_dir_all(directory).map_err(|source| MoveError::Io {
        source,
        path: directory.to_path_buf(),
    })
}

/// Moves `source` into `target_directory`, returning the new location.
pub fn move_into(source: &Path, target_directory: &Path) -> Result<PathBuf, MoveError> {
    let destination = resolve_destination(target_directory, source)?;
    fs::rename(source, &destination).map_err(|error| MoveError::Io {
        source: error,
        path: source.to_path_buf(),
    })?;
    Ok(destination)
}

fn resolve_destination(target_directory: &Path, source: &Path) -> Result<PathBuf, MoveError> {
    let file_name = source
        .file_name()
        .ok_or_else(|| MoveError::MissingFileName(source.to_path_buf()))?;

    let mut candidate = target_directory.join(file_name);
    if !candidate.exists() {
        return Ok(candidate);
    }

    let stem = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_string())
        .unwrap_or_else(|| String::from("file"));
    let extension = source.extension().and_then(|ext| ext.to_str());
    let mut index = 1;

    loop {
        let mut name = format!("{} ({})", stem, index);
        if let Some(ext) = extension {
            name.push('.');
            name.push_str(ext);
        }
        candidate = target_directory.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
        index += 1;
    }
}
