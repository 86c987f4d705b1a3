pub mod session;

pub use session::ExportSession;

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::foundation::error::{WatermarkError, WatermarkResult};

/// Encoder quality tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPreset {
    #[default]
    Highest,
    Medium,
    Low,
}

impl ExportPreset {
    /// `(crf, preset)` passed to libx264.
    pub fn x264_params(self) -> (u8, &'static str) {
        match self {
            Self::Highest => (18, "slow"),
            Self::Medium => (23, "medium"),
            Self::Low => (28, "veryfast"),
        }
    }
}

impl FromStr for ExportPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "highest" => Ok(Self::Highest),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!(
                "unknown preset '{other}' (expected highest, medium or low)"
            )),
        }
    }
}

impl fmt::Display for ExportPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Highest => "highest",
            Self::Medium => "medium",
            Self::Low => "low",
        })
    }
}

/// Container of the exported file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FileType {
    #[default]
    Mp4,
}

impl FileType {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
        }
    }
}

/// Terminal state of an export job.
#[derive(Debug)]
pub enum ExportStatus {
    Completed,
    Failed(WatermarkError),
}

impl ExportStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Picks where an export job writes its file.
pub struct ExportDestination;

impl ExportDestination {
    /// `<dir>/<uuid v4>.mp4`, creating `dir` if needed.
    pub fn resolve(dir: &Path) -> WatermarkResult<PathBuf> {
        let name = format!("{}.{}", uuid::Uuid::new_v4(), FileType::Mp4.extension());
        Self::resolve_named(dir, &name)
    }

    /// `dir/file_name`; an existing entry with that name is reused as-is.
    pub fn resolve_named(dir: &Path, file_name: &str) -> WatermarkResult<PathBuf> {
        use anyhow::Context as _;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;

        let existing = std::fs::read_dir(dir)
            .with_context(|| format!("failed to list output directory '{}'", dir.display()))?
            .filter_map(Result::ok)
            .find(|entry| entry.file_name() == file_name)
            .map(|entry| entry.path());

        Ok(match existing {
            Some(path) => {
                tracing::debug!(
                    path = %path.display(),
                    "output name already present, reusing path"
                );
                path
            }
            None => dir.join(file_name),
        })
    }
}

/// Delete a stale file at `path` so the export never appends to old output.
pub fn clear_temporary_data(path: &Path) -> WatermarkResult<()> {
    match std::fs::symlink_metadata(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(WatermarkError::TemporaryFileRemoval {
                path: path.to_path_buf(),
                source,
            });
        }
        Ok(_) => {}
    }

    tracing::warn!(path = %path.display(), "removing stale file at export destination");
    std::fs::remove_file(path).map_err(|source| WatermarkError::TemporaryFileRemoval {
        path: path.to_path_buf(),
        source,
    })
}

/// The user's document directory, or the working directory when there is none.
pub fn default_output_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_names_a_fresh_mp4_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let a = ExportDestination::resolve(dir.path()).unwrap();
        let b = ExportDestination::resolve(dir.path()).unwrap();

        assert_eq!(a.parent(), Some(dir.path()));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("mp4"));
        let stem = a.file_stem().and_then(|s| s.to_str()).unwrap();
        assert!(uuid::Uuid::parse_str(stem).is_ok());
        assert_ne!(a, b);
        assert!(!a.exists());
    }

    #[test]
    fn resolve_reuses_existing_entry_and_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out");
        let fresh = ExportDestination::resolve_named(&nested, "x.mp4").unwrap();
        assert!(nested.is_dir());
        assert_eq!(fresh, nested.join("x.mp4"));

        std::fs::write(&fresh, b"old").unwrap();
        let again = ExportDestination::resolve_named(&nested, "x.mp4").unwrap();
        assert_eq!(again, fresh);
    }

    #[test]
    fn clear_temporary_data_deletes_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.mp4");
        std::fs::write(&path, b"old").unwrap();

        clear_temporary_data(&path).unwrap();
        assert!(!path.exists());
        // nothing there is fine too
        clear_temporary_data(&path).unwrap();
    }

    #[test]
    fn clear_temporary_data_reports_removal_failure() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("a_directory.mp4");
        std::fs::create_dir(&sub).unwrap();

        let err = clear_temporary_data(&sub).unwrap_err();
        assert!(matches!(
            err,
            WatermarkError::TemporaryFileRemoval { ref path, .. } if path == &sub
        ));
    }

    #[test]
    fn presets_parse_and_map_to_x264() {
        assert_eq!("Highest".parse::<ExportPreset>().unwrap(), ExportPreset::Highest);
        assert_eq!("low".parse::<ExportPreset>().unwrap(), ExportPreset::Low);
        assert!("ultra".parse::<ExportPreset>().is_err());
        assert!(ExportPreset::Highest.x264_params().0 < ExportPreset::Low.x264_params().0);
        assert_eq!(ExportPreset::default().to_string(), "highest");
    }
}
