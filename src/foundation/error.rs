use std::path::PathBuf;

pub type WatermarkResult<T> = Result<T, WatermarkError>;

#[derive(thiserror::Error, Debug)]
pub enum WatermarkError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("source '{}' has no video track", .0.display())]
    MissingVideoTrack(PathBuf),

    #[error("track insertion error: {0}")]
    TrackInsertion(String),

    #[error("failed to remove temporary file '{}': {source}", .path.display())]
    TemporaryFileRemoval {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("probe error: {0}")]
    Probe(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("export error: {0}")]
    Export(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WatermarkError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn track_insertion(msg: impl Into<String>) -> Self {
        Self::TrackInsertion(msg.into())
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            WatermarkError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            WatermarkError::track_insertion("x")
                .to_string()
                .contains("track insertion error:")
        );
        assert!(
            WatermarkError::probe("x")
                .to_string()
                .contains("probe error:")
        );
        assert!(
            WatermarkError::render("x")
                .to_string()
                .contains("render error:")
        );
        assert!(
            WatermarkError::export("x")
                .to_string()
                .contains("export error:")
        );
    }

    #[test]
    fn missing_video_track_names_the_source() {
        let err = WatermarkError::MissingVideoTrack(PathBuf::from("clips/a.m4a"));
        assert_eq!(err.to_string(), "source 'clips/a.m4a' has no video track");
    }

    #[test]
    fn temporary_file_removal_keeps_io_source() {
        let err = WatermarkError::TemporaryFileRemoval {
            path: PathBuf::from("out.mp4"),
            source: std::io::Error::other("busy"),
        };
        assert!(err.to_string().contains("out.mp4"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = WatermarkError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
