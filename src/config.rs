use std::path::PathBuf;

use crate::{
    export::{ExportPreset, default_output_dir},
    foundation::{
        core::{Fps, Rgba8},
        error::{WatermarkError, WatermarkResult},
    },
};

/// Settings for a [`crate::MediaProcessor`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Uniform factor applied by the orientation transform.
    pub scale_factor: f64,
    /// Output frame rate.
    pub fps: Fps,
    /// Where exported files go; the user's document directory when unset.
    pub output_dir: Option<PathBuf>,
    pub preset: ExportPreset,
    /// Flatten color for transparent output pixels (straight RGBA8).
    pub bg_rgba: [u8; 4],
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            fps: Fps::default(),
            output_dir: None,
            preset: ExportPreset::Highest,
            bg_rgba: Rgba8::BLACK.to_array(),
        }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> WatermarkResult<()> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(WatermarkError::validation(format!(
                "scale_factor must be finite and > 0, got {}",
                self.scale_factor
            )));
        }
        Fps::new(self.fps.num, self.fps.den)?;
        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(default_output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ProcessorConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.scale_factor, 1.0);
        assert_eq!(cfg.fps, Fps { num: 30, den: 1 });
        assert_eq!(cfg.preset, ExportPreset::Highest);
    }

    #[test]
    fn rejects_bad_scale_and_fps() {
        let cfg = ProcessorConfig {
            scale_factor: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ProcessorConfig {
            fps: Fps { num: 30, den: 0 },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ProcessorConfig =
            serde_json::from_str(r#"{ "scale_factor": 0.5, "preset": "low" }"#).unwrap();
        assert_eq!(cfg.scale_factor, 0.5);
        assert_eq!(cfg.preset, ExportPreset::Low);
        assert_eq!(cfg.fps, Fps::default());
        assert!(cfg.output_dir.is_none());
    }

    #[test]
    fn explicit_output_dir_wins() {
        let cfg = ProcessorConfig {
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..Default::default()
        };
        assert_eq!(cfg.output_dir(), PathBuf::from("/tmp/out"));
    }
}
