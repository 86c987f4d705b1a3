use std::path::{Path, PathBuf};

use crate::{
    foundation::{
        core::{Fps, Size},
        error::{WatermarkError, WatermarkResult},
    },
    timeline::orientation::Orientation,
};

/// Media type of a source or composite track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
}

/// One stream of a probed source file.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetTrack {
    /// Container stream index (used to map the stream at export time).
    pub index: usize,
    pub kind: TrackKind,
    pub duration_sec: f64,
    /// Decoded frame size before any display rotation. Video tracks only.
    pub natural_size: Option<(u32, u32)>,
    /// Display rotation in degrees, normalised into `[0, 360)`.
    pub preferred_rotation: i32,
    pub frame_rate: Option<Fps>,
}

/// A probed video file. Read-only once constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoAsset {
    pub path: PathBuf,
    pub duration_sec: f64,
    pub tracks: Vec<AssetTrack>,
}

impl VideoAsset {
    pub fn tracks(&self, kind: TrackKind) -> impl Iterator<Item = &AssetTrack> {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }

    pub fn first_track(&self, kind: TrackKind) -> Option<&AssetTrack> {
        self.tracks(kind).next()
    }

    /// The first video track; a source without one cannot be watermarked.
    pub fn video_track(&self) -> WatermarkResult<&AssetTrack> {
        self.first_track(TrackKind::Video)
            .ok_or_else(|| WatermarkError::MissingVideoTrack(self.path.clone()))
    }

    pub fn audio_track(&self) -> Option<&AssetTrack> {
        self.first_track(TrackKind::Audio)
    }

    /// Decoded size of the first video track, before rotation.
    pub fn natural_size(&self) -> WatermarkResult<Size> {
        let track = self.video_track()?;
        let (w, h) = track.natural_size.ok_or_else(|| {
            WatermarkError::probe(format!(
                "video track {} of '{}' has no dimensions",
                track.index,
                self.path.display()
            ))
        })?;
        Ok(Size::new(f64::from(w), f64::from(h)))
    }

    /// Orientation derived from the video track's display rotation.
    pub fn orientation(&self) -> WatermarkResult<Orientation> {
        Ok(Orientation::from_rotation_degrees(
            self.video_track()?.preferred_rotation,
        ))
    }

    /// Natural size with width/height swapped for quarter-turn orientations.
    pub fn display_size(&self) -> WatermarkResult<Size> {
        let natural = self.natural_size()?;
        Ok(match self.video_track()?.preferred_rotation {
            90 | 270 => Size::new(natural.height, natural.width),
            _ => natural,
        })
    }

    /// Inspect `path` with `ffprobe`.
    #[tracing::instrument(level = "debug", fields(path = %path.display()))]
    pub fn probe(path: &Path) -> WatermarkResult<Self> {
        let out = std::process::Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .map_err(|e| WatermarkError::probe(format!("failed to run ffprobe: {e}")))?;
        if !out.status.success() {
            return Err(WatermarkError::probe(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let asset = parse_ffprobe_json(path, &out.stdout)?;
        tracing::debug!(
            tracks = asset.tracks.len(),
            duration_sec = asset.duration_sec,
            "probed source"
        );
        Ok(asset)
    }
}

#[derive(serde::Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    index: usize,
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Build a [`VideoAsset`] from `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_ffprobe_json(path: &Path, json: &[u8]) -> WatermarkResult<VideoAsset> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| WatermarkError::probe(format!("ffprobe json parse failed: {e}")))?;

    let format_duration = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_secs);

    let mut tracks = Vec::new();
    for s in &parsed.streams {
        let kind = match s.codec_type.as_deref() {
            Some("video") => TrackKind::Video,
            Some("audio") => TrackKind::Audio,
            _ => continue,
        };

        // Containers such as mkv only carry a container-level duration.
        let duration_sec = s
            .duration
            .as_deref()
            .and_then(parse_secs)
            .or(format_duration)
            .unwrap_or(0.0);

        let (natural_size, preferred_rotation, frame_rate) = match kind {
            TrackKind::Video => (
                s.width.zip(s.height),
                stream_rotation(s),
                s.r_frame_rate
                    .as_deref()
                    .and_then(parse_ff_ratio)
                    .and_then(|(n, d)| Fps::new(n, d).ok()),
            ),
            TrackKind::Audio => (None, 0, None),
        };

        tracks.push(AssetTrack {
            index: s.index,
            kind,
            duration_sec,
            natural_size,
            preferred_rotation,
            frame_rate,
        });
    }

    let duration_sec = format_duration.unwrap_or_else(|| {
        tracks
            .iter()
            .map(|t| t.duration_sec)
            .fold(0.0_f64, f64::max)
    });

    Ok(VideoAsset {
        path: path.to_path_buf(),
        duration_sec,
        tracks,
    })
}

/// Clockwise display rotation in `[0, 360)`.
///
/// The legacy `rotate` tag is clockwise; the display-matrix side data is counter-clockwise.
fn stream_rotation(s: &ProbeStream) -> i32 {
    let tag = s
        .tags
        .as_ref()
        .and_then(|t| t.rotate.as_deref())
        .and_then(|r| r.trim().parse::<f64>().ok());
    let side = s.side_data_list.iter().find_map(|d| d.rotation).map(|r| -r);
    let deg = tag.or(side).unwrap_or(0.0);
    (deg.round() as i32).rem_euclid(360)
}

fn parse_secs(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}
