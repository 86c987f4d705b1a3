use std::path::PathBuf;

use crate::{
    foundation::error::{WatermarkError, WatermarkResult},
    media::probe::{AssetTrack, TrackKind},
};

/// Tolerance for comparing container timestamps, which ffprobe reports with microsecond precision.
const TIME_EPSILON_SEC: f64 = 1e-3;

/// Half-open time range `[start, start + duration)` in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub duration: f64,
}

impl TimeRange {
    pub fn new(start: f64, duration: f64) -> WatermarkResult<Self> {
        if !start.is_finite() || !duration.is_finite() || start < 0.0 || duration < 0.0 {
            return Err(WatermarkError::validation(format!(
                "time range start={start} duration={duration} must be finite and non-negative"
            )));
        }
        Ok(Self { start, duration })
    }

    pub fn end(self) -> f64 {
        self.start + self.duration
    }

    pub fn is_empty(self) -> bool {
        self.duration <= 0.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositionTrackId(pub u32);

/// A piece of a source track placed on a composite track.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackSegment {
    pub source_path: PathBuf,
    /// Container stream index of the source track.
    pub source_stream: usize,
    pub source_range: TimeRange,
    /// Placement on the composite timeline, in seconds.
    pub target_start: f64,
}

impl TrackSegment {
    pub fn target_end(&self) -> f64 {
        self.target_start + self.source_range.duration
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompositionTrack {
    pub id: CompositionTrackId,
    pub kind: TrackKind,
    /// Display rotation carried over from the source track, in degrees.
    pub preferred_rotation: i32,
    /// Stored frame size of the video source, carried with the preferred transform.
    pub natural_size: Option<(u32, u32)>,
    segments: Vec<TrackSegment>,
}

impl CompositionTrack {
    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }

    pub fn duration(&self) -> f64 {
        self.segments
            .iter()
            .map(TrackSegment::target_end)
            .fold(0.0_f64, f64::max)
    }

    /// Copy `range` of a source track onto this track starting at `at`.
    pub fn insert_time_range(
        &mut self,
        range: TimeRange,
        source_path: impl Into<PathBuf>,
        source: &AssetTrack,
        at: f64,
    ) -> WatermarkResult<()> {
        if source.kind != self.kind {
            return Err(WatermarkError::track_insertion(format!(
                "cannot insert a {:?} source track into a {:?} composition track",
                source.kind, self.kind
            )));
        }
        if range.is_empty() {
            return Err(WatermarkError::track_insertion(format!(
                "source stream {} has an empty time range",
                source.index
            )));
        }
        if !at.is_finite() || at < 0.0 {
            return Err(WatermarkError::track_insertion(format!(
                "insertion time {at} must be finite and non-negative"
            )));
        }
        if source.duration_sec > 0.0 && range.end() > source.duration_sec + TIME_EPSILON_SEC {
            return Err(WatermarkError::track_insertion(format!(
                "range [{:.3}, {:.3}) exceeds source stream {} duration {:.3}",
                range.start,
                range.end(),
                source.index,
                source.duration_sec
            )));
        }

        let segment = TrackSegment {
            source_path: source_path.into(),
            source_stream: source.index,
            source_range: range,
            target_start: at,
        };
        if self.segments.iter().any(|s| {
            segment.target_start < s.target_end() - TIME_EPSILON_SEC
                && s.target_start < segment.target_end() - TIME_EPSILON_SEC
        }) {
            return Err(WatermarkError::track_insertion(format!(
                "segment at {at:.3} overlaps existing content on track {:?}",
                self.id
            )));
        }

        self.segments.push(segment);
        self.segments
            .sort_by(|a, b| a.target_start.total_cmp(&b.target_start));
        Ok(())
    }
}

/// The composite timeline: video and audio tracks assembled from source tracks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Composition {
    tracks: Vec<CompositionTrack>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_track(&mut self, kind: TrackKind) -> CompositionTrackId {
        let id = CompositionTrackId(self.tracks.len() as u32 + 1);
        self.tracks.push(CompositionTrack {
            id,
            kind,
            preferred_rotation: 0,
            natural_size: None,
            segments: Vec::new(),
        });
        id
    }

    pub fn track(&self, id: CompositionTrackId) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: CompositionTrackId) -> Option<&mut CompositionTrack> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn tracks(&self, kind: TrackKind) -> impl Iterator<Item = &CompositionTrack> {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }

    pub fn first_track(&self, kind: TrackKind) -> Option<&CompositionTrack> {
        self.tracks(kind).next()
    }

    /// Insert into track `id`; unknown ids are a track-insertion failure.
    pub fn insert_time_range(
        &mut self,
        id: CompositionTrackId,
        range: TimeRange,
        source_path: impl Into<PathBuf>,
        source: &AssetTrack,
        at: f64,
    ) -> WatermarkResult<()> {
        let track = self.track_mut(id).ok_or_else(|| {
            WatermarkError::track_insertion(format!("composition has no track {id:?}"))
        })?;
        track.insert_time_range(range, source_path, source, at)
    }

    /// End of the latest segment across all tracks.
    pub fn duration(&self) -> f64 {
        self.tracks
            .iter()
            .map(CompositionTrack::duration)
            .fold(0.0_f64, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_track(duration_sec: f64) -> AssetTrack {
        AssetTrack {
            index: 0,
            kind: TrackKind::Video,
            duration_sec,
            natural_size: Some((64, 48)),
            preferred_rotation: 0,
            frame_rate: None,
        }
    }

    fn audio_track(duration_sec: f64) -> AssetTrack {
        AssetTrack {
            index: 1,
            kind: TrackKind::Audio,
            duration_sec,
            natural_size: None,
            preferred_rotation: 0,
            frame_rate: None,
        }
    }

    #[test]
    fn time_range_rejects_negative_and_nan() {
        assert!(TimeRange::new(-1.0, 1.0).is_err());
        assert!(TimeRange::new(0.0, f64::NAN).is_err());
        assert!(TimeRange::new(0.0, 2.0).unwrap().end() == 2.0);
    }

    #[test]
    fn full_duration_inserted_at_zero() {
        let mut comp = Composition::new();
        let v = comp.add_track(TrackKind::Video);
        let a = comp.add_track(TrackKind::Audio);
        let range = TimeRange::new(0.0, 3.0).unwrap();

        comp.insert_time_range(v, range, "a.mp4", &video_track(3.0), 0.0)
            .unwrap();
        comp.insert_time_range(a, range, "a.mp4", &audio_track(3.0), 0.0)
            .unwrap();

        let audio = comp.first_track(TrackKind::Audio).unwrap();
        assert_eq!(audio.segments().len(), 1);
        assert_eq!(audio.segments()[0].target_start, 0.0);
        assert_eq!(audio.segments()[0].source_stream, 1);
        assert!((audio.duration() - 3.0).abs() < 1e-12);
        assert!((comp.duration() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut comp = Composition::new();
        let v = comp.add_track(TrackKind::Video);
        let err = comp
            .insert_time_range(
                v,
                TimeRange::new(0.0, 1.0).unwrap(),
                "a.mp4",
                &audio_track(1.0),
                0.0,
            )
            .unwrap_err();
        assert!(matches!(err, WatermarkError::TrackInsertion(_)));
    }

    #[test]
    fn empty_range_is_rejected() {
        let mut comp = Composition::new();
        let v = comp.add_track(TrackKind::Video);
        let err = comp
            .insert_time_range(
                v,
                TimeRange::new(0.0, 0.0).unwrap(),
                "a.mp4",
                &video_track(1.0),
                0.0,
            )
            .unwrap_err();
        assert!(matches!(err, WatermarkError::TrackInsertion(_)));
    }

    #[test]
    fn range_past_source_end_is_rejected() {
        let mut comp = Composition::new();
        let v = comp.add_track(TrackKind::Video);
        let err = comp
            .insert_time_range(
                v,
                TimeRange::new(0.0, 2.0).unwrap(),
                "a.mp4",
                &video_track(1.0),
                0.0,
            )
            .unwrap_err();
        assert!(err.to_string().contains("exceeds source stream"));

        // container rounding is tolerated
        comp.insert_time_range(
            v,
            TimeRange::new(0.0, 1.0005).unwrap(),
            "a.mp4",
            &video_track(1.0),
            0.0,
        )
        .unwrap();
    }

    #[test]
    fn overlapping_segments_are_rejected() {
        let mut comp = Composition::new();
        let v = comp.add_track(TrackKind::Video);
        let src = video_track(4.0);
        comp.insert_time_range(v, TimeRange::new(0.0, 2.0).unwrap(), "a.mp4", &src, 0.0)
            .unwrap();
        assert!(
            comp.insert_time_range(v, TimeRange::new(0.0, 2.0).unwrap(), "a.mp4", &src, 1.0)
                .is_err()
        );
        comp.insert_time_range(v, TimeRange::new(2.0, 2.0).unwrap(), "a.mp4", &src, 2.0)
            .unwrap();
        assert!((comp.duration() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_track_is_rejected() {
        let mut comp = Composition::new();
        let err = comp
            .insert_time_range(
                CompositionTrackId(9),
                TimeRange::new(0.0, 1.0).unwrap(),
                "a.mp4",
                &video_track(1.0),
                0.0,
            )
            .unwrap_err();
        assert!(matches!(err, WatermarkError::TrackInsertion(_)));
    }

    #[test]
    fn no_audio_tracks_unless_added() {
        let mut comp = Composition::new();
        comp.add_track(TrackKind::Video);
        assert_eq!(comp.tracks(TrackKind::Audio).count(), 0);
    }
}
