use std::path::{Path, PathBuf};

use crate::{
    assets::raster::PreparedImage,
    encode::{
        decode::VideoFrameReader,
        ffmpeg::{FfmpegSink, FfmpegSinkOpts},
        sink::{AudioPassthrough, FrameSink, SinkConfig},
    },
    export::{ExportPreset, ExportStatus, FileType},
    foundation::{
        core::{FrameIndex, Rgba8},
        error::{WatermarkError, WatermarkResult},
    },
    media::probe::TrackKind,
    render::{FrameCompositor, OverlayRenderer},
    timeline::{
        composition::{Composition, CompositionTrack, TrackSegment},
        video_composition::VideoComposition,
    },
};

/// Export job: decode the composite video track, burn in the layer tree, encode to a file.
pub struct ExportSession {
    composition: Composition,
    video_composition: VideoComposition,
    output_url: PathBuf,
    pub preset: ExportPreset,
    pub file_type: FileType,
    /// Flatten color for transparent output pixels (straight RGBA8).
    pub bg_rgba: [u8; 4],
}

impl ExportSession {
    pub fn new(
        composition: Composition,
        video_composition: VideoComposition,
        output_url: impl Into<PathBuf>,
        preset: ExportPreset,
    ) -> Self {
        Self {
            composition,
            video_composition,
            output_url: output_url.into(),
            preset,
            file_type: FileType::Mp4,
            bg_rgba: Rgba8::BLACK.to_array(),
        }
    }

    pub fn output_url(&self) -> &Path {
        &self.output_url
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn video_composition(&self) -> &VideoComposition {
        &self.video_composition
    }

    /// Run the job to a terminal status on the current thread.
    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(out = %self.output_url.display(), preset = %self.preset)
    )]
    pub fn export(&self) -> ExportStatus {
        match self.run() {
            Ok(frames) => {
                tracing::info!(frames, "export completed");
                ExportStatus::Completed
            }
            Err(e) => {
                tracing::debug!(error = %e, "export failed");
                ExportStatus::Failed(e)
            }
        }
    }

    fn run(&self) -> WatermarkResult<u64> {
        self.check_container()?;
        let (track, segment) = self.video_source()?;
        let natural = track.natural_size.ok_or_else(|| {
            WatermarkError::validation("composite video track has no natural size")
        })?;

        let mut reader = VideoFrameReader::spawn(
            &segment.source_path,
            segment.source_stream,
            natural,
            self.video_composition.frame_rate,
            segment.source_range,
        )?;

        let sink = FfmpegSink::new(FfmpegSinkOpts {
            out_path: self.output_url.clone(),
            overwrite: false,
            bg_rgba: self.bg_rgba,
            preset: self.preset,
        });
        self.write_output(sink, move |sink| {
            let frames = self.compose_into(reader.by_ref(), sink)?;
            reader.finish()?;
            Ok(frames)
        })
    }

    /// ffmpeg picks the muxer from the file name, so the url has to carry the right extension.
    fn check_container(&self) -> WatermarkResult<()> {
        let ext = self.output_url.extension().and_then(|e| e.to_str());
        if ext.is_some_and(|e| e.eq_ignore_ascii_case(self.file_type.extension())) {
            return Ok(());
        }
        Err(WatermarkError::export(format!(
            "output '{}' does not have the .{} extension",
            self.output_url.display(),
            self.file_type.extension()
        )))
    }

    /// Run `write` against `sink`. On failure the sink is dropped first (which stops any encoder
    /// process) and whatever it left at the output url is removed.
    fn write_output<S, F>(&self, mut sink: S, write: F) -> WatermarkResult<u64>
    where
        S: FrameSink,
        F: FnOnce(&mut S) -> WatermarkResult<u64>,
    {
        let result = write(&mut sink);
        if result.is_err() {
            drop(sink);
            discard_partial_output(&self.output_url);
        }
        result
    }

    /// Composite every frame from `frames` with the layer tree and stream the results into
    /// `sink`. Returns the number of frames written.
    pub fn compose_into<I>(&self, frames: I, sink: &mut dyn FrameSink) -> WatermarkResult<u64>
    where
        I: IntoIterator<Item = WatermarkResult<PreparedImage>>,
    {
        self.video_composition.validate()?;
        let (track, _) = self.video_source()?;
        let vc = &self.video_composition;

        let overlay = OverlayRenderer::new().render(vc.layers.overlay(), vc.render_size)?;
        let compositor = FrameCompositor::new(vc.render_size, overlay)?;

        sink.begin(SinkConfig {
            width: vc.render_size.width,
            height: vc.render_size.height,
            fps: vc.frame_rate,
            audio: self.audio_passthrough(),
        })?;

        tracing::debug!(
            expected = vc.frame_rate.secs_to_frames_ceil(self.composition.duration()),
            "compositing frames"
        );
        let mut written = 0u64;
        for frame in frames {
            let source = frame?;
            let idx = FrameIndex(written);
            let transform = vc.transform_for(track.id, idx.time_secs(vc.frame_rate));
            let out = compositor.compose(&source, transform)?;
            sink.push_frame(idx, &out)?;
            written += 1;
        }

        if written == 0 {
            return Err(WatermarkError::export("source video produced no frames"));
        }
        sink.end()?;
        Ok(written)
    }

    fn video_source(&self) -> WatermarkResult<(&CompositionTrack, &TrackSegment)> {
        let track = self
            .composition
            .first_track(TrackKind::Video)
            .ok_or_else(|| WatermarkError::validation("composition has no video track"))?;
        let segment = track
            .segments()
            .first()
            .ok_or_else(|| WatermarkError::validation("composite video track is empty"))?;
        Ok((track, segment))
    }

    fn audio_passthrough(&self) -> Option<AudioPassthrough> {
        let segment = self
            .composition
            .first_track(TrackKind::Audio)?
            .segments()
            .first()?;
        Some(AudioPassthrough {
            path: segment.source_path.clone(),
            stream_index: segment.source_stream,
            duration_sec: segment.source_range.duration,
        })
    }
}

fn discard_partial_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not remove partial output")
        }
    }
}
