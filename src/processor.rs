//! The watermark compositor: turns a [`MediaItem`] into a new file with the overlays burned in.

use std::{panic::AssertUnwindSafe, path::PathBuf};

use crate::{
    config::ProcessorConfig,
    export::{ExportDestination, ExportSession, ExportStatus, clear_temporary_data},
    foundation::{
        core::{Affine, Canvas, Fps},
        error::{WatermarkError, WatermarkResult},
        math::unpremultiply_rgba8_in_place,
    },
    layer::build_layer_tree,
    media::{
        item::{MediaItem, SourceAsset},
        probe::{AssetTrack, TrackKind, VideoAsset},
    },
    render::{FrameCompositor, OverlayRenderer},
    timeline::{
        composition::{Composition, TimeRange},
        orientation::orientation_transform,
        video_composition::{Instruction, LayerInstruction, VideoComposition},
    },
};

/// Outcome of one processing call. The video path sets `processed_url`, the image path `image`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MediaProcessResult {
    pub processed_url: Option<PathBuf>,
    pub image: Option<image::RgbaImage>,
}

pub struct MediaProcessor {
    config: ProcessorConfig,
}

impl MediaProcessor {
    pub fn new(config: ProcessorConfig) -> WatermarkResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Burn `item`'s overlays into its video source and export an MP4.
    ///
    /// Timeline and layer construction run on the calling thread; decoding and encoding run on a
    /// worker thread. `completion` is called exactly once, with either the output location or
    /// the first error. Nothing is exported after a failure.
    #[tracing::instrument(level = "info", skip_all, fields(elements = item.elements.len()))]
    pub fn process<F>(&self, item: MediaItem, completion: F)
    where
        F: FnOnce(WatermarkResult<MediaProcessResult>) + Send + 'static,
    {
        let session = match self.prepare_export(&item) {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!(error = %e, "aborting before export");
                completion(Err(e));
                return;
            }
        };

        std::thread::spawn(move || {
            let url = session.output_url().to_path_buf();
            let result = match guarded_export(|| session.export()) {
                ExportStatus::Completed => Ok(MediaProcessResult {
                    processed_url: Some(url),
                    image: None,
                }),
                ExportStatus::Failed(e @ WatermarkError::Export(_)) => Err(e),
                ExportStatus::Failed(e) => Err(WatermarkError::export(e.to_string())),
            };
            completion(result);
        });
    }

    /// [`Self::process`] waiting for the completion on the calling thread.
    pub fn process_blocking(&self, item: MediaItem) -> WatermarkResult<MediaProcessResult> {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        self.process(item, move |result| {
            let _ = tx.send(result);
        });
        rx.recv()
            .map_err(|_| WatermarkError::export("export worker ended without a result"))?
    }

    /// Composite `item`'s overlays onto its still-image source, stretched to the item size.
    pub fn process_image<F>(&self, item: MediaItem, completion: F)
    where
        F: FnOnce(WatermarkResult<MediaProcessResult>),
    {
        completion(self.process_image_blocking(&item));
    }

    #[tracing::instrument(level = "info", skip_all, fields(elements = item.elements.len()))]
    pub fn process_image_blocking(&self, item: &MediaItem) -> WatermarkResult<MediaProcessResult> {
        let SourceAsset::Image(source) = &item.source else {
            return Err(WatermarkError::validation(
                "process_image needs an image source; use process for video",
            ));
        };
        let size = item.size;
        size.validate()?;

        let layers = build_layer_tree(item, size)?;
        let overlay = OverlayRenderer::new().render(layers.overlay(), size)?;
        let compositor = FrameCompositor::new(size, overlay)?;

        let stretch = if source.is_empty() {
            Affine::IDENTITY
        } else {
            Affine::scale_non_uniform(
                f64::from(size.width) / f64::from(source.width),
                f64::from(size.height) / f64::from(source.height),
            )
        };
        let frame = compositor.compose(source, stretch)?;

        let mut data = frame.data;
        unpremultiply_rgba8_in_place(&mut data);
        let image = image::RgbaImage::from_raw(frame.width, frame.height, data)
            .ok_or_else(|| WatermarkError::render("composited image has the wrong byte length"))?;
        Ok(MediaProcessResult {
            processed_url: None,
            image: Some(image),
        })
    }

    /// Everything up to handing off to the export worker.
    fn prepare_export(&self, item: &MediaItem) -> WatermarkResult<ExportSession> {
        let SourceAsset::Video(asset) = &item.source else {
            return Err(WatermarkError::validation(
                "process needs a video source; use process_image for images",
            ));
        };
        item.size.validate()?;

        let source_video = asset.video_track()?;
        let mut composition = Composition::new();
        let video_id = composition.add_track(TrackKind::Video);
        composition.insert_time_range(
            video_id,
            copy_range(asset, source_video)?,
            &asset.path,
            source_video,
            0.0,
        )?;
        if let Some(source_audio) = asset.audio_track() {
            let audio_id = composition.add_track(TrackKind::Audio);
            composition.insert_time_range(
                audio_id,
                copy_range(asset, source_audio)?,
                &asset.path,
                source_audio,
                0.0,
            )?;
        }
        if let Some(track) = composition.track_mut(video_id) {
            track.preferred_rotation = source_video.preferred_rotation;
            track.natural_size = source_video.natural_size;
        }
        tracing::debug!(
            audio_tracks = composition.tracks(TrackKind::Audio).count(),
            duration_sec = composition.duration(),
            "composite timeline built"
        );

        let layers = build_layer_tree(item, item.size)?;

        let orientation = asset.orientation()?;
        let transform =
            orientation_transform(orientation, asset.natural_size()?, self.config.scale_factor);
        let mut layer_instruction = LayerInstruction::new(video_id);
        layer_instruction.set_transform(transform, 0.0);
        let video_composition = VideoComposition {
            render_size: item.size,
            frame_rate: self.config.fps,
            instructions: vec![Instruction {
                time_range: TimeRange::new(0.0, composition.duration())?,
                layer_instructions: vec![layer_instruction],
            }],
            layers,
        };
        video_composition.validate()?;
        tracing::debug!(?orientation, "orientation transform attached");

        let output_url = ExportDestination::resolve(&self.config.output_dir())?;
        clear_temporary_data(&output_url)?;

        let mut session =
            ExportSession::new(composition, video_composition, output_url, self.config.preset);
        session.bg_rgba = self.config.bg_rgba;
        Ok(session)
    }
}

/// Run `export`, turning a panic into a failed status so the completion still fires.
fn guarded_export(export: impl FnOnce() -> ExportStatus) -> ExportStatus {
    match std::panic::catch_unwind(AssertUnwindSafe(export)) {
        Ok(status) => status,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            tracing::error!(panic = %msg, "export worker panicked");
            ExportStatus::Failed(WatermarkError::export(format!(
                "export worker panicked: {msg}"
            )))
        }
    }
}

/// Whole-asset range `[0, duration)` clipped to what `track` actually holds.
fn copy_range(asset: &VideoAsset, track: &AssetTrack) -> WatermarkResult<TimeRange> {
    let duration = match (asset.duration_sec > 0.0, track.duration_sec > 0.0) {
        (true, true) => asset.duration_sec.min(track.duration_sec),
        (true, false) => asset.duration_sec,
        (false, _) => track.duration_sec,
    };
    TimeRange::new(0.0, duration).map_err(|e| WatermarkError::track_insertion(e.to_string()))
}

/// Item size for a video source when the caller gives none: its display (oriented) size.
pub fn default_render_size(asset: &VideoAsset) -> WatermarkResult<Canvas> {
    Canvas::from_size_even(asset.display_size()?)
}

/// Output rate for a video source when the caller gives none: the source video track's rate,
/// or the default when the container does not report one.
pub fn default_frame_rate(asset: &VideoAsset) -> Fps {
    asset
        .video_track()
        .ok()
        .and_then(|t| t.frame_rate)
        .unwrap_or_default()
}
