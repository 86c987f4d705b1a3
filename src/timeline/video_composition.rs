use crate::{
    foundation::{
        core::{Affine, Canvas, Fps},
        error::{WatermarkError, WatermarkResult},
    },
    layer::LayerTree,
    timeline::composition::{CompositionTrackId, TimeRange},
};

/// Per-track transform schedule inside an [`Instruction`].
#[derive(Clone, Debug, PartialEq)]
pub struct LayerInstruction {
    pub track: CompositionTrackId,
    /// `(time, transform)` ramps sorted by time; each holds until the next.
    transforms: Vec<(f64, Affine)>,
}

impl LayerInstruction {
    pub fn new(track: CompositionTrackId) -> Self {
        Self {
            track,
            transforms: Vec::new(),
        }
    }

    /// Set the transform that applies from `at` onwards, replacing any ramp at the same time.
    pub fn set_transform(&mut self, transform: Affine, at: f64) {
        self.transforms.retain(|(t, _)| *t != at);
        self.transforms.push((at, transform));
        self.transforms.sort_by(|a, b| a.0.total_cmp(&b.0));
    }

    /// Transform in effect at `time`; identity before the first ramp.
    pub fn transform_at(&self, time: f64) -> Affine {
        self.transforms
            .iter()
            .take_while(|(t, _)| *t <= time)
            .last()
            .map(|(_, xf)| *xf)
            .unwrap_or(Affine::IDENTITY)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub time_range: TimeRange,
    pub layer_instructions: Vec<LayerInstruction>,
}

/// Render description for the export job: output geometry, frame timing, per-track transforms
/// and the layer tree composited over the video.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoComposition {
    pub render_size: Canvas,
    pub frame_rate: Fps,
    pub instructions: Vec<Instruction>,
    pub layers: LayerTree,
}

impl VideoComposition {
    pub fn validate(&self) -> WatermarkResult<()> {
        self.render_size.validate()?;
        if self.instructions.is_empty() {
            return Err(WatermarkError::validation(
                "video composition needs at least one instruction",
            ));
        }
        for pair in self.instructions.windows(2) {
            if pair[1].time_range.start < pair[0].time_range.end() {
                return Err(WatermarkError::validation(
                    "video composition instructions must not overlap",
                ));
            }
        }
        Ok(())
    }

    pub fn instruction_at(&self, time: f64) -> Option<&Instruction> {
        self.instructions.iter().find(|i| {
            i.time_range.start <= time && time < i.time_range.end()
        })
    }

    /// Transform for `track` at `time`. Times past the last instruction use the last one, so
    /// trailing frames from rounding still get the orientation correction.
    pub fn transform_for(&self, track: CompositionTrackId, time: f64) -> Affine {
        self.instruction_at(time)
            .or_else(|| self.instructions.last())
            .and_then(|i| i.layer_instructions.iter().find(|l| l.track == track))
            .map(|l| l.transform_at(time))
            .unwrap_or(Affine::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Rect;
    use crate::layer::{Layer, LayerContents};

    fn tree(c: Canvas) -> LayerTree {
        let mut parent = Layer::new(c.rect());
        parent.add_sublayer(Layer::new(c.rect()).with_contents(LayerContents::VideoFrames));
        parent.add_sublayer(Layer::new(c.rect()));
        LayerTree { parent }
    }

    fn composition(instructions: Vec<Instruction>) -> VideoComposition {
        let render_size = Canvas::new(64, 48);
        VideoComposition {
            render_size,
            frame_rate: Fps::default(),
            instructions,
            layers: tree(render_size),
        }
    }

    #[test]
    fn transform_set_at_zero_covers_whole_range() {
        let track = CompositionTrackId(1);
        let rot = Affine::rotate(1.0);
        let mut li = LayerInstruction::new(track);
        li.set_transform(rot, 0.0);

        let vc = composition(vec![Instruction {
            time_range: TimeRange::new(0.0, 2.0).unwrap(),
            layer_instructions: vec![li],
        }]);
        vc.validate().unwrap();

        assert_eq!(vc.transform_for(track, 0.0), rot);
        assert_eq!(vc.transform_for(track, 1.999), rot);
        assert_eq!(vc.transform_for(track, 2.01), rot);
        assert_eq!(vc.transform_for(CompositionTrackId(7), 1.0), Affine::IDENTITY);
    }

    #[test]
    fn later_ramps_take_over() {
        let mut li = LayerInstruction::new(CompositionTrackId(1));
        li.set_transform(Affine::translate((5.0, 0.0)), 1.0);
        li.set_transform(Affine::scale(2.0), 0.0);
        li.set_transform(Affine::scale(3.0), 0.0);

        assert_eq!(li.transform_at(0.5), Affine::scale(3.0));
        assert_eq!(li.transform_at(1.5), Affine::translate((5.0, 0.0)));
    }

    #[test]
    fn validation_rejects_missing_or_overlapping_instructions() {
        assert!(composition(vec![]).validate().is_err());

        let a = Instruction {
            time_range: TimeRange::new(0.0, 2.0).unwrap(),
            layer_instructions: vec![],
        };
        let b = Instruction {
            time_range: TimeRange::new(1.0, 2.0).unwrap(),
            layer_instructions: vec![],
        };
        assert!(composition(vec![a, b]).validate().is_err());
        assert_eq!(
            composition(vec![]).layers.video_layer().frame,
            Rect::new(0.0, 0.0, 64.0, 48.0)
        );
    }
}
