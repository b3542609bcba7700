use crate::fx::stages::Stage;
use crate::params::Parameters;

pub const CLIP_LIMIT: f32 = 1.0;

/// Final safety rail: clamps every sample to `[-1.0, 1.0]` and is never bypassed.
#[derive(Default)]
pub struct HardClipStage;

impl Stage for HardClipStage {
    fn name(&self) -> &'static str {
        "hard clip"
    }

    fn prepare(&mut self, _params: &Parameters) -> bool {
        true
    }

    fn process_block(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = sample.clamp(-CLIP_LIMIT, CLIP_LIMIT);
        }
    }
}
