use crate::fx::stages::Stage;
use crate::params::Parameters;
use std::f32::consts::FRAC_2_PI;

const SOFT_MIX: f32 = 0.7;
const HARD_MIX: f32 = 0.3;
const HARD_LIMIT: f32 = 0.8;

/// Blend of an arctangent soft clipper with a hard clipper, both driven by `amount`.
///
/// Output is bounded by `SOFT_MIX + HARD_MIX * HARD_LIMIT`. An amount of zero would collapse
/// the signal to silence, so the stage bypasses itself in that case.
pub struct DistortionStage {
    amount: f32,
}

impl DistortionStage {
    pub const fn new(amount: f32) -> Self {
        Self { amount }
    }

    #[inline]
    pub fn process(&self, input: f32) -> f32 {
        let driven = input * self.amount;
        let soft = FRAC_2_PI * driven.atan();
        let hard = driven.clamp(-HARD_LIMIT, HARD_LIMIT);
        SOFT_MIX.mul_add(soft, HARD_MIX * hard)
    }
}

impl Stage for DistortionStage {
    fn name(&self) -> &'static str {
        "distortion"
    }

    fn prepare(&mut self, params: &Parameters) -> bool {
        self.amount = params.distortion_amount;
        self.amount > 0.0
    }

    fn process_block(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}
