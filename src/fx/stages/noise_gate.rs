use crate::fx::stages::Stage;
use crate::params::Parameters;

/// Instantaneous gate: any sample whose magnitude is at or below the threshold is zeroed.
/// There is no attack, hold or release, so the gate can click on signals hovering around
/// the threshold.
pub struct NoiseGateStage {
    threshold: f32,
}

impl NoiseGateStage {
    pub const fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    #[inline]
    pub fn process(&self, input: f32) -> f32 {
        if input.abs() <= self.threshold {
            0.0
        } else {
            input
        }
    }
}

impl Stage for NoiseGateStage {
    fn name(&self) -> &'static str {
        "noise gate"
    }

    fn prepare(&mut self, params: &Parameters) -> bool {
        self.threshold = params.noise_gate_threshold;
        true
    }

    fn process_block(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}
