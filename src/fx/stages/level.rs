use crate::fx::stages::Stage;
use crate::params::Parameters;

pub struct GainStage {
    gain: f32,
}

impl GainStage {
    pub const fn new(gain: f32) -> Self {
        Self { gain }
    }
}

impl Stage for GainStage {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn prepare(&mut self, params: &Parameters) -> bool {
        self.gain = params.gain;
        true
    }

    fn process_block(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample *= self.gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_stage() {
        let mut stage = GainStage::new(1.0);
        let mut block = [1.0, -0.5];
        stage.process_block(&mut block);
        assert_eq!(block, [1.0, -0.5]);

        stage.prepare(&Parameters {
            gain: 2.0,
            ..Parameters::default()
        });
        stage.process_block(&mut block);
        assert_eq!(block, [2.0, -1.0]);

        stage.prepare(&Parameters {
            gain: 0.0,
            ..Parameters::default()
        });
        stage.process_block(&mut block);
        assert_eq!(block, [0.0, 0.0]);
    }

    #[test]
    fn gain_can_exceed_unity() {
        let mut stage = GainStage::new(10.0);
        let mut block = [0.3];
        stage.process_block(&mut block);
        assert!((block[0] - 3.0).abs() < 1e-6);
    }
}
