use crate::fx::stages::Stage;
use crate::fx::stages::clipper::HardClipStage;
use crate::fx::stages::distortion::DistortionStage;
use crate::fx::stages::filter::{FilterRole, FilterStage};
use crate::fx::stages::level::GainStage;
use crate::fx::stages::noise_gate::NoiseGateStage;
use crate::params::Parameters;

// EffectChain holds an ordered sequence of processing stages.
#[derive(Default)]
pub struct EffectChain {
    stages: Vec<Box<dyn Stage>>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// NoiseGate → PreEqualizer → Gain → Distortion → Cabinet → PostEqualizer → HardClip.
    pub fn standard(sample_rate: f32, channels: usize) -> Self {
        let defaults = Parameters::default();
        let mut chain = Self::new();
        chain.add_stage(Box::new(NoiseGateStage::new(defaults.noise_gate_threshold)));
        chain.add_stage(Box::new(FilterStage::new(
            FilterRole::PreEqualizer,
            sample_rate,
            channels,
        )));
        chain.add_stage(Box::new(GainStage::new(defaults.gain)));
        chain.add_stage(Box::new(DistortionStage::new(defaults.distortion_amount)));
        chain.add_stage(Box::new(FilterStage::new(
            FilterRole::Cabinet,
            sample_rate,
            channels,
        )));
        chain.add_stage(Box::new(FilterStage::new(
            FilterRole::PostEqualizer,
            sample_rate,
            channels,
        )));
        chain.add_stage(Box::new(HardClipStage));
        chain
    }

    pub fn add_stage(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|s| s.name())
    }

    // process runs one interleaved buffer through every active stage, in place.
    pub fn process(&mut self, block: &mut [f32], params: &Parameters) {
        for stage in &mut self.stages {
            if stage.prepare(params) {
                stage.process_block(block);
            }
        }
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}
