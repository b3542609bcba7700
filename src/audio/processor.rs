use std::sync::Arc;

use crate::audio::device::StreamConfig;
use crate::error::{Error, Result};
use crate::fx::chain::EffectChain;
use crate::params::ParameterStore;

/// Body of the real-time callback: one parameter snapshot and one chain pass per buffer.
pub struct StreamProcessor {
    chain: EffectChain,
    params: Arc<ParameterStore>,
    config: StreamConfig,
}

impl StreamProcessor {
    pub fn new(config: StreamConfig, params: Arc<ParameterStore>) -> Self {
        Self {
            chain: EffectChain::standard(config.sample_rate as f32, config.channel_count),
            params,
            config,
        }
    }

    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Called by the host when its period size changes.
    pub fn update_buffer_frames(&mut self, buffer_frames: usize) {
        self.config.buffer_frames = buffer_frames;
    }

    /// Processes one interleaved buffer. On error the output holds silence.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<()> {
        let expected = self.config.buffer_len();
        if input.len() != expected || output.len() != expected {
            output.fill(0.0);
            return Err(Error::BufferSize {
                expected,
                actual: if input.len() == expected {
                    output.len()
                } else {
                    input.len()
                },
            });
        }

        output.copy_from_slice(input);
        let params = self.params.get();
        self.chain.process(output, &params);

        if !output.iter().all(|s| s.is_finite()) {
            output.fill(0.0);
            self.chain.reset();
            return Err(Error::NonFiniteOutput);
        }

        Ok(())
    }
}
