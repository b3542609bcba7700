pub mod clipper;
pub mod distortion;
pub mod filter;
pub mod level;
pub mod noise_gate;

use crate::params::Parameters;

// The core trait that all processing stages must implement
pub trait Stage: Send + 'static {
    fn name(&self) -> &'static str;

    // Pick up the parameter snapshot for the coming buffer.
    // Returning false bypasses the stage for that buffer.
    fn prepare(&mut self, params: &Parameters) -> bool;

    // Process one interleaved buffer in place
    fn process_block(&mut self, block: &mut [f32]);

    // Drop any state carried between buffers
    fn reset(&mut self) {}
}
