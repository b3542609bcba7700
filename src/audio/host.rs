use crate::audio::device::{Device, StreamConfig};
use crate::audio::processor::StreamProcessor;
use crate::error::Result;

/// The host audio API as seen by [`AudioEngine`](crate::audio::engine::AudioEngine).
///
/// The host owns the real-time thread: once `start` hands it the processor it calls
/// [`StreamProcessor::process`] once per buffer until `stop` hands the processor back.
pub trait AudioHost {
    type Stream;

    fn devices(&self) -> Result<Vec<Device>>;

    /// Lets the host adjust the negotiated config to what it will actually run.
    fn configure(
        &mut self,
        input: &Device,
        output: &Device,
        config: StreamConfig,
    ) -> Result<StreamConfig>;

    fn start(
        &mut self,
        input: &Device,
        output: &Device,
        processor: StreamProcessor,
    ) -> Result<Self::Stream>;

    fn stop(&mut self, stream: Self::Stream) -> Result<StreamProcessor>;

    /// Releases everything the host holds. Called once.
    fn close(&mut self);
}
