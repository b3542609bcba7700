use livefx::audio::device::{Device, StreamConfig};
use livefx::audio::host::AudioHost;
use livefx::audio::processor::StreamProcessor;
use livefx::{Error, Result};
use std::sync::{Arc, Mutex};

/// In-process host: the test plays the part of the audio thread by calling [`LoopbackHost::cycle`].
#[derive(Clone, Default)]
pub struct LoopbackHost {
    pub devices: Vec<Device>,
    pub fail_start: bool,
    pub fail_stop: bool,
    running: Arc<Mutex<Option<StreamProcessor>>>,
    log: Arc<Mutex<Vec<&'static str>>>,
}

pub struct LoopbackStream;

impl LoopbackHost {
    pub fn stereo() -> Self {
        Self {
            devices: vec![
                device(0, "interface", 2, 2),
                device(1, "mic", 1, 0),
                device(2, "speakers", 0, 2),
            ],
            ..Self::default()
        }
    }

    /// Runs one callback cycle, as the real-time thread would.
    pub fn cycle(&self, input: &[f32], output: &mut [f32]) -> Option<Result<()>> {
        let mut running = self.running.lock().unwrap();
        running.as_mut().map(|p| p.process(input, output))
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().unwrap().is_some()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.log.lock().unwrap().push(call);
    }
}

pub fn device(index: usize, name: &str, inputs: usize, outputs: usize) -> Device {
    Device {
        index,
        name: name.to_string(),
        max_input_channels: inputs,
        max_output_channels: outputs,
    }
}

impl AudioHost for LoopbackHost {
    type Stream = LoopbackStream;

    fn devices(&self) -> Result<Vec<Device>> {
        Ok(self.devices.clone())
    }

    fn configure(
        &mut self,
        _input: &Device,
        _output: &Device,
        config: StreamConfig,
    ) -> Result<StreamConfig> {
        self.record("configure");
        Ok(config)
    }

    fn start(
        &mut self,
        _input: &Device,
        _output: &Device,
        processor: StreamProcessor,
    ) -> Result<LoopbackStream> {
        self.record("start");
        if self.fail_start {
            return Err(Error::Host("start refused".to_string()));
        }
        *self.running.lock().unwrap() = Some(processor);
        Ok(LoopbackStream)
    }

    fn stop(&mut self, _stream: LoopbackStream) -> Result<StreamProcessor> {
        self.record("stop");
        let processor = self.running.lock().unwrap().take();
        if self.fail_stop {
            return Err(Error::Host("stop failed".to_string()));
        }
        processor.ok_or_else(|| Error::Host("not running".to_string()))
    }

    fn close(&mut self) {
        self.record("close");
    }
}
