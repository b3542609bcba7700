use crossbeam::channel::Receiver;
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;

use crate::audio::device::{Device, StreamConfig, StreamRequest};
use crate::audio::host::AudioHost;
use crate::audio::processor::StreamProcessor;
use crate::control::ControlEvent;
use crate::error::{Error, Result};
use crate::params::ParameterStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Opened,
    Streaming,
    Stopped,
    Closed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Opened => "opened",
            Self::Streaming => "streaming",
            Self::Stopped => "stopped",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Owns the stream lifecycle:
/// `Uninitialized → Opened → Streaming → Stopped → Closed`.
pub struct AudioEngine<H: AudioHost> {
    host: H,
    params: Arc<ParameterStore>,
    state: EngineState,
    devices: Option<(Device, Device)>,
    config: Option<StreamConfig>,
    /// Held by the engine except while streaming, when the host owns it.
    processor: Option<StreamProcessor>,
    stream: Option<H::Stream>,
}

impl<H: AudioHost> AudioEngine<H> {
    pub fn new(host: H, params: Arc<ParameterStore>) -> Self {
        Self {
            host,
            params,
            state: EngineState::Uninitialized,
            devices: None,
            config: None,
            processor: None,
            stream: None,
        }
    }

    pub const fn state(&self) -> EngineState {
        self.state
    }

    pub const fn config(&self) -> Option<&StreamConfig> {
        self.config.as_ref()
    }

    fn require(&self, operation: &'static str, allowed: EngineState) -> Result<()> {
        if self.state == allowed {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    pub fn open(
        &mut self,
        input_index: usize,
        output_index: usize,
        request: StreamRequest,
    ) -> Result<StreamConfig> {
        self.require("open", EngineState::Uninitialized)?;

        let devices = self.host.devices()?;
        let find = |index: usize| {
            devices
                .iter()
                .find(|d| d.index == index)
                .cloned()
                .ok_or_else(|| Error::DeviceUnavailable {
                    reason: format!("no device with index {index}"),
                })
        };
        let input = find(input_index)?;
        let output = find(output_index)?;

        let negotiated = StreamConfig::negotiate(&input, &output, request)?;
        let config = self.host.configure(&input, &output, negotiated)?;
        info!("Opened '{}' -> '{}': {config}", input.name, output.name);

        self.processor = Some(StreamProcessor::new(config, Arc::clone(&self.params)));
        self.config = Some(config);
        self.devices = Some((input, output));
        self.state = EngineState::Opened;

        Ok(config)
    }

    pub fn start(&mut self) -> Result<()> {
        self.require("start", EngineState::Opened)?;

        let (Some((input, output)), Some(config), Some(processor)) =
            (&self.devices, self.config, self.processor.take())
        else {
            return Err(Error::InvalidState {
                operation: "start",
                state: self.state,
            });
        };

        match self.host.start(input, output, processor) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = EngineState::Streaming;
                info!("Stream started");
                Ok(())
            }
            Err(e) => {
                // The host dropped the processor; rebuild so a later start can retry.
                self.processor = Some(StreamProcessor::new(config, Arc::clone(&self.params)));
                Err(e)
            }
        }
    }

    /// Idempotent. The engine is `Stopped` afterwards even if the host reports an error.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            EngineState::Stopped => {
                debug!("Engine already stopped");
                Ok(())
            }
            EngineState::Opened => {
                self.state = EngineState::Stopped;
                Ok(())
            }
            EngineState::Streaming => {
                self.state = EngineState::Stopped;
                let Some(stream) = self.stream.take() else {
                    return Ok(());
                };

                match self.host.stop(stream) {
                    Ok(processor) => {
                        self.processor = Some(processor);
                        info!("Stream stopped");
                        Ok(())
                    }
                    Err(e) => {
                        error!("Failed to stop stream cleanly: {e}");
                        Err(e)
                    }
                }
            }
            state => Err(Error::InvalidState {
                operation: "stop",
                state,
            }),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        self.require("close", EngineState::Stopped)?;

        self.host.close();
        self.processor = None;
        self.devices = None;
        self.state = EngineState::Closed;
        info!("Stream closed");

        Ok(())
    }

    /// `stop` then `close`, both attempted; the first error wins.
    pub fn shutdown(&mut self) -> Result<()> {
        let stopped = self.stop();
        let closed = self.close();
        stopped.and(closed)
    }

    /// Blocks until a shutdown event arrives, then stops and closes the stream.
    ///
    /// A disconnected channel counts as [`ControlEvent::Quit`].
    pub fn run_until(&mut self, events: &Receiver<ControlEvent>) -> Result<ControlEvent> {
        let event = match events.recv() {
            Ok(event) => event,
            Err(e) => {
                warn!("Control channel closed: {e}");
                ControlEvent::Quit
            }
        };
        info!("Shutting down: {event}");

        self.shutdown()?;
        Ok(event)
    }

    /// Runs one buffer through the chain outside the host's callback.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<()> {
        match (self.state, self.processor.as_mut()) {
            (EngineState::Opened | EngineState::Stopped, Some(processor)) => {
                processor.process(input, output)
            }
            (state, _) => Err(Error::InvalidState {
                operation: "process",
                state,
            }),
        }
    }
}

impl<H: AudioHost> Drop for AudioEngine<H> {
    fn drop(&mut self) {
        if matches!(
            self.state,
            EngineState::Opened | EngineState::Streaming | EngineState::Stopped
        ) {
            debug!("Shutting down engine on drop");
            if let Err(e) = self.shutdown() {
                error!("Failed to shut down engine: {e}");
            }
        }
    }
}
