use jack::{AsyncClient, Client, ClientOptions, Control, Frames, PortFlags, ProcessScope};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::audio::device::{Device, StreamConfig};
use crate::audio::host::AudioHost;
use crate::audio::ports::Ports;
use crate::audio::processor::StreamProcessor;
use crate::error::{Error, Result};

pub struct NotificationHandler {
    xruns: Arc<AtomicUsize>,
}

impl jack::NotificationHandler for NotificationHandler {
    fn sample_rate(&mut self, _: &Client, sample_rate: Frames) -> Control {
        debug!(">> JACK sample_rate changed to {sample_rate}");
        Control::Continue
    }

    fn xrun(&mut self, _: &Client) -> Control {
        self.xruns.fetch_add(1, Ordering::Relaxed);
        Control::Continue
    }
}

/// Counts buffers the callback answered with silence.
///
/// Only the first fault after a clean buffer is reported for logging, so a lasting fault
/// costs one log line instead of one per period.
pub struct FaultCounter {
    total: Arc<AtomicUsize>,
    in_fault: bool,
}

impl FaultCounter {
    pub const fn new(total: Arc<AtomicUsize>) -> Self {
        Self {
            total,
            in_fault: false,
        }
    }

    /// Returns true when this fault starts a new run.
    pub fn fault(&mut self) -> bool {
        self.total.fetch_add(1, Ordering::Relaxed);
        !std::mem::replace(&mut self.in_fault, true)
    }

    pub fn clear(&mut self) {
        self.in_fault = false;
    }
}

/// Real-time callback: interleaves the input ports, runs the processor, spreads the result
/// over the output ports. Faults are answered with silence; the callback always asks JACK
/// to continue.
pub struct ProcessHandler {
    ports: Ports,
    processor: StreamProcessor,
    faults: FaultCounter,
    channels: usize,
    input: Vec<f32>,
    output: Vec<f32>,
}

impl ProcessHandler {
    pub fn new(
        client: &Client,
        processor: StreamProcessor,
        faults: Arc<AtomicUsize>,
    ) -> Result<Self> {
        let channels = processor.config().channel_count;
        let ports = Ports::new(client, channels)?;
        let len = client.buffer_size() as usize * channels;

        Ok(Self {
            ports,
            processor,
            faults: FaultCounter::new(faults),
            channels,
            input: vec![0.0; len],
            output: vec![0.0; len],
        })
    }

    pub fn into_processor(self) -> StreamProcessor {
        self.processor
    }
}

impl jack::ProcessHandler for ProcessHandler {
    fn process(&mut self, _: &Client, ps: &ProcessScope) -> Control {
        let len = ps.n_frames() as usize * self.channels;
        if len > self.input.len() {
            if self.faults.fault() {
                error!("JACK period of {} frames exceeds scratch buffers", ps.n_frames());
            }
            self.ports.silence_output(ps);
            return Control::Continue;
        }

        let input = &mut self.input[..len];
        let output = &mut self.output[..len];
        self.ports.read_interleaved(ps, input);

        if let Err(e) = self.processor.process(input, output) {
            if self.faults.fault() {
                error!("Audio processing error, output silenced until it clears: {e}");
            }
            self.ports.silence_output(ps);
            return Control::Continue;
        }

        self.faults.clear();
        self.ports.write_interleaved(ps, output);
        Control::Continue
    }

    fn buffer_size(&mut self, _: &Client, frames: Frames) -> Control {
        warn!("buffer_size changed to {frames} frames");

        let len = frames as usize * self.channels;
        self.input.resize(len, 0.0);
        self.output.resize(len, 0.0);
        self.processor.update_buffer_frames(frames as usize);

        Control::Continue
    }
}

pub struct JackStream {
    active: AsyncClient<NotificationHandler, ProcessHandler>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct JackDevice {
    info: Device,
    capture: Vec<String>,
    playback: Vec<String>,
}

/// JACK as the host audio API. Devices are the clients owning physical ports, so
/// `system:capture_1` and `system:playback_1` both belong to device `system`.
pub struct JackHost {
    client_name: String,
    client: Option<Client>,
    devices: Vec<JackDevice>,
    xruns: Arc<AtomicUsize>,
    faults: Arc<AtomicUsize>,
}

impl JackHost {
    pub fn new(client_name: &str) -> Result<Self> {
        let (client, status) = Client::new(client_name, ClientOptions::NO_START_SERVER)?;
        debug!("JACK client '{}' created ({status:?})", client.name());

        let capture = client.ports(
            None,
            Some("audio"),
            PortFlags::IS_PHYSICAL | PortFlags::IS_OUTPUT,
        );
        let playback = client.ports(
            None,
            Some("audio"),
            PortFlags::IS_PHYSICAL | PortFlags::IS_INPUT,
        );
        let devices = group_ports(capture, playback);

        Ok(Self {
            client_name: client_name.to_string(),
            client: Some(client),
            devices,
            xruns: Arc::new(AtomicUsize::new(0)),
            faults: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn xruns(&self) -> usize {
        self.xruns.load(Ordering::Relaxed)
    }

    /// Buffers the callback silenced because processing failed.
    pub fn faults(&self) -> usize {
        self.faults.load(Ordering::Relaxed)
    }

    /// A failed start leaves ports registered or consumes the client; a fresh client lets the
    /// next start begin clean.
    fn reconnect(&mut self) {
        match Client::new(&self.client_name, ClientOptions::NO_START_SERVER) {
            Ok((client, _)) => self.client = Some(client),
            Err(e) => error!("Failed to reconnect to JACK: {e}"),
        }
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::Host("JACK client is not available".to_string()))
    }

    fn device(&self, index: usize) -> Result<&JackDevice> {
        self.devices
            .get(index)
            .ok_or_else(|| Error::DeviceUnavailable {
                reason: format!("no JACK device with index {index}"),
            })
    }

    fn connect(client: &Client, source: &str, destination: &str) {
        if let Err(e) = client.connect_ports_by_name(source, destination) {
            warn!("Failed to connect '{source}' -> '{destination}': {e}");
        } else {
            info!("Connected {source} -> {destination}");
        }
    }
}

impl AudioHost for JackHost {
    type Stream = JackStream;

    fn devices(&self) -> Result<Vec<Device>> {
        Ok(self.devices.iter().map(|d| d.info.clone()).collect())
    }

    /// The JACK server owns the sample rate; the buffer size is requested but may be refused.
    fn configure(
        &mut self,
        _input: &Device,
        _output: &Device,
        mut config: StreamConfig,
    ) -> Result<StreamConfig> {
        let client = self.client()?;

        if client.buffer_size() as usize != config.buffer_frames {
            if let Err(e) = client.set_buffer_size(config.buffer_frames as Frames) {
                warn!(
                    "Failed to set JACK buffer size to {} frames: {e}",
                    config.buffer_frames
                );
            }
        }

        let sample_rate = client.sample_rate();
        if sample_rate != config.sample_rate {
            warn!(
                "JACK runs at {sample_rate} Hz, requested {} Hz",
                config.sample_rate
            );
        }

        config.sample_rate = sample_rate;
        config.buffer_frames = client.buffer_size() as usize;
        Ok(config)
    }

    fn start(
        &mut self,
        input: &Device,
        output: &Device,
        processor: StreamProcessor,
    ) -> Result<JackStream> {
        let capture = self.device(input.index)?.capture.clone();
        let playback = self.device(output.index)?.playback.clone();

        let client = self
            .client
            .take()
            .ok_or_else(|| Error::Host("JACK client is already streaming".to_string()))?;

        let handler = match ProcessHandler::new(&client, processor, Arc::clone(&self.faults)) {
            Ok(handler) => handler,
            Err(e) => {
                drop(client);
                self.reconnect();
                return Err(e);
            }
        };
        let our_inputs = handler.ports.input_names().to_vec();
        let our_outputs = handler.ports.output_names().to_vec();

        let notifications = NotificationHandler {
            xruns: Arc::clone(&self.xruns),
        };
        let active = match client.activate_async(notifications, handler) {
            Ok(active) => active,
            Err(e) => {
                self.reconnect();
                return Err(e.into());
            }
        };

        let client = active.as_client();
        for (source, destination) in capture.iter().zip(&our_inputs) {
            Self::connect(client, source, destination);
        }
        for (source, destination) in our_outputs.iter().zip(&playback) {
            Self::connect(client, source, destination);
        }

        Ok(JackStream { active })
    }

    fn stop(&mut self, stream: JackStream) -> Result<StreamProcessor> {
        let (client, _, handler) = stream.active.deactivate()?;
        self.client = Some(client);
        Ok(handler.into_processor())
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            info!(
                "JACK client closed ({} xrun(s), {} silenced buffer(s) during the session)",
                self.xruns(),
                self.faults()
            );
        }
    }
}

/// Groups physical port names by their client prefix, in order of first appearance.
fn group_ports(capture: Vec<String>, playback: Vec<String>) -> Vec<JackDevice> {
    let mut devices: Vec<JackDevice> = Vec::new();

    let tagged = capture
        .into_iter()
        .map(|p| (p, true))
        .chain(playback.into_iter().map(|p| (p, false)));

    for (port, is_capture) in tagged {
        let name = port.split(':').next().unwrap_or_default().to_string();
        let position = match devices.iter().position(|d| d.info.name == name) {
            Some(position) => position,
            None => {
                devices.push(JackDevice {
                    info: Device {
                        index: devices.len(),
                        name,
                        max_input_channels: 0,
                        max_output_channels: 0,
                    },
                    capture: Vec::new(),
                    playback: Vec::new(),
                });
                devices.len() - 1
            }
        };

        let device = &mut devices[position];
        if is_capture {
            device.info.max_input_channels += 1;
            device.capture.push(port);
        } else {
            device.info.max_output_channels += 1;
            device.playback.push(port);
        }
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ports: &[&str]) -> Vec<String> {
        ports.iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn physical_ports_group_into_devices() {
        let devices = group_ports(
            names(&["system:capture_1", "system:capture_2", "usb:capture_1"]),
            names(&["system:playback_1", "system:playback_2", "hdmi:playback_1"]),
        );

        assert_eq!(devices.len(), 3);

        assert_eq!(devices[0].info.index, 0);
        assert_eq!(devices[0].info.name, "system");
        assert_eq!(devices[0].info.max_input_channels, 2);
        assert_eq!(devices[0].info.max_output_channels, 2);
        assert_eq!(devices[0].playback, names(&["system:playback_1", "system:playback_2"]));

        assert_eq!(devices[1].info.name, "usb");
        assert_eq!(devices[1].info.max_input_channels, 1);
        assert_eq!(devices[1].info.max_output_channels, 0);

        assert_eq!(devices[2].info.index, 2);
        assert_eq!(devices[2].info.name, "hdmi");
        assert_eq!(devices[2].info.max_input_channels, 0);
        assert_eq!(devices[2].capture, Vec::<String>::new());
    }

    #[test]
    fn lasting_fault_is_reported_once_but_fully_counted() {
        let total = Arc::new(AtomicUsize::new(0));
        let mut faults = FaultCounter::new(Arc::clone(&total));

        let reported: Vec<bool> = (0..47).map(|_| faults.fault()).collect();

        assert!(reported[0]);
        assert!(reported[1..].iter().all(|&r| !r));
        assert_eq!(total.load(Ordering::Relaxed), 47);
    }

    #[test]
    fn fault_after_clean_buffer_is_reported_again() {
        let total = Arc::new(AtomicUsize::new(0));
        let mut faults = FaultCounter::new(Arc::clone(&total));

        assert!(faults.fault());
        assert!(!faults.fault());
        faults.clear();
        assert!(faults.fault());
        assert_eq!(total.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn no_physical_ports_means_no_devices() {
        assert!(group_ports(Vec::new(), Vec::new()).is_empty());
    }
}
