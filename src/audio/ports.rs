use jack::{AudioIn, AudioOut, Client, Port, ProcessScope};

use crate::error::{Error, Result};

/// One JACK input and one output port per negotiated channel.
pub struct Ports {
    inputs: Vec<Port<AudioIn>>,
    outputs: Vec<Port<AudioOut>>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl Ports {
    pub fn new(client: &Client, channels: usize) -> Result<Self> {
        let mut ports = Self {
            inputs: Vec::with_capacity(channels),
            outputs: Vec::with_capacity(channels),
            input_names: Vec::with_capacity(channels),
            output_names: Vec::with_capacity(channels),
        };

        for ch in 1..=channels {
            let input = client
                .register_port(&format!("in_{ch}"), AudioIn::default())
                .map_err(|e| Error::Host(format!("failed to register in port {ch}: {e}")))?;
            let output = client
                .register_port(&format!("out_{ch}"), AudioOut::default())
                .map_err(|e| Error::Host(format!("failed to register out port {ch}: {e}")))?;

            ports.input_names.push(input.name()?);
            ports.output_names.push(output.name()?);
            ports.inputs.push(input);
            ports.outputs.push(output);
        }

        Ok(ports)
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Copies every input port into `dest` as interleaved frames.
    pub fn read_interleaved(&self, ps: &ProcessScope, dest: &mut [f32]) {
        let channels = self.inputs.len();
        for (ch, port) in self.inputs.iter().enumerate() {
            for (d, &s) in dest
                .iter_mut()
                .skip(ch)
                .step_by(channels)
                .zip(port.as_slice(ps))
            {
                *d = s;
            }
        }
    }

    /// Spreads interleaved frames from `src` over the output ports, zero-filling any tail.
    pub fn write_interleaved(&mut self, ps: &ProcessScope, src: &[f32]) {
        let channels = self.outputs.len();
        for (ch, port) in self.outputs.iter_mut().enumerate() {
            let out = port.as_mut_slice(ps);
            out.fill(0.0);
            for (o, &s) in out.iter_mut().zip(src.iter().skip(ch).step_by(channels)) {
                *o = s;
            }
        }
    }

    pub fn silence_output(&mut self, ps: &ProcessScope) {
        for port in &mut self.outputs {
            port.as_mut_slice(ps).fill(0.0);
        }
    }
}
