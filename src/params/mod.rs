use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::error::{Error, Result};

/// A point-in-time copy of every effect parameter, taken once per buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub gain: f32,
    pub distortion_amount: f32,
    pub noise_gate_threshold: f32,
    pub pre_eq_freq_hz: f32,
    pub post_eq_low_hz: f32,
    pub post_eq_high_hz: f32,
    pub pre_eq_enabled: bool,
    pub cabinet_enabled: bool,
    pub post_eq_enabled: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            gain: 1.0,
            distortion_amount: 0.0,
            noise_gate_threshold: 0.0,
            pre_eq_freq_hz: 2000.0,
            post_eq_low_hz: 100.0,
            post_eq_high_hz: 5000.0,
            pre_eq_enabled: false,
            cabinet_enabled: false,
            post_eq_enabled: false,
        }
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on_off = |enabled: bool| if enabled { "on" } else { "off" };

        writeln!(f, "Gain: {}", self.gain)?;
        writeln!(f, "Distortion: {}", self.distortion_amount)?;
        writeln!(f, "Noise Gate Threshold: {}", self.noise_gate_threshold)?;
        writeln!(
            f,
            "Pre EQ: {} Hz ({})",
            self.pre_eq_freq_hz,
            on_off(self.pre_eq_enabled)
        )?;
        writeln!(f, "Cabinet: {}", on_off(self.cabinet_enabled))?;
        write!(
            f,
            "Post EQ: {}-{} Hz ({})",
            self.post_eq_low_hz,
            self.post_eq_high_hz,
            on_off(self.post_eq_enabled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Gain,
    DistortionAmount,
    NoiseGateThreshold,
    PreEqFreq,
    PostEqLow,
    PostEqHigh,
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gain => "gain",
            Self::DistortionAmount => "distortion",
            Self::NoiseGateThreshold => "noise gate threshold",
            Self::PreEqFreq => "pre EQ frequency",
            Self::PostEqLow => "post EQ low cutoff",
            Self::PostEqHigh => "post EQ high cutoff",
        };
        f.write_str(name)
    }
}

/// Stages of the chain that can be switched in and out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalStage {
    PreEqualizer,
    Cabinet,
    PostEqualizer,
}

impl fmt::Display for OptionalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreEqualizer => "pre EQ",
            Self::Cabinet => "cabinet",
            Self::PostEqualizer => "post EQ",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterUpdate {
    Set { field: Parameter, value: f32 },
    PostEqBand { low: f32, high: f32 },
    Toggle { stage: OptionalStage, enabled: bool },
}

impl fmt::Display for ParameterUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set { field, value } => write!(f, "{field} set to {value}"),
            Self::PostEqBand { low, high } => write!(f, "post EQ band set to {low}-{high} Hz"),
            Self::Toggle { stage, enabled } => {
                write!(f, "{stage} {}", if *enabled { "enabled" } else { "disabled" })
            }
        }
    }
}

/// f32 stored as raw bits.
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

const fn pack_band(low: f32, high: f32) -> u64 {
    ((high.to_bits() as u64) << 32) | low.to_bits() as u64
}

const fn unpack_band(bits: u64) -> (f32, f32) {
    (f32::from_bits(bits as u32), f32::from_bits((bits >> 32) as u32))
}

/// Shared effect parameters.
///
/// Each field is its own atomic so the control thread can update one value while the audio
/// thread reads the others without either side blocking. The post EQ band is packed into a
/// single word so a reader never sees a low cutoff from one update paired with the high cutoff
/// of another.
pub struct ParameterStore {
    gain: AtomicF32,
    distortion_amount: AtomicF32,
    noise_gate_threshold: AtomicF32,
    pre_eq_freq_hz: AtomicF32,
    post_eq_band: AtomicU64,
    pre_eq_enabled: AtomicBool,
    cabinet_enabled: AtomicBool,
    post_eq_enabled: AtomicBool,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::from_valid(Parameters::default())
    }
}

impl ParameterStore {
    pub fn new(initial: Parameters) -> Result<Self> {
        check_level(Parameter::Gain, initial.gain)?;
        check_level(Parameter::DistortionAmount, initial.distortion_amount)?;
        check_level(Parameter::NoiseGateThreshold, initial.noise_gate_threshold)?;
        check_frequency(Parameter::PreEqFreq, initial.pre_eq_freq_hz)?;
        check_band(initial.post_eq_low_hz, initial.post_eq_high_hz)?;

        Ok(Self::from_valid(initial))
    }

    fn from_valid(p: Parameters) -> Self {
        Self {
            gain: AtomicF32::new(p.gain),
            distortion_amount: AtomicF32::new(p.distortion_amount),
            noise_gate_threshold: AtomicF32::new(p.noise_gate_threshold),
            pre_eq_freq_hz: AtomicF32::new(p.pre_eq_freq_hz),
            post_eq_band: AtomicU64::new(pack_band(p.post_eq_low_hz, p.post_eq_high_hz)),
            pre_eq_enabled: AtomicBool::new(p.pre_eq_enabled),
            cabinet_enabled: AtomicBool::new(p.cabinet_enabled),
            post_eq_enabled: AtomicBool::new(p.post_eq_enabled),
        }
    }

    /// Lock-free snapshot, safe to call from the audio thread.
    pub fn get(&self) -> Parameters {
        let (post_eq_low_hz, post_eq_high_hz) =
            unpack_band(self.post_eq_band.load(Ordering::Acquire));

        Parameters {
            gain: self.gain.load(),
            distortion_amount: self.distortion_amount.load(),
            noise_gate_threshold: self.noise_gate_threshold.load(),
            pre_eq_freq_hz: self.pre_eq_freq_hz.load(),
            post_eq_low_hz,
            post_eq_high_hz,
            pre_eq_enabled: self.pre_eq_enabled.load(Ordering::Acquire),
            cabinet_enabled: self.cabinet_enabled.load(Ordering::Acquire),
            post_eq_enabled: self.post_eq_enabled.load(Ordering::Acquire),
        }
    }

    pub fn set(&self, field: Parameter, value: f32) -> Result<()> {
        match field {
            Parameter::Gain => {
                check_level(field, value)?;
                self.gain.store(value);
            }
            Parameter::DistortionAmount => {
                check_level(field, value)?;
                self.distortion_amount.store(value);
            }
            Parameter::NoiseGateThreshold => {
                check_level(field, value)?;
                self.noise_gate_threshold.store(value);
            }
            Parameter::PreEqFreq => {
                check_frequency(field, value)?;
                self.pre_eq_freq_hz.store(value);
            }
            Parameter::PostEqLow => {
                check_frequency(field, value)?;
                self.update_band(field, |(_, high)| (value < high).then_some((value, high)))?;
            }
            Parameter::PostEqHigh => {
                check_frequency(field, value)?;
                self.update_band(field, |(low, _)| (low < value).then_some((low, value)))?;
            }
        }

        Ok(())
    }

    pub fn set_post_eq_band(&self, low: f32, high: f32) -> Result<()> {
        check_band(low, high)?;
        self.post_eq_band.store(pack_band(low, high), Ordering::Release);
        Ok(())
    }

    pub fn set_enabled(&self, stage: OptionalStage, enabled: bool) {
        let flag = match stage {
            OptionalStage::PreEqualizer => &self.pre_eq_enabled,
            OptionalStage::Cabinet => &self.cabinet_enabled,
            OptionalStage::PostEqualizer => &self.post_eq_enabled,
        };
        flag.store(enabled, Ordering::Release);
    }

    pub fn apply(&self, update: &ParameterUpdate) -> Result<()> {
        match *update {
            ParameterUpdate::Set { field, value } => self.set(field, value),
            ParameterUpdate::PostEqBand { low, high } => self.set_post_eq_band(low, high),
            ParameterUpdate::Toggle { stage, enabled } => {
                self.set_enabled(stage, enabled);
                Ok(())
            }
        }
    }

    fn update_band(
        &self,
        field: Parameter,
        f: impl Fn((f32, f32)) -> Option<(f32, f32)>,
    ) -> Result<()> {
        self.post_eq_band
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                f(unpack_band(bits)).map(|(low, high)| pack_band(low, high))
            })
            .map(|_| ())
            .map_err(|_| Error::invalid_value(field, "low cutoff must stay below high cutoff"))
    }
}

fn check_level(field: Parameter, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_value(
            field,
            format!("{value} is not a finite value >= 0"),
        ))
    }
}

fn check_frequency(field: Parameter, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_value(
            field,
            format!("{value} Hz is not a positive frequency"),
        ))
    }
}

fn check_band(low: f32, high: f32) -> Result<()> {
    check_frequency(Parameter::PostEqLow, low)?;
    check_frequency(Parameter::PostEqHigh, high)?;
    if low < high {
        Ok(())
    } else {
        Err(Error::invalid_value(
            "post EQ band",
            format!("low cutoff {low} Hz must be below high cutoff {high} Hz"),
        ))
    }
}
