use log::{debug, warn};

use crate::fx::design::{Coefficients, FilterDesigner, FilterKind};
use crate::fx::stages::Stage;
use crate::params::Parameters;

pub const PRE_EQ_ORDER: usize = 4;
pub const CABINET_ORDER: usize = 2;
pub const POST_EQ_ORDER: usize = 2;
pub const CABINET_CUTOFF_HZ: f32 = 5000.0;

/// Which parameters govern a filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRole {
    PreEqualizer,
    Cabinet,
    PostEqualizer,
}

impl FilterRole {
    const fn kind(self) -> FilterKind {
        match self {
            Self::PreEqualizer | Self::Cabinet => FilterKind::LowPass,
            Self::PostEqualizer => FilterKind::BandPass,
        }
    }

    const fn order(self) -> usize {
        match self {
            Self::PreEqualizer => PRE_EQ_ORDER,
            Self::Cabinet => CABINET_ORDER,
            Self::PostEqualizer => POST_EQ_ORDER,
        }
    }

    fn cutoffs(self, params: &Parameters) -> Option<Cutoffs> {
        match self {
            Self::PreEqualizer => params
                .pre_eq_enabled
                .then_some(Cutoffs::Single(params.pre_eq_freq_hz)),
            Self::Cabinet => params
                .cabinet_enabled
                .then_some(Cutoffs::Single(CABINET_CUTOFF_HZ)),
            Self::PostEqualizer => params
                .post_eq_enabled
                .then_some(Cutoffs::Band(params.post_eq_low_hz, params.post_eq_high_hz)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cutoffs {
    Single(f32),
    Band(f32, f32),
}

/// Delay line for one channel: two state words per second-order section.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    sections: Vec<[f64; 2]>,
}

impl FilterState {
    pub fn new(sections: usize) -> Self {
        Self {
            sections: vec![[0.0; 2]; sections],
        }
    }

    pub fn reset(&mut self) {
        self.sections.fill([0.0; 2]);
    }

    /// Transposed direct form II, one section after another.
    #[inline]
    pub fn process(&mut self, coefficients: &Coefficients, input: f64) -> f64 {
        let mut x = input;
        for (s, z) in coefficients.sections().iter().zip(self.sections.iter_mut()) {
            let y = s.b0.mul_add(x, z[0]);
            z[0] = s.b1.mul_add(x, -s.a1 * y) + z[1];
            z[1] = s.b2.mul_add(x, -s.a2 * y);
            x = y;
        }
        x
    }
}

/// Butterworth filter stage.
///
/// Coefficients are redesigned only when the governing frequency changes. An invalid
/// frequency leaves the stage bypassed until it changes again.
pub struct FilterStage {
    role: FilterRole,
    sample_rate: f32,
    channels: usize,
    designed_for: Option<Cutoffs>,
    coefficients: Option<Coefficients>,
    state: Vec<FilterState>,
    active: bool,
}

impl FilterStage {
    pub fn new(role: FilterRole, sample_rate: f32, channels: usize) -> Self {
        let channels = channels.max(1);
        Self {
            role,
            sample_rate,
            channels,
            designed_for: None,
            coefficients: None,
            state: vec![FilterState::default(); channels],
            active: false,
        }
    }

    pub fn coefficients(&self) -> Option<&Coefficients> {
        self.coefficients.as_ref()
    }

    fn redesign(&mut self, cutoffs: Cutoffs) {
        let sample_rate = f64::from(self.sample_rate);
        let result = match cutoffs {
            Cutoffs::Single(hz) => FilterDesigner::design(
                self.role.kind(),
                self.role.order(),
                &[f64::from(hz)],
                sample_rate,
            ),
            Cutoffs::Band(low, high) => FilterDesigner::design(
                self.role.kind(),
                self.role.order(),
                &[f64::from(low), f64::from(high)],
                sample_rate,
            ),
        };

        match result {
            Ok(coefficients) => {
                debug!("{} redesigned for {:?}", self.name(), cutoffs);
                let sections = coefficients.sections().len();
                for state in &mut self.state {
                    if state.sections.len() != sections {
                        *state = FilterState::new(sections);
                    }
                }
                self.coefficients = Some(coefficients);
            }
            Err(e) => {
                warn!("{} bypassed: {e}", self.name());
                self.coefficients = None;
            }
        }
    }
}

impl Stage for FilterStage {
    fn name(&self) -> &'static str {
        match self.role {
            FilterRole::PreEqualizer => "pre EQ",
            FilterRole::Cabinet => "cabinet",
            FilterRole::PostEqualizer => "post EQ",
        }
    }

    fn prepare(&mut self, params: &Parameters) -> bool {
        let Some(cutoffs) = self.role.cutoffs(params) else {
            self.active = false;
            return false;
        };

        if self.designed_for != Some(cutoffs) {
            self.designed_for = Some(cutoffs);
            self.redesign(cutoffs);
        }

        let ready = self.coefficients.is_some();
        if ready && !self.active {
            // Coming back from bypass: stale history would click.
            for state in &mut self.state {
                state.reset();
            }
        }
        self.active = ready;
        ready
    }

    fn process_block(&mut self, block: &mut [f32]) {
        let Some(coefficients) = &self.coefficients else {
            return;
        };

        for frame in block.chunks_exact_mut(self.channels) {
            for (sample, state) in frame.iter_mut().zip(self.state.iter_mut()) {
                *sample = state.process(coefficients, f64::from(*sample)) as f32;
            }
        }
    }

    fn reset(&mut self) {
        for state in &mut self.state {
            state.reset();
        }
    }
}
