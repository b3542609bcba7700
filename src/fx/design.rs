use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

use crate::error::{Error, Result};

/// Highest Butterworth order the designer will produce.
pub const MAX_ORDER: usize = 8;

const IMAG_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    BandPass,
}

/// One second-order section, normalised so that `a0 == 1`.
///
/// `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        let num = z_inv * self.b1 + z_inv2 * self.b2 + self.b0;
        let den = z_inv * self.a1 + z_inv2 * self.a2 + 1.0;
        num / den
    }
}

/// Digital filter realised as a cascade of second-order sections.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    kind: FilterKind,
    order: usize,
    degree: usize,
    sample_rate: f64,
    sections: Vec<Biquad>,
}

impl Coefficients {
    pub const fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Butterworth order the filter was designed with. A band-pass of order N has 2N poles.
    pub const fn order(&self) -> usize {
        self.order
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Expanded `(b, a)` polynomials in powers of `z^-1`, `a[0] == 1`.
    pub fn transfer_function(&self) -> (Vec<f64>, Vec<f64>) {
        let mut b = vec![1.0];
        let mut a = vec![1.0];

        for s in &self.sections {
            b = poly_mul(&b, &[s.b0, s.b1, s.b2]);
            a = poly_mul(&a, &[1.0, s.a1, s.a2]);
        }

        b.truncate(self.degree + 1);
        a.truncate(self.degree + 1);
        (b, a)
    }

    /// Magnitude of the frequency response at `freq_hz`.
    pub fn magnitude_at(&self, freq_hz: f64) -> f64 {
        let w = 2.0 * PI * freq_hz / self.sample_rate;
        response_at(&self.sections, w).norm()
    }
}

/// Butterworth designer: analog prototype, optional low-pass to band-pass transform, then a
/// pre-warped bilinear transform into second-order sections.
pub struct FilterDesigner;

impl FilterDesigner {
    /// `cutoffs_hz` holds one frequency for [`FilterKind::LowPass`] and `[low, high]` for
    /// [`FilterKind::BandPass`]. Every cutoff must lie strictly between 0 and Nyquist.
    pub fn design(
        kind: FilterKind,
        order: usize,
        cutoffs_hz: &[f64],
        sample_rate_hz: f64,
    ) -> Result<Coefficients> {
        if order == 0 || order > MAX_ORDER {
            return Err(Error::InvalidFilterOrder { order });
        }

        let nyquist_hz = sample_rate_hz / 2.0;
        let in_range = |hz: f64| hz.is_finite() && hz > 0.0 && hz < nyquist_hz;

        let fs2 = 2.0 * sample_rate_hz;
        let warp = |hz: f64| fs2 * (PI * hz / sample_rate_hz).tan();

        let (analog_poles, zeros, reference_w): (Vec<Complex64>, Vec<f64>, f64) =
            match (kind, cutoffs_hz) {
                (FilterKind::LowPass, &[cutoff]) if in_range(cutoff) => {
                    let wc = warp(cutoff);
                    let poles = prototype_poles(order).map(|p| p * wc).collect();
                    (poles, vec![-1.0; order], 0.0)
                }
                (FilterKind::BandPass, &[low, high])
                    if in_range(low) && in_range(high) && low < high =>
                {
                    let (wl, wh) = (warp(low), warp(high));
                    let bw = wh - wl;
                    let w0 = (wl * wh).sqrt();

                    let poles = prototype_poles(order)
                        .flat_map(|p| {
                            let shifted = p * (bw / 2.0);
                            let spread = (shifted * shifted - w0 * w0).sqrt();
                            [shifted + spread, shifted - spread]
                        })
                        .collect();
                    // N zeros at DC and N at Nyquist, interleaved so each section gets one of each.
                    let zeros = (0..order).flat_map(|_| [1.0, -1.0]).collect();

                    (poles, zeros, 2.0 * (w0 / fs2).atan())
                }
                _ => {
                    return Err(Error::InvalidCutoff {
                        cutoffs_hz: cutoffs_hz.to_vec(),
                        nyquist_hz,
                    });
                }
            };

        let degree = analog_poles.len();
        let digital_poles: Vec<Complex64> = analog_poles
            .iter()
            .map(|&s| (s + fs2) / (-s + fs2))
            .collect();

        let mut zeros = zeros.into_iter();
        let mut sections: Vec<Biquad> = pair_poles(&digital_poles)
            .into_iter()
            .map(|(a1, a2, section_degree)| {
                let (b1, b2) = if section_degree == 2 {
                    let z1 = zeros.next().unwrap_or(-1.0);
                    let z2 = zeros.next().unwrap_or(-1.0);
                    (-(z1 + z2), z1 * z2)
                } else {
                    (-zeros.next().unwrap_or(-1.0), 0.0)
                };
                Biquad {
                    b0: 1.0,
                    b1,
                    b2,
                    a1,
                    a2,
                }
            })
            .collect();

        // Unity gain at DC for low-pass, at the band centre for band-pass.
        let gain = response_at(&sections, reference_w).norm().recip();
        if let Some(first) = sections.first_mut() {
            first.b0 *= gain;
            first.b1 *= gain;
            first.b2 *= gain;
        }

        Ok(Coefficients {
            kind,
            order,
            degree,
            sample_rate: sample_rate_hz,
            sections,
        })
    }
}

/// Poles of the normalised analog Butterworth low-pass prototype.
fn prototype_poles(order: usize) -> impl Iterator<Item = Complex64> {
    (0..order).map(move |k| {
        let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
        Complex64::from_polar(1.0, theta)
    })
}

/// Groups conjugate pairs (and leftover real poles) into `(a1, a2, degree)` denominators.
fn pair_poles(poles: &[Complex64]) -> Vec<(f64, f64, usize)> {
    let mut sections = Vec::with_capacity(poles.len().div_ceil(2));
    let mut real = Vec::new();

    for p in poles {
        if p.im > IMAG_EPSILON {
            sections.push((-2.0 * p.re, p.norm_sqr(), 2));
        } else if p.im.abs() <= IMAG_EPSILON {
            real.push(p.re);
        }
    }

    for pair in real.chunks(2) {
        match *pair {
            [r1, r2] => sections.push((-(r1 + r2), r1 * r2, 2)),
            [r] => sections.push((-r, 0.0, 1)),
            _ => {}
        }
    }

    sections
}

fn response_at(sections: &[Biquad], w: f64) -> Complex64 {
    let z_inv = Complex64::from_polar(1.0, -w);
    sections
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
}

fn poly_mul(lhs: &[f64], rhs: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; lhs.len() + rhs.len() - 1];
    for (i, &l) in lhs.iter().enumerate() {
        for (j, &r) in rhs.iter().enumerate() {
            out[i + j] += l * r;
        }
    }
    out
}
