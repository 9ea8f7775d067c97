//! Fixed-step RK4 integration of the coupled syrinx model.
//!
//! State vector (x, y, p_out, i1, i2, i3): labial displacement and velocity,
//! integrated tract pressure, and the three acoustic currents. The labial pair
//! is autonomous; it feeds the tract through the source pressure
//! 0.5 * envelope * dy/dt, and the tract forces the acoustic block.
//!
//! Integration runs on an oversampled grid, `oversample` steps per audio
//! sample, dt = 1 / (oversample * fs). Step t reads alpha, beta and the
//! envelope at audio index t / oversample. Tract quantities are computed once
//! per step from the step-start state and held across the four RK4 stages;
//! the delay line is a causal buffer and cannot be rewound between stages.
//!
//! Audio sample n is `RB * tap(state)` at step n * oversample, so the output
//! always has exactly one sample per curve point.

use tracing::{debug, warn};

use crate::acoustic::AcousticSubsystem;
use crate::config::{OutputTap, SimulationConfig};
use crate::constants::PhysicalConstants;
use crate::curve::ControlCurve;
use crate::error::{Result, SyrinxError};
use crate::oscillator::Oscillator;
use crate::tract::TractDelayLine;

pub const STATE_DIM: usize = 6;
pub type State = [f64; STATE_DIM];

const X: usize = 0;
const Y: usize = 1;
const P_OUT: usize = 2;
const I1: usize = 3;
const I2: usize = 4;
const I3: usize = 5;

/// One classical Runge-Kutta step of `dv/dt = f(v)`.
pub fn rk4_step<const N: usize>(mut f: impl FnMut(&[f64; N]) -> [f64; N], v: &[f64; N], dt: f64) -> [f64; N] {
    let offset = |base: &[f64; N], k: &[f64; N], h: f64| -> [f64; N] {
        let mut out = *base;
        for i in 0..N {
            out[i] += h * k[i];
        }
        out
    };

    let k1 = f(v);
    let k2 = f(&offset(v, &k1, 0.5 * dt));
    let k3 = f(&offset(v, &k2, 0.5 * dt));
    let k4 = f(&offset(v, &k3, dt));

    let mut next = *v;
    for i in 0..N {
        next[i] += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
    next
}

/// Everything one run produces. Owned by the caller; nothing is shared
/// between runs.
#[derive(Debug, Clone)]
pub struct Integration {
    /// Synthetic pressure at the audio rate.
    pub waveform: Vec<f64>,
    /// State after every integrated step (empty when not kept).
    pub trajectory: Vec<State>,
    /// Forward tract pressure p_in per step.
    pub forward_pressure: Vec<f64>,
    /// Reflected tract pressure p_back per step.
    pub backward_pressure: Vec<f64>,
    pub delay_steps: usize,
    pub dt: f64,
    /// Steps actually integrated (less than the full run after a halt or a
    /// non-finite state).
    pub steps: usize,
    /// First step at which the divergence guard tripped or the state stopped
    /// being finite.
    pub diverged_at: Option<usize>,
}

impl Integration {
    pub fn diverged(&self) -> bool {
        self.diverged_at.is_some()
    }
}

/// The coupled oscillator + tract + acoustic model for one parameter set.
pub struct SyrinxModel {
    oscillator: Oscillator,
    acoustic: AcousticSubsystem,
    constants: PhysicalConstants,
}

impl SyrinxModel {
    pub fn new(gamma: f64, constants: &PhysicalConstants) -> Self {
        Self {
            oscillator: Oscillator::new(gamma),
            acoustic: AcousticSubsystem::new(constants),
            constants: *constants,
        }
    }

    /// Integrate over the curve's duration.
    ///
    /// - `curve`: alpha/beta at the audio rate
    /// - `envelope`: source amplitude at the audio rate, same length as `curve`
    /// - `sample_rate`: audio rate (Hz)
    pub fn integrate(
        &self,
        curve: &ControlCurve,
        envelope: &[f64],
        sample_rate: f64,
        config: &SimulationConfig,
    ) -> Result<Integration> {
        config.validate()?;
        self.constants.validate()?;
        if !(sample_rate > 0.0) {
            return Err(SyrinxError::InvalidConfig(format!(
                "sample rate must be positive, got {sample_rate}"
            )));
        }
        let n = curve.alpha.len();
        if curve.beta.len() != n {
            return Err(SyrinxError::LengthMismatch {
                what: "beta curve",
                expected: n,
                actual: curve.beta.len(),
            });
        }
        if envelope.len() != n {
            return Err(SyrinxError::LengthMismatch {
                what: "envelope",
                expected: n,
                actual: envelope.len(),
            });
        }

        let ovs = config.oversample;
        let total = n * ovs;
        let dt = 1.0 / (ovs as f64 * sample_rate);
        let delay = self.constants.delay_steps(dt);
        let rb = self.constants.beak_resistance;
        let mut tract = TractDelayLine::new(total, delay, self.constants.reflection, dt);
        debug!(
            samples = n,
            oversample = ovs,
            steps = total,
            delay = tract.delay(),
            dt,
            gamma = self.oscillator.gamma(),
            "integrating syrinx model"
        );
        let mut waveform = vec![0.0f64; n];
        let mut trajectory = Vec::with_capacity(if config.keep_trajectory { total } else { 0 });
        let mut v = config.initial_state;
        let mut diverged_at = None;
        let mut steps = total;

        for t in 0..total {
            let idx = t / ovs;
            if t % ovs == 0 {
                let sample = rb * match config.output_tap {
                    OutputTap::LabialVelocity => v[Y],
                    OutputTap::BeakCurrent => v[I3],
                };
                waveform[idx] = if sample.is_finite() { sample } else { 0.0 };
            }

            let alpha = curve.alpha[idx];
            let beta = curve.beta[idx];
            let source = 0.5 * envelope[idx] * self.oscillator.acceleration(v[X], v[Y], alpha, beta);
            let drive = tract.advance(t, source);

            let field = |s: &State| -> State {
                let [dx, dy] = self.oscillator.derivatives(s[X], s[Y], alpha, beta);
                let [di1, di2, di3] = self.acoustic.derivatives([s[I1], s[I2], s[I3]], drive);
                let mut d = [0.0; STATE_DIM];
                d[X] = dx;
                d[Y] = dy;
                d[P_OUT] = drive.dp_out;
                d[I1] = di1;
                d[I2] = di2;
                d[I3] = di3;
                d
            };
            v = rk4_step(field, &v, dt);
            if config.keep_trajectory {
                trajectory.push(v);
            }

            // Past a non-finite state nothing downstream is meaningful: stop
            // regardless of the guard and leave the rest of the waveform silent.
            if v.iter().any(|s| !s.is_finite()) {
                if diverged_at.is_none() {
                    warn!(step = t, "syrinx state became non-finite; remaining output left at zero");
                    diverged_at = Some(t);
                }
                steps = t + 1;
                break;
            }

            if let Some(guard) = &config.divergence {
                if v[Y].abs() > guard.threshold && diverged_at.is_none() {
                    warn!(step = t, velocity = v[Y], threshold = guard.threshold, "labial velocity diverged");
                    diverged_at = Some(t);
                    if guard.halt {
                        steps = t + 1;
                        break;
                    }
                }
            }
        }

        let delay_steps = tract.delay();
        let (forward_pressure, backward_pressure) = tract.into_buffers();
        Ok(Integration {
            waveform,
            trajectory,
            forward_pressure,
            backward_pressure,
            delay_steps,
            dt,
            steps,
            diverged_at,
        })
    }
}
