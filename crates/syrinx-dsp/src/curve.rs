/// Time-varying bifurcation parameters alpha(t), beta(t).
///
/// alpha(t) = a0 + a1*t + a2*t^2 over the waveform's own time base.
///
/// beta(t) follows the shape of the fundamental-frequency contour: the pitch
/// track is fitted with a least-squares polynomial (degree 10 for a whole
/// syllable, degree 1 for a short chunk), resampled to the waveform length,
/// scaled by 1e-4 and passed through b0 + b1*y + b2*y^2.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SyrinxError};

/// Scale applied to the fitted pitch contour (Hz) before the beta quadratic.
const PITCH_SCALE: f64 = 1e-4;

/// Fitted gesture coefficients. `gamma` is the oscillator time scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlParameters {
    pub a: [f64; 3],
    pub b: [f64; 3],
    pub gamma: f64,
}

impl Default for ControlParameters {
    /// Starting point of the fit: a slow alpha ramp, beta tracking pitch.
    fn default() -> Self {
        Self {
            a: [0.11, 0.05, 0.0],
            b: [-0.1, 1.0, 0.0],
            gamma: 4e4,
        }
    }
}

impl ControlParameters {
    /// Constant alpha and beta for the whole segment.
    pub fn constant(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self {
            a: [alpha, 0.0, 0.0],
            b: [beta, 0.0, 0.0],
            gamma,
        }
    }
}

/// Segment classification. Selects the degree of the pitch-contour fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    #[serde(rename = "syllable-like")]
    Syllable,
    #[serde(rename = "chunk-like")]
    Chunk,
}

const FIT_DEGREES: [(SegmentKind, usize); 2] = [(SegmentKind::Syllable, 10), (SegmentKind::Chunk, 1)];

impl SegmentKind {
    pub fn fit_degree(self) -> usize {
        FIT_DEGREES[self as usize].1
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Syllable => "syllable-like",
            Self::Chunk => "chunk-like",
        }
    }
}

impl FromStr for SegmentKind {
    type Err = SyrinxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "syllable-like" => Ok(Self::Syllable),
            "chunk-like" => Ok(Self::Chunk),
            other => Err(SyrinxError::UnknownSegmentKind(other.to_string())),
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Power series in the scaled variable u = (2x - (lo + hi)) / (hi - lo),
/// which keeps the degree-10 Vandermonde system well conditioned.
#[derive(Debug, Clone)]
pub struct Polynomial {
    coeffs: Vec<f64>,
    domain: (f64, f64),
}

impl Polynomial {
    /// Least-squares fit of `y` against `x` (Householder QR).
    ///
    /// With fewer points than `degree + 1` the degree drops to `points - 1`,
    /// so a short contour is interpolated instead of rejected.
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Result<Self> {
        if x.len() != y.len() {
            return Err(SyrinxError::LengthMismatch {
                what: "pitch contour time base",
                expected: y.len(),
                actual: x.len(),
            });
        }
        let m = x.len();
        if m == 0 {
            return Err(SyrinxError::ContourTooShort { points: m, degree });
        }
        let n = if m < degree + 1 {
            warn!(points = m, degree, reduced = m - 1, "pitch contour shorter than the fit degree; lowering degree");
            m
        } else {
            degree + 1
        };

        let lo = x.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(hi > lo) {
            return Err(SyrinxError::SingularFit);
        }
        let domain = (lo, hi);

        // Row-major m x n Vandermonde in the scaled variable.
        let mut a = vec![0.0f64; m * n];
        for (i, &xi) in x.iter().enumerate() {
            let u = map_to_window(xi, domain);
            let mut p = 1.0;
            for j in 0..n {
                a[i * n + j] = p;
                p *= u;
            }
        }
        let mut b = y.to_vec();

        let tol = 1e-12 * (m as f64).sqrt();
        for k in 0..n {
            let norm = (k..m).map(|i| a[i * n + k].powi(2)).sum::<f64>().sqrt();
            if norm <= tol {
                return Err(SyrinxError::SingularFit);
            }
            let alpha = if a[k * n + k] > 0.0 { -norm } else { norm };
            let mut v: Vec<f64> = (k..m).map(|i| a[i * n + k]).collect();
            v[0] -= alpha;
            let v_norm2: f64 = v.iter().map(|e| e * e).sum();
            if v_norm2 == 0.0 {
                continue;
            }
            for j in k..n {
                let s = 2.0 * (k..m).map(|i| v[i - k] * a[i * n + j]).sum::<f64>() / v_norm2;
                for i in k..m {
                    a[i * n + j] -= s * v[i - k];
                }
            }
            let s = 2.0 * (k..m).map(|i| v[i - k] * b[i]).sum::<f64>() / v_norm2;
            for i in k..m {
                b[i] -= s * v[i - k];
            }
        }

        // Back-substitute R c = Q^T y.
        let mut coeffs = vec![0.0f64; n];
        for k in (0..n).rev() {
            let mut acc = b[k];
            for j in k + 1..n {
                acc -= a[k * n + j] * coeffs[j];
            }
            coeffs[k] = acc / a[k * n + k];
        }

        Ok(Self { coeffs, domain })
    }

    pub fn eval(&self, x: f64) -> f64 {
        let u = map_to_window(x, self.domain);
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * u + c)
    }

    /// Evaluate on `n` evenly spaced points spanning the fit domain.
    pub fn linspace(&self, n: usize) -> Vec<f64> {
        let (lo, hi) = self.domain;
        linspace(lo, hi, n).into_iter().map(|x| self.eval(x)).collect()
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }
}

fn map_to_window(x: f64, (lo, hi): (f64, f64)) -> f64 {
    (2.0 * x - (lo + hi)) / (hi - lo)
}

/// `n` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// alpha(t) and beta(t) sampled at the audio rate, one value per output sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlCurve {
    pub alpha: Vec<f64>,
    pub beta: Vec<f64>,
}

impl ControlCurve {
    /// Build the curves for a waveform of `n_samples` at `sample_rate`.
    ///
    /// - `ff_time`, `ff`: the reference pitch track (s, Hz)
    /// - `kind`: selects the fit degree
    pub fn derive(
        params: &ControlParameters,
        kind: SegmentKind,
        ff_time: &[f64],
        ff: &[f64],
        n_samples: usize,
        sample_rate: f64,
    ) -> Result<Self> {
        let duration = n_samples as f64 / sample_rate;
        let [a0, a1, a2] = params.a;
        let alpha = linspace(0.0, duration, n_samples)
            .into_iter()
            .map(|t| a0 + a1 * t + a2 * t * t)
            .collect();

        let poly = Polynomial::fit(ff_time, ff, kind.fit_degree())?;
        let [b0, b1, b2] = params.b;
        let beta = poly
            .linspace(n_samples)
            .into_iter()
            .map(|f| {
                let y = PITCH_SCALE * f;
                b0 + b1 * y + b2 * y * y
            })
            .collect();

        Ok(Self { alpha, beta })
    }

    /// Flat curves, for synthesizing without a pitch track.
    pub fn constant(alpha: f64, beta: f64, n_samples: usize) -> Self {
        Self {
            alpha: vec![alpha; n_samples],
            beta: vec![beta; n_samples],
        }
    }

    pub fn len(&self) -> usize {
        self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }
}
