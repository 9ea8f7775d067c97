//! Reference feature extractor: STFT-based analysis of a syllable.
//!
//! All frame features use a periodic Hann window without centring, so the
//! number of frames only depends on the sample count:
//!   frames = 1 + (len - frame) / hop
//!
//! - spectrogram / spectrogram_db: |STFT| at n_fft/4 hop, dB relative to max,
//!   floored at `top_db` below the peak
//! - ff_coef, f_msf, centroid, rms: n_fft frames at n_fft/2 hop
//! - mel: HTK-scale triangular filters over `flim`, Slaney area-normalized,
//!   applied to |STFT|^2
//! - mfcc: orthonormal DCT-II of the mel spectrogram in dB
//! - ff: YIN over `pitch_frame` frames, search range `flim`
//! - envelope: block maxima of |x| over `envelope_block` samples, linearly
//!   interpolated back to sample times

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::curve::linspace;
use crate::error::{Result, SyrinxError};
use crate::features::{AcousticFeatures, FeatureExtractor};

const AMPLITUDE_FLOOR: f64 = 1e-5;
const POWER_FLOOR: f64 = 1e-10;

pub struct SpectralAnalyzer {
    config: AnalysisConfig,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
}

impl SpectralAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(config.n_fft);
        let window = hann(config.n_fft);
        Self {
            config,
            fft,
            window,
        }
    }

    /// |STFT| as (n_fft/2 + 1, frames).
    fn magnitude_spectrogram(&self, x: &[f64], hop: usize) -> Result<Array2<f64>> {
        let n = self.config.n_fft;
        let bins = n / 2 + 1;
        let frames = frame_count(x.len(), n, hop)?;
        let mut out = Array2::<f64>::zeros((bins, frames));
        let mut buf = vec![Complex64::new(0.0, 0.0); n];
        for f in 0..frames {
            let start = f * hop;
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = Complex64::new(x[start + i] * self.window[i], 0.0);
            }
            self.fft.process(&mut buf);
            for b in 0..bins {
                out[[b, f]] = buf[b].norm();
            }
        }
        Ok(out)
    }

    fn rms(&self, x: &[f64]) -> Result<Vec<f64>> {
        let n = self.config.n_fft;
        let hop = self.config.feature_hop;
        let frames = frame_count(x.len(), n, hop)?;
        Ok((0..frames)
            .map(|f| {
                let frame = &x[f * hop..f * hop + n];
                (frame.iter().map(|s| s * s).sum::<f64>() / n as f64).sqrt()
            })
            .collect())
    }

    /// YIN fundamental frequency, one value per `pitch_frame` frame.
    fn yin(&self, x: &[f64], sample_rate: f64) -> Result<Vec<f64>> {
        let frame = self.config.pitch_frame;
        let hop = self.config.feature_hop;
        let win = frame / 2;
        let (fmin, fmax) = self.config.flim;
        let min_period = ((sample_rate / fmax).floor() as usize).max(1);
        let max_period = ((sample_rate / fmin).ceil() as usize).min(frame - win);
        if min_period + 1 >= max_period {
            return Err(SyrinxError::InvalidConfig(format!(
                "pitch range {fmin}-{fmax} Hz leaves no lags at {sample_rate} Hz"
            )));
        }
        let frames = frame_count(x.len(), frame, hop)?;
        let threshold = self.config.yin_threshold;

        let mut diff = vec![0.0f64; max_period + 1];
        let mut cmnd = vec![1.0f64; max_period + 1];
        let mut ff = Vec::with_capacity(frames);
        for f in 0..frames {
            let seg = &x[f * hop..f * hop + frame];
            for tau in 1..=max_period {
                diff[tau] = (0..win).map(|j| (seg[j] - seg[j + tau]).powi(2)).sum();
            }
            let mut running = 0.0;
            for tau in 1..=max_period {
                running += diff[tau];
                cmnd[tau] = if running > 0.0 {
                    diff[tau] * tau as f64 / running
                } else {
                    1.0
                };
            }

            // First trough under the threshold, else the global minimum.
            let trough = (min_period + 1..max_period)
                .find(|&t| cmnd[t] < threshold && cmnd[t] <= cmnd[t - 1] && cmnd[t] <= cmnd[t + 1]);
            let best = trough.unwrap_or_else(|| {
                (min_period..=max_period)
                    .min_by(|&a, &b| cmnd[a].total_cmp(&cmnd[b]))
                    .unwrap_or(min_period)
            });

            let period = refine_peak(&cmnd, best);
            ff.push(sample_rate / period);
        }
        Ok(ff)
    }
}

impl FeatureExtractor for SpectralAnalyzer {
    fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn extract(&self, samples: &[f64], sample_rate: f64) -> Result<AcousticFeatures> {
        let cfg = &self.config;
        cfg.validate(sample_rate)?;
        if cfg.flim.0 >= sample_rate / 2.0 {
            return Err(SyrinxError::InvalidConfig(format!(
                "lower band edge {} Hz is above Nyquist for {sample_rate} Hz",
                cfg.flim.0
            )));
        }
        let longest = cfg.n_fft.max(cfg.pitch_frame);
        if samples.len() < longest {
            return Err(SyrinxError::SignalTooShort {
                samples: samples.len(),
                frame: longest,
            });
        }

        let time = linspace(0.0, samples.len() as f64 / sample_rate, samples.len());
        let last_time = time.last().copied().unwrap_or(0.0);

        let envelope = envelope(samples, cfg.envelope_block, &time, sample_rate);

        let spectrogram = self.magnitude_spectrogram(samples, cfg.spectrogram_hop)?;
        let spectrogram_db = amplitude_to_db(&spectrogram, cfg.top_db);

        let ff_coef = self.magnitude_spectrogram(samples, cfg.feature_hop)?;
        let frames = ff_coef.ncols();
        let freqs: Vec<f64> = (0..ff_coef.nrows())
            .map(|b| b as f64 * sample_rate / cfg.n_fft as f64)
            .collect();
        let f_msf = weighted_mean_frequency(&ff_coef, &freqs);
        // The spectral centroid over the same magnitude STFT is this same
        // weighted mean, so deltaCentroid always equals deltaF_msf.
        let centroid = f_msf.clone();
        let rms = self.rms(samples)?;

        let fb = mel_filterbank(sample_rate, cfg.n_fft, cfg.n_mels, cfg.flim);
        let mel = fb.dot(&ff_coef.mapv(|m| m * m));
        let mfcc = dct_ortho(&power_to_db(&mel, cfg.top_db), cfg.n_mfcc);

        let ff = self.yin(samples, sample_rate)?;
        let ff_time = linspace(0.0, last_time, ff.len());
        let frame_time = linspace(0.0, last_time, frames);

        let sci = f_msf
            .iter()
            .zip(&frame_time)
            .map(|(&f, &t)| {
                let pitch = interp(t, &ff_time, &ff);
                if pitch > 0.0 && pitch.is_finite() { f / pitch } else { 0.0 }
            })
            .collect();

        debug!(
            samples = samples.len(),
            frames,
            pitch_frames = ff.len(),
            "extracted acoustic features"
        );

        Ok(AcousticFeatures {
            envelope,
            ff,
            ff_time,
            frame_time,
            spectrogram,
            spectrogram_db,
            ff_coef,
            mel,
            mfcc,
            centroid,
            rms,
            f_msf,
            sci,
        })
    }
}

fn frame_count(len: usize, frame: usize, hop: usize) -> Result<usize> {
    if len < frame {
        return Err(SyrinxError::SignalTooShort {
            samples: len,
            frame,
        });
    }
    Ok(1 + (len - frame) / hop)
}

/// Periodic Hann window.
fn hann(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Parabolic refinement of a minimum at `i`.
fn refine_peak(y: &[f64], i: usize) -> f64 {
    if i == 0 || i + 1 >= y.len() {
        return i as f64;
    }
    let (a, b, c) = (y[i - 1], y[i], y[i + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < 1e-12 {
        return i as f64;
    }
    let shift = 0.5 * (a - c) / denom;
    i as f64 + shift.clamp(-1.0, 1.0)
}

/// Linear interpolation with end clamping. `xp` must be increasing.
pub(crate) fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    match xp.len() {
        0 => 0.0,
        1 => fp[0],
        n => {
            if x <= xp[0] {
                return fp[0];
            }
            if x >= xp[n - 1] {
                return fp[n - 1];
            }
            let hi = xp.partition_point(|&v| v < x).clamp(1, n - 1);
            let lo = hi - 1;
            let span = xp[hi] - xp[lo];
            if span <= 0.0 {
                return fp[lo];
            }
            fp[lo] + (fp[hi] - fp[lo]) * (x - xp[lo]) / span
        }
    }
}

fn envelope(x: &[f64], block: usize, time: &[f64], sample_rate: f64) -> Vec<f64> {
    let peaks: Vec<f64> = x
        .chunks(block)
        .map(|c| c.iter().map(|s| s.abs()).fold(0.0f64, f64::max))
        .collect();
    let step = x.len() as f64 / sample_rate / peaks.len() as f64;
    let mut t_env: Vec<f64> = (0..peaks.len()).map(|k| k as f64 * step).collect();
    if let (Some(last), Some(&end)) = (t_env.last_mut(), time.last()) {
        *last = end;
    }
    time.iter().map(|&t| interp(t, &t_env, &peaks)).collect()
}

fn weighted_mean_frequency(mags: &Array2<f64>, freqs: &[f64]) -> Vec<f64> {
    mags.columns()
        .into_iter()
        .map(|col| {
            let total: f64 = col.iter().sum();
            if total > 0.0 {
                col.iter().zip(freqs).map(|(m, f)| m * f).sum::<f64>() / total
            } else {
                0.0
            }
        })
        .collect()
}

fn amplitude_to_db(mags: &Array2<f64>, top_db: f64) -> Array2<f64> {
    let peak = mags.iter().copied().fold(0.0f64, f64::max).max(AMPLITUDE_FLOOR);
    let ref_db = 20.0 * peak.log10();
    let db = mags.mapv(|m| 20.0 * m.max(AMPLITUDE_FLOOR).log10() - ref_db);
    let floor = db.iter().copied().fold(f64::NEG_INFINITY, f64::max) - top_db;
    db.mapv(|v| v.max(floor))
}

fn power_to_db(power: &Array2<f64>, top_db: f64) -> Array2<f64> {
    let db = power.mapv(|p| 10.0 * p.max(POWER_FLOOR).log10());
    let floor = db.iter().copied().fold(f64::NEG_INFINITY, f64::max) - top_db;
    db.mapv(|v| v.max(floor))
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// (n_mels, n_fft/2 + 1) triangular filterbank.
fn mel_filterbank(sample_rate: f64, n_fft: usize, n_mels: usize, (fmin, fmax): (f64, f64)) -> Array2<f64> {
    let bins = n_fft / 2 + 1;
    let fmax = fmax.min(sample_rate / 2.0);
    let (lo, hi) = (hz_to_mel(fmin), hz_to_mel(fmax));
    let edges: Vec<f64> = linspace(lo, hi, n_mels + 2).into_iter().map(mel_to_hz).collect();

    let mut fb = Array2::<f64>::zeros((n_mels, bins));
    for m in 0..n_mels {
        let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
        let norm = 2.0 / (right - left);
        for b in 0..bins {
            let f = b as f64 * sample_rate / n_fft as f64;
            let rise = (f - left) / (center - left);
            let fall = (right - f) / (right - center);
            let w = rise.min(fall).max(0.0);
            fb[[m, b]] = w * norm;
        }
    }
    fb
}

/// First `n_coeffs` rows of the orthonormal DCT-II along axis 0.
fn dct_ortho(x: &Array2<f64>, n_coeffs: usize) -> Array2<f64> {
    let (n, frames) = x.dim();
    let mut out = Array2::<f64>::zeros((n_coeffs, frames));
    let scale0 = (1.0 / n as f64).sqrt();
    let scale = (2.0 / n as f64).sqrt();
    for k in 0..n_coeffs {
        let s = if k == 0 { scale0 } else { scale };
        let basis: Vec<f64> = (0..n)
            .map(|i| (PI * k as f64 * (2 * i + 1) as f64 / (2 * n) as f64).cos())
            .collect();
        for f in 0..frames {
            let acc: f64 = (0..n).map(|i| x[[i, f]] * basis[i]).sum();
            out[[k, f]] = s * acc;
        }
    }
    out
}
