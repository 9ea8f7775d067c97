//! Simulation, analysis and scoring configuration.
//!
//! Every struct deserializes from JSON with per-field defaults, so a config
//! file only needs to name the values it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyrinxError};

/// Which integrated state becomes the radiated audio sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputTap {
    /// Labial velocity `y` scaled by beak resistance.
    #[default]
    LabialVelocity,
    /// Beak current `i3` scaled by beak resistance.
    BeakCurrent,
}

/// Runaway detection on the labial velocity state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DivergenceGuard {
    /// |y| above this counts as divergence. A non-finite state always stops
    /// the run, guard or not.
    pub threshold: f64,
    /// Stop integrating at the first divergent step. Remaining output is zero.
    #[serde(default)]
    pub halt: bool,
}

impl Default for DivergenceGuard {
    fn default() -> Self {
        Self {
            threshold: 5e6,
            halt: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Integration steps per audio sample.
    #[serde(default = "SimulationConfig::default_oversample")]
    pub oversample: usize,
    /// (x, y, p_out, i1, i2, i3) at t = 0.
    #[serde(default = "SimulationConfig::default_initial_state")]
    pub initial_state: [f64; 6],
    #[serde(default)]
    pub output_tap: OutputTap,
    #[serde(default = "SimulationConfig::default_divergence")]
    pub divergence: Option<DivergenceGuard>,
    /// Keep every oversampled state. Off bounds memory for long syllables.
    #[serde(default = "SimulationConfig::default_keep_trajectory")]
    pub keep_trajectory: bool,
}

impl SimulationConfig {
    fn default_oversample() -> usize {
        20
    }
    fn default_initial_state() -> [f64; 6] {
        [1e-2, 1e-3, 1e-4, 1e-4, 1e-4, 1e-4]
    }
    fn default_divergence() -> Option<DivergenceGuard> {
        Some(DivergenceGuard::default())
    }
    fn default_keep_trajectory() -> bool {
        true
    }

    pub fn validate(&self) -> Result<()> {
        if self.oversample == 0 {
            return Err(SyrinxError::InvalidConfig("oversample must be >= 1".into()));
        }
        if self.initial_state.iter().any(|v| !v.is_finite()) {
            return Err(SyrinxError::InvalidConfig("initial state must be finite".into()));
        }
        if let Some(guard) = &self.divergence {
            if !(guard.threshold > 0.0) {
                return Err(SyrinxError::InvalidConfig(
                    "divergence threshold must be positive".into(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            oversample: Self::default_oversample(),
            initial_state: Self::default_initial_state(),
            output_tap: OutputTap::default(),
            divergence: Self::default_divergence(),
            keep_trajectory: Self::default_keep_trajectory(),
        }
    }
}

/// Feature-extraction settings. Reference and synthetic syllables must share
/// one value so their feature arrays line up index for index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "AnalysisConfig::default_n_fft")]
    pub n_fft: usize,
    /// Hop of the dB spectrogram.
    #[serde(default = "AnalysisConfig::default_spectrogram_hop")]
    pub spectrogram_hop: usize,
    /// Hop of the frame features (centroid, RMS, mel, MFCC, pitch).
    #[serde(default = "AnalysisConfig::default_feature_hop")]
    pub feature_hop: usize,
    /// YIN analysis frame.
    #[serde(default = "AnalysisConfig::default_pitch_frame")]
    pub pitch_frame: usize,
    /// Analysis band (Hz): mel limits and pitch search range.
    #[serde(default = "AnalysisConfig::default_flim")]
    pub flim: (f64, f64),
    #[serde(default = "AnalysisConfig::default_n_mels")]
    pub n_mels: usize,
    #[serde(default = "AnalysisConfig::default_n_mfcc")]
    pub n_mfcc: usize,
    /// Envelope block length in samples.
    #[serde(default = "AnalysisConfig::default_envelope_block")]
    pub envelope_block: usize,
    #[serde(default = "AnalysisConfig::default_yin_threshold")]
    pub yin_threshold: f64,
    /// Dynamic range floor of the dB spectrogram.
    #[serde(default = "AnalysisConfig::default_top_db")]
    pub top_db: f64,
}

impl AnalysisConfig {
    fn default_n_fft() -> usize {
        512
    }
    fn default_spectrogram_hop() -> usize {
        128
    }
    fn default_feature_hop() -> usize {
        256
    }
    fn default_pitch_frame() -> usize {
        1024
    }
    fn default_flim() -> (f64, f64) {
        (1.5e3, 2e4)
    }
    fn default_n_mels() -> usize {
        32
    }
    fn default_n_mfcc() -> usize {
        20
    }
    fn default_envelope_block() -> usize {
        200
    }
    fn default_yin_threshold() -> f64 {
        1.0
    }
    fn default_top_db() -> f64 {
        80.0
    }

    pub fn validate(&self, sample_rate: f64) -> Result<()> {
        let fail = |msg: String| Err(SyrinxError::InvalidConfig(msg));
        if !(sample_rate > 0.0) {
            return fail(format!("sample rate must be positive, got {sample_rate}"));
        }
        if self.n_fft < 4 || self.pitch_frame < 4 {
            return fail("n_fft and pitch_frame must be >= 4".into());
        }
        if self.spectrogram_hop == 0 || self.feature_hop == 0 || self.envelope_block == 0 {
            return fail("hop sizes and envelope block must be >= 1".into());
        }
        let (lo, hi) = self.flim;
        if !(lo > 0.0 && hi > lo) {
            return fail(format!("flim must satisfy 0 < lo < hi, got ({lo}, {hi})"));
        }
        if self.n_mels == 0 || self.n_mfcc == 0 || self.n_mfcc > self.n_mels {
            return fail(format!(
                "need 1 <= n_mfcc <= n_mels, got n_mfcc={} n_mels={}",
                self.n_mfcc, self.n_mels
            ));
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            n_fft: Self::default_n_fft(),
            spectrogram_hop: Self::default_spectrogram_hop(),
            feature_hop: Self::default_feature_hop(),
            pitch_frame: Self::default_pitch_frame(),
            flim: Self::default_flim(),
            n_mels: Self::default_n_mels(),
            n_mfcc: Self::default_n_mfcc(),
            envelope_block: Self::default_envelope_block(),
            yin_threshold: Self::default_yin_threshold(),
            top_db: Self::default_top_db(),
        }
    }
}

/// Vector norm used to reduce a delta array to a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormOrder {
    P(f64),
    Infinity,
}

impl Default for NormOrder {
    fn default() -> Self {
        Self::P(2.0)
    }
}

/// What a zero operand does to `x * log2(|x / y|)` in the divergence measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogRatioPolicy {
    /// The whole frame is undefined and excluded from aggregation.
    #[default]
    FlagFrame,
    /// Terms with a zero operand contribute nothing.
    ZeroContribution,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ScoreConfig {
    #[serde(default)]
    pub order: NormOrder,
    #[serde(default)]
    pub log_ratio: LogRatioPolicy,
}

impl ScoreConfig {
    pub fn validate(&self) -> Result<()> {
        match self.order {
            NormOrder::P(p) if !(p.is_finite() && p >= 1.0) => Err(SyrinxError::InvalidConfig(
                format!("norm order must be a finite p >= 1 or infinity, got {p}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Top-level file layout: `{ "simulation": {...}, "analysis": {...}, "score": {...} }`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyrinxConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub score: ScoreConfig,
}

impl SyrinxConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.simulation.validate()?;
        cfg.score.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_pipeline() {
        let sim = SimulationConfig::default();
        assert_eq!(sim.oversample, 20);
        assert_eq!(sim.output_tap, OutputTap::LabialVelocity);
        assert!(!sim.divergence.unwrap().halt);

        let an = AnalysisConfig::default();
        assert_eq!(an.spectrogram_hop, an.n_fft / 4);
        assert_eq!(an.feature_hop, an.n_fft / 2);
        assert_eq!(an.pitch_frame, an.n_fft * 2);
        assert!(an.validate(44100.0).is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = SyrinxConfig::from_json(
            r#"{ "simulation": { "oversample": 8 }, "score": { "order": "infinity" } }"#,
        )
        .unwrap();
        assert_eq!(cfg.simulation.oversample, 8);
        assert_eq!(cfg.simulation.initial_state[0], 1e-2);
        assert_eq!(cfg.score.order, NormOrder::Infinity);
        assert_eq!(cfg.score.log_ratio, LogRatioPolicy::FlagFrame);
        assert_eq!(cfg.analysis.n_mels, 32);
    }

    #[test]
    fn test_rejects_zero_oversample() {
        let err = SyrinxConfig::from_json(r#"{ "simulation": { "oversample": 0 } }"#);
        assert!(matches!(err, Err(SyrinxError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_sub_unit_norm() {
        let cfg = ScoreConfig {
            order: NormOrder::P(0.5),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_analysis_validation() {
        let mut an = AnalysisConfig::default();
        an.n_mfcc = 40;
        assert!(an.validate(44100.0).is_err());
        let an = AnalysisConfig::default();
        assert!(an.validate(0.0).is_err());
    }
}
