/// Acoustic features consumed by the scorer.
///
/// Feature extraction itself sits behind `FeatureExtractor`; the synthesizer
/// and scorer only see these arrays. Matrices are (bins, frames).

use ndarray::Array2;

use crate::config::AnalysisConfig;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct AcousticFeatures {
    /// Amplitude envelope, one value per waveform sample.
    pub envelope: Vec<f64>,
    /// Fundamental frequency (Hz) and its time base (s).
    pub ff: Vec<f64>,
    pub ff_time: Vec<f64>,
    /// Time base (s) of the frame features below.
    pub frame_time: Vec<f64>,
    /// Magnitude spectrogram at the spectrogram hop, and its dB version.
    pub spectrogram: Array2<f64>,
    pub spectrogram_db: Array2<f64>,
    /// Magnitude spectrogram at the feature hop.
    pub ff_coef: Array2<f64>,
    /// Mel power spectrogram.
    pub mel: Array2<f64>,
    pub mfcc: Array2<f64>,
    pub centroid: Vec<f64>,
    pub rms: Vec<f64>,
    /// Magnitude-weighted mean frequency per frame, ||S * f||_1 / ||S||_1.
    pub f_msf: Vec<f64>,
    /// f_msf over the pitch track interpolated at the frame times.
    pub sci: Vec<f64>,
}

/// Turns a waveform into `AcousticFeatures`.
///
/// Implementations must be deterministic: the same samples and rate always
/// give the same arrays, so reference and synthetic syllables are comparable.
pub trait FeatureExtractor: Send + Sync {
    fn config(&self) -> &AnalysisConfig;

    fn extract(&self, samples: &[f64], sample_rate: f64) -> Result<AcousticFeatures>;
}
