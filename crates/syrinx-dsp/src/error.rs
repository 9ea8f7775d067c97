//! Error types shared by synthesis, analysis and scoring.
//!
//! Only configuration and shape problems are errors. Numerical degeneracy
//! (zero maxima, zero log arguments) is resolved by policy inside the scorer,
//! and physical divergence is reported as a flag on the integration result.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyrinxError>;

#[derive(Error, Debug)]
pub enum SyrinxError {
    /// Segment classification tag is neither syllable-like nor chunk-like.
    #[error("unknown segment kind '{0}' (expected 'syllable-like' or 'chunk-like')")]
    UnknownSegmentKind(String),

    /// Reference and synthetic feature arrays differ in shape.
    #[error("feature '{feature}' shape mismatch: reference {reference:?}, synthetic {synthetic:?}")]
    ShapeMismatch {
        feature: &'static str,
        reference: Vec<usize>,
        synthetic: Vec<usize>,
    },

    /// An input array does not line up with the waveform it drives.
    #[error("{what}: expected {expected} samples, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// No pitch points to fit.
    #[error("pitch contour has {points} points, cannot fit degree {degree}")]
    ContourTooShort { points: usize, degree: usize },

    /// Least-squares system is rank deficient (e.g. constant time base).
    #[error("polynomial fit is singular")]
    SingularFit,

    /// Waveform shorter than one analysis frame.
    #[error("signal of {samples} samples is shorter than the {frame}-sample analysis frame")]
    SignalTooShort { samples: usize, frame: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no physical constants for '{0}'")]
    MissingConstants(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
