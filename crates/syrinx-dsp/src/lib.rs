//! Syrinx DSP library: songbird vocal-organ model and syllable scoring.
//!
//! Pure math with no audio I/O dependencies.

// Errors and configuration
pub mod config;
pub mod constants;
pub mod error;

// Physical model
pub mod acoustic;
pub mod curve;
pub mod integrator;
pub mod oscillator;
pub mod tract;

// Analysis and scoring
pub mod analysis;
pub mod features;
pub mod score;
pub mod syllable;
pub mod synth;

pub use analysis::SpectralAnalyzer;
pub use config::{AnalysisConfig, ScoreConfig, SimulationConfig, SyrinxConfig};
pub use constants::{ConstantsTable, PhysicalConstants};
pub use curve::{ControlCurve, ControlParameters, SegmentKind};
pub use error::{Result, SyrinxError};
pub use features::{AcousticFeatures, FeatureExtractor};
pub use score::{DissimilarityScorer, Metric, MetricValue, ScoreReport};
pub use syllable::{Syllable, SyllableId, SyllableTag};
pub use synth::{SyllableSynthesizer, SyntheticSyllable};
