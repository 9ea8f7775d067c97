/// A syllable: normalized waveform plus its acoustic features.
///
/// Built once from audio, never mutated afterwards. The analysis settings
/// used to build it travel with it so a synthetic copy can be analysed the
/// same way.

use std::fmt;

use crate::config::AnalysisConfig;
use crate::curve::SegmentKind;
use crate::error::{Result, SyrinxError};
use crate::features::{AcousticFeatures, FeatureExtractor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyllableTag {
    /// Cut from a recording.
    Recorded(SegmentKind),
    /// Produced by the model from a recorded segment of this kind.
    Synthetic(SegmentKind),
}

impl SyllableTag {
    pub fn kind(self) -> SegmentKind {
        match self {
            Self::Recorded(k) | Self::Synthetic(k) => k,
        }
    }

    pub fn is_synthetic(self) -> bool {
        matches!(self, Self::Synthetic(_))
    }

    /// The synthetic counterpart of this tag.
    pub fn synthetic(self) -> Self {
        Self::Synthetic(self.kind())
    }
}

impl fmt::Display for SyllableTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recorded(k) => write!(f, "{k}"),
            Self::Synthetic(k) => write!(f, "{k}-synth"),
        }
    }
}

/// Where a syllable came from. Carried along, never used by the math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyllableId {
    pub file: usize,
    pub index: usize,
    pub tag: SyllableTag,
}

impl SyllableId {
    pub fn recorded(file: usize, index: usize, kind: SegmentKind) -> Self {
        Self {
            file,
            index,
            tag: SyllableTag::Recorded(kind),
        }
    }
}

impl fmt::Display for SyllableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File{}-{}-{}", self.file, self.tag, self.index)
    }
}

#[derive(Debug, Clone)]
pub struct Syllable {
    samples: Vec<f64>,
    sample_rate: f64,
    t0: f64,
    id: SyllableId,
    analysis: AnalysisConfig,
    features: AcousticFeatures,
}

impl Syllable {
    /// Normalize `samples` to unit peak and extract features.
    ///
    /// - `t0`: start time of the segment within its recording (s)
    pub fn new<E: FeatureExtractor + ?Sized>(
        samples: &[f64],
        sample_rate: f64,
        t0: f64,
        id: SyllableId,
        extractor: &E,
    ) -> Result<Self> {
        let samples = normalize(samples);
        let features = extractor.extract(&samples, sample_rate)?;
        Ok(Self {
            samples,
            sample_rate,
            t0,
            id,
            analysis: extractor.config().clone(),
            features,
        })
    }

    /// Like `new`, restricted to `[start, end)` seconds of `samples`.
    pub fn windowed<E: FeatureExtractor + ?Sized>(
        samples: &[f64],
        sample_rate: f64,
        t0: f64,
        (start, end): (f64, f64),
        id: SyllableId,
        extractor: &E,
    ) -> Result<Self> {
        let first = (start.max(0.0) * sample_rate).round() as usize;
        let last = ((end * sample_rate).round() as usize).min(samples.len());
        if !(end > start) || first >= last {
            return Err(SyrinxError::InvalidConfig(format!(
                "empty window ({start}, {end}) s over {} samples",
                samples.len()
            )));
        }
        Self::new(&samples[first..last], sample_rate, t0 + start, id, extractor)
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn t0(&self) -> f64 {
        self.t0
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    pub fn id(&self) -> SyllableId {
        self.id
    }

    pub fn kind(&self) -> SegmentKind {
        self.id.tag.kind()
    }

    pub fn analysis(&self) -> &AnalysisConfig {
        &self.analysis
    }

    pub fn features(&self) -> &AcousticFeatures {
        &self.features
    }
}

/// Scale to unit peak. Silence stays silent; non-finite samples become silence.
fn normalize(samples: &[f64]) -> Vec<f64> {
    let finite = |s: f64| if s.is_finite() { s } else { 0.0 };
    let peak = samples.iter().map(|&s| finite(s).abs()).fold(0.0f64, f64::max);
    if peak > 0.0 {
        samples.iter().map(|&s| finite(s) / peak).collect()
    } else {
        vec![0.0; samples.len()]
    }
}
