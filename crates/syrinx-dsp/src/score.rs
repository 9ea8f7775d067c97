/// Dissimilarity between a reference syllable and its synthetic counterpart.
///
/// Every feature gets an absolute-difference delta and a scalar score
/// `norm(delta) / delta.len()`. Frequency-valued deltas are in kHz. The three
/// matrix deltas are scaled by their own maximum and reduced with the induced
/// infinity norm (largest absolute row sum). Per-frame MFCC measures
/// (correlation distance, Df, SKL) come on top.
///
/// Scoring is pure: neither syllable is touched. A non-finite difference
/// (from a feature that blew up) counts as zero so every score stays finite.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array2, ArrayView1, Axis};
use tracing::{debug, warn};

use crate::config::{LogRatioPolicy, NormOrder, ScoreConfig};
use crate::error::{Result, SyrinxError};
use crate::syllable::Syllable;

const KHZ: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    DeltaSci,
    DeltaFf,
    DeltaEnvelope,
    DeltaRms,
    DeltaCentroid,
    DeltaFMsf,
    DeltaSpectrogram,
    DeltaMel,
    DeltaMfcc,
    ScoreSci,
    ScoreFf,
    ScoreEnvelope,
    ScoreRms,
    ScoreCentroid,
    ScoreFMsf,
    ScoreSpectrogram,
    ScoreMel,
    ScoreMfcc,
    MeanDeltaSci,
    MeanDeltaFf,
    MeanDeltaEnvelope,
    MeanDeltaRms,
    MeanDeltaCentroid,
    MeanDeltaFMsf,
    Correlation,
    Df,
    Skl,
    ScoreCorrelation,
    ScoreDf,
    ScoreSkl,
    /// Frames whose Df was undefined and left out of `ScoreDf`.
    UndefinedDfFrames,
}

impl Metric {
    pub const ALL: [Metric; 31] = [
        Metric::DeltaSci,
        Metric::DeltaFf,
        Metric::DeltaEnvelope,
        Metric::DeltaRms,
        Metric::DeltaCentroid,
        Metric::DeltaFMsf,
        Metric::DeltaSpectrogram,
        Metric::DeltaMel,
        Metric::DeltaMfcc,
        Metric::ScoreSci,
        Metric::ScoreFf,
        Metric::ScoreEnvelope,
        Metric::ScoreRms,
        Metric::ScoreCentroid,
        Metric::ScoreFMsf,
        Metric::ScoreSpectrogram,
        Metric::ScoreMel,
        Metric::ScoreMfcc,
        Metric::MeanDeltaSci,
        Metric::MeanDeltaFf,
        Metric::MeanDeltaEnvelope,
        Metric::MeanDeltaRms,
        Metric::MeanDeltaCentroid,
        Metric::MeanDeltaFMsf,
        Metric::Correlation,
        Metric::Df,
        Metric::Skl,
        Metric::ScoreCorrelation,
        Metric::ScoreDf,
        Metric::ScoreSkl,
        Metric::UndefinedDfFrames,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::DeltaSci => "deltaSCI",
            Self::DeltaFf => "deltaFF",
            Self::DeltaEnvelope => "deltaEnv",
            Self::DeltaRms => "deltaRMS",
            Self::DeltaCentroid => "deltaCentroid",
            Self::DeltaFMsf => "deltaF_msf",
            Self::DeltaSpectrogram => "deltaSxx",
            Self::DeltaMel => "deltaMel",
            Self::DeltaMfcc => "deltaMfccs",
            Self::ScoreSci => "scoreSCI",
            Self::ScoreFf => "scoreFF",
            Self::ScoreEnvelope => "scoreEnv",
            Self::ScoreRms => "scoreRMS",
            Self::ScoreCentroid => "scoreCentroid",
            Self::ScoreFMsf => "scoreF_msf",
            Self::ScoreSpectrogram => "scoreSxx",
            Self::ScoreMel => "scoreMel",
            Self::ScoreMfcc => "scoreMfccs",
            Self::MeanDeltaSci => "deltaSCI_mean",
            Self::MeanDeltaFf => "deltaFF_mean",
            Self::MeanDeltaEnvelope => "deltaEnv_mean",
            Self::MeanDeltaRms => "deltaRMS_mean",
            Self::MeanDeltaCentroid => "deltaCentroid_mean",
            Self::MeanDeltaFMsf => "deltaF_msf_mean",
            Self::Correlation => "correlation",
            Self::Df => "Df",
            Self::Skl => "SKL",
            Self::ScoreCorrelation => "scoreCorrelation",
            Self::ScoreDf => "scoreDF",
            Self::ScoreSkl => "scoreSKL",
            Self::UndefinedDfFrames => "undefinedDfFrames",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Scalar(f64),
    Series(Vec<f64>),
    /// Per-frame values; `None` marks a frame the measure is undefined for.
    Frames(Vec<Option<f64>>),
    Matrix(Array2<f64>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreReport {
    values: BTreeMap<Metric, MetricValue>,
}

impl ScoreReport {
    pub fn get(&self, metric: Metric) -> Option<&MetricValue> {
        self.values.get(&metric)
    }

    pub fn scalar(&self, metric: Metric) -> Option<f64> {
        match self.values.get(&metric) {
            Some(MetricValue::Scalar(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn series(&self, metric: Metric) -> Option<&[f64]> {
        match self.values.get(&metric) {
            Some(MetricValue::Series(v)) => Some(v),
            _ => None,
        }
    }

    pub fn frames(&self, metric: Metric) -> Option<&[Option<f64>]> {
        match self.values.get(&metric) {
            Some(MetricValue::Frames(v)) => Some(v),
            _ => None,
        }
    }

    pub fn matrix(&self, metric: Metric) -> Option<&Array2<f64>> {
        match self.values.get(&metric) {
            Some(MetricValue::Matrix(v)) => Some(v),
            _ => None,
        }
    }

    /// Scalar entries in metric order.
    pub fn scalars(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.values.iter().filter_map(|(m, v)| match v {
            MetricValue::Scalar(s) => Some((*m, *s)),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, &MetricValue)> {
        self.values.iter().map(|(m, v)| (*m, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, metric: Metric, value: MetricValue) {
        self.values.insert(metric, value);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DissimilarityScorer {
    config: ScoreConfig,
}

impl DissimilarityScorer {
    pub fn new(config: ScoreConfig) -> Self {
        Self { config }
    }

    /// Same scorer, reducing with `order`.
    pub fn with_order(mut self, order: NormOrder) -> Self {
        self.config.order = order;
        self
    }

    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    pub fn score(&self, reference: &Syllable, synthetic: &Syllable) -> Result<ScoreReport> {
        self.config.validate()?;
        let order = self.config.order;
        let (r, s) = (reference.features(), synthetic.features());
        let mut report = ScoreReport::default();

        let series: [(&'static str, &[f64], &[f64], f64, [Metric; 3]); 6] = [
            ("sci", r.sci.as_slice(), s.sci.as_slice(), 1.0, [Metric::DeltaSci, Metric::ScoreSci, Metric::MeanDeltaSci]),
            ("ff", r.ff.as_slice(), s.ff.as_slice(), KHZ, [Metric::DeltaFf, Metric::ScoreFf, Metric::MeanDeltaFf]),
            (
                "envelope",
                r.envelope.as_slice(),
                s.envelope.as_slice(),
                1.0,
                [Metric::DeltaEnvelope, Metric::ScoreEnvelope, Metric::MeanDeltaEnvelope],
            ),
            ("rms", r.rms.as_slice(), s.rms.as_slice(), 1.0, [Metric::DeltaRms, Metric::ScoreRms, Metric::MeanDeltaRms]),
            (
                "centroid",
                r.centroid.as_slice(),
                s.centroid.as_slice(),
                KHZ,
                [Metric::DeltaCentroid, Metric::ScoreCentroid, Metric::MeanDeltaCentroid],
            ),
            ("f_msf", r.f_msf.as_slice(), s.f_msf.as_slice(), KHZ, [Metric::DeltaFMsf, Metric::ScoreFMsf, Metric::MeanDeltaFMsf]),
        ];
        for (feature, a, b, scale, [delta_key, score_key, mean_key]) in series {
            if a.len() != b.len() {
                return Err(shape_mismatch(feature, &[a.len()], &[b.len()]));
            }
            let delta: Vec<f64> = a.iter().zip(b).map(|(x, y)| finite_or_zero((x - y).abs() * scale)).collect();
            report.insert(score_key, MetricValue::Scalar(reduce(&delta, order)));
            report.insert(mean_key, MetricValue::Scalar(mean(&delta)));
            report.insert(delta_key, MetricValue::Series(delta));
        }

        let matrices = [
            ("spectrogram_db", &r.spectrogram_db, &s.spectrogram_db, Metric::DeltaSpectrogram, Metric::ScoreSpectrogram),
            ("mel", &r.mel, &s.mel, Metric::DeltaMel, Metric::ScoreMel),
            ("mfcc", &r.mfcc, &s.mfcc, Metric::DeltaMfcc, Metric::ScoreMfcc),
        ];
        for (feature, a, b, delta_key, score_key) in matrices {
            if a.dim() != b.dim() {
                return Err(shape_mismatch(feature, a.shape(), b.shape()));
            }
            let delta = normalize_by_max((a - b).mapv(|v| finite_or_zero(v.abs())));
            let score = if delta.is_empty() {
                0.0
            } else {
                finite_or_zero(induced_inf_norm(&delta) / delta.len() as f64)
            };
            report.insert(score_key, MetricValue::Scalar(score));
            report.insert(delta_key, MetricValue::Matrix(delta));
        }

        let frames = r.mfcc.ncols();
        let mut correlation = Vec::with_capacity(frames);
        let mut df = Vec::with_capacity(frames);
        let mut skl = Vec::with_capacity(frames);
        for (x, y) in r.mfcc.axis_iter(Axis(1)).zip(s.mfcc.axis_iter(Axis(1))) {
            correlation.push(correlation_distance(x, y).map(finite_or_zero));
            df.push(divergence(x, y, self.config.log_ratio).map(finite_or_zero));
            skl.push(finite_or_zero(0.5 * x.iter().zip(y).map(|(a, b)| (a - b).abs()).sum::<f64>()));
        }
        normalize_frames(&mut df);
        let skl = normalize_by_max_vec(skl);

        let undefined_df = df.iter().filter(|v| v.is_none()).count();
        if undefined_df > 0 {
            warn!(
                syllable = %synthetic.id(),
                frames = undefined_df,
                "Df undefined on frames with a zero MFCC coefficient; excluded from scoreDF"
            );
        }
        let undefined_corr = correlation.iter().filter(|v| v.is_none()).count();
        if undefined_corr > 0 {
            debug!(frames = undefined_corr, "correlation undefined on all-zero MFCC frames");
        }

        report.insert(Metric::ScoreCorrelation, MetricValue::Scalar(reduce_defined(&correlation, order)));
        report.insert(Metric::ScoreDf, MetricValue::Scalar(reduce_defined(&df, order)));
        report.insert(Metric::ScoreSkl, MetricValue::Scalar(reduce(&skl, order)));
        report.insert(Metric::UndefinedDfFrames, MetricValue::Scalar(undefined_df as f64));
        report.insert(Metric::Correlation, MetricValue::Frames(correlation));
        report.insert(Metric::Df, MetricValue::Frames(df));
        report.insert(Metric::Skl, MetricValue::Series(skl));

        debug!(
            reference = %reference.id(),
            synthetic = %synthetic.id(),
            score_ff = report.scalar(Metric::ScoreFf).unwrap_or(f64::NAN),
            score_sxx = report.scalar(Metric::ScoreSpectrogram).unwrap_or(f64::NAN),
            "scored"
        );
        Ok(report)
    }
}

fn shape_mismatch(feature: &'static str, reference: &[usize], synthetic: &[usize]) -> SyrinxError {
    SyrinxError::ShapeMismatch {
        feature,
        reference: reference.to_vec(),
        synthetic: synthetic.to_vec(),
    }
}

/// Vector norm of the given order.
pub fn vector_norm<I: IntoIterator<Item = f64>>(values: I, order: NormOrder) -> f64 {
    let values = values.into_iter().map(f64::abs);
    match order {
        NormOrder::Infinity => values.fold(0.0, f64::max),
        NormOrder::P(p) if p == 1.0 => values.sum(),
        NormOrder::P(p) if p == 2.0 => values.map(|v| v * v).sum::<f64>().sqrt(),
        NormOrder::P(p) => values.map(|v| v.powf(p)).sum::<f64>().powf(1.0 / p),
    }
}

/// Largest absolute row sum.
pub fn induced_inf_norm(m: &Array2<f64>) -> f64 {
    m.rows()
        .into_iter()
        .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

fn reduce(values: &[f64], order: NormOrder) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    finite_or_zero(vector_norm(values.iter().copied(), order) / values.len() as f64)
}

/// `reduce` over the defined frames only.
fn reduce_defined(values: &[Option<f64>], order: NormOrder) -> f64 {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    reduce(&defined, order)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        finite_or_zero(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn normalize_by_max(m: Array2<f64>) -> Array2<f64> {
    let max = m.iter().copied().fold(0.0, f64::max);
    if max > 0.0 { m / max } else { Array2::zeros(m.dim()) }
}

fn normalize_by_max_vec(v: Vec<f64>) -> Vec<f64> {
    let max = v.iter().copied().fold(0.0, f64::max);
    if max > 0.0 {
        v.into_iter().map(|x| x / max).collect()
    } else {
        vec![0.0; v.len()]
    }
}

fn normalize_frames(v: &mut [Option<f64>]) {
    let max = v.iter().flatten().copied().fold(0.0, f64::max);
    for x in v.iter_mut().flatten() {
        *x = if max > 0.0 { *x / max } else { 0.0 };
    }
}

/// sqrt(1 - r) with r = ||x * y||_1 / (||x||_2 ||y||_2). Undefined for a zero frame.
fn correlation_distance(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Option<f64> {
    let nx = x.iter().map(|v| v * v).sum::<f64>().sqrt();
    let ny = y.iter().map(|v| v * v).sum::<f64>().sqrt();
    if nx == 0.0 || ny == 0.0 {
        return None;
    }
    let r = x.iter().zip(y).map(|(a, b)| (a * b).abs()).sum::<f64>() / (nx * ny);
    Some((1.0 - r).max(0.0).sqrt())
}

/// 0.5 * sum |x log2|x/y| + y log2|y/x||.
fn divergence(x: ArrayView1<f64>, y: ArrayView1<f64>, policy: LogRatioPolicy) -> Option<f64> {
    let mut total = 0.0;
    for (&a, &b) in x.iter().zip(y) {
        if a == 0.0 || b == 0.0 {
            match policy {
                LogRatioPolicy::FlagFrame => return None,
                LogRatioPolicy::ZeroContribution => continue,
            }
        }
        total += (a * (a / b).abs().log2() + b * (b / a).abs().log2()).abs();
    }
    Some(0.5 * total)
}
