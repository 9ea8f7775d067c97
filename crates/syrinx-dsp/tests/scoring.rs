/// Properties every score report must satisfy regardless of the signals.
use syrinx_dsp::config::{LogRatioPolicy, NormOrder};
use syrinx_dsp::{
    AnalysisConfig, DissimilarityScorer, Metric, ScoreConfig, SegmentKind, SpectralAnalyzer, Syllable,
    SyllableId, SyrinxError,
};

const SR: f64 = 44100.0;

fn chirp(n: usize, f0: f64, sweep: f64) -> Syllable {
    let x: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64 / SR;
            (2.0 * std::f64::consts::PI * (f0 * t + sweep * t * t)).sin() * (1.0 - t)
        })
        .collect();
    let analyzer = SpectralAnalyzer::new(AnalysisConfig::default());
    Syllable::new(&x, SR, 0.0, SyllableId::recorded(0, 0, SegmentKind::Chunk), &analyzer).unwrap()
}

#[test]
fn test_self_score_is_zero() {
    let a = chirp(6000, 3000.0, 4000.0);
    let report = DissimilarityScorer::default().score(&a, &a).unwrap();
    for (metric, value) in report.scalars() {
        if metric == Metric::UndefinedDfFrames {
            continue;
        }
        assert!(value.abs() < 1e-6, "{metric} = {value}");
    }
    for metric in [Metric::DeltaSpectrogram, Metric::DeltaMel, Metric::DeltaMfcc] {
        assert!(report.matrix(metric).unwrap().iter().all(|&v| v == 0.0));
    }
}

#[test]
fn test_scores_are_symmetric() {
    let a = chirp(6000, 3000.0, 4000.0);
    let b = chirp(6000, 4500.0, -2000.0);
    let scorer = DissimilarityScorer::default();
    let ab = scorer.score(&a, &b).unwrap();
    let ba = scorer.score(&b, &a).unwrap();
    for (metric, value) in ab.scalars() {
        let other = ba.scalar(metric).unwrap();
        assert!((value - other).abs() < 1e-12, "{metric}: {value} vs {other}");
    }
}

#[test]
fn test_matrix_deltas_peak_at_one() {
    let a = chirp(6000, 3000.0, 4000.0);
    let b = chirp(6000, 4500.0, -2000.0);
    let report = DissimilarityScorer::default().score(&a, &b).unwrap();
    for metric in [Metric::DeltaSpectrogram, Metric::DeltaMel, Metric::DeltaMfcc] {
        let m = report.matrix(metric).unwrap();
        let max = m.iter().copied().fold(0.0f64, f64::max);
        assert!((max - 1.0).abs() < 1e-12, "{metric} peaks at {max}");
        assert!(m.iter().all(|&v| v >= 0.0));
    }
}

#[test]
fn test_delta_lengths_follow_features() {
    let a = chirp(6000, 3000.0, 4000.0);
    let b = chirp(6000, 4500.0, -2000.0);
    let report = DissimilarityScorer::default().score(&a, &b).unwrap();
    let f = a.features();
    assert_eq!(report.series(Metric::DeltaFf).unwrap().len(), f.ff.len());
    assert_eq!(report.series(Metric::DeltaEnvelope).unwrap().len(), 6000);
    assert_eq!(report.series(Metric::DeltaSci).unwrap().len(), f.sci.len());
    assert_eq!(report.frames(Metric::Correlation).unwrap().len(), f.mfcc.ncols());
    assert_eq!(report.frames(Metric::Df).unwrap().len(), f.mfcc.ncols());
    assert_eq!(report.series(Metric::Skl).unwrap().len(), f.mfcc.ncols());
}

#[test]
fn test_frequency_deltas_in_khz() {
    let a = chirp(6000, 3000.0, 4000.0);
    let b = chirp(6000, 4500.0, -2000.0);
    let report = DissimilarityScorer::default().score(&a, &b).unwrap();
    let delta = report.series(Metric::DeltaFf).unwrap();
    for ((x, y), d) in a.features().ff.iter().zip(&b.features().ff).zip(delta) {
        assert!(((x - y).abs() * 1e-3 - d).abs() < 1e-12);
    }
    let mean = delta.iter().sum::<f64>() / delta.len() as f64;
    assert!((report.scalar(Metric::MeanDeltaFf).unwrap() - mean).abs() < 1e-12);
}

#[test]
fn test_infinity_order_bounds_euclidean() {
    let a = chirp(6000, 3000.0, 4000.0);
    let b = chirp(6000, 4500.0, -2000.0);
    let euclid = DissimilarityScorer::default().score(&a, &b).unwrap();
    let inf = DissimilarityScorer::default()
        .with_order(NormOrder::Infinity)
        .score(&a, &b)
        .unwrap();
    for metric in [Metric::ScoreFf, Metric::ScoreEnvelope, Metric::ScoreRms] {
        assert!(inf.scalar(metric).unwrap() <= euclid.scalar(metric).unwrap() + 1e-15);
    }
}

#[test]
fn test_zero_contribution_defines_every_frame() {
    let a = chirp(6000, 3000.0, 4000.0);
    let b = chirp(6000, 4500.0, -2000.0);
    let report = DissimilarityScorer::new(ScoreConfig {
        log_ratio: LogRatioPolicy::ZeroContribution,
        ..Default::default()
    })
    .score(&a, &b)
    .unwrap();
    assert_eq!(report.scalar(Metric::UndefinedDfFrames), Some(0.0));
    assert!(report.frames(Metric::Df).unwrap().iter().all(Option::is_some));
}

#[test]
fn test_shape_mismatch_is_an_error() {
    let a = chirp(6000, 3000.0, 4000.0);
    let b = chirp(7000, 3000.0, 4000.0);
    let err = DissimilarityScorer::default().score(&a, &b);
    assert!(matches!(err, Err(SyrinxError::ShapeMismatch { .. })));
}

#[test]
fn test_invalid_order_rejected() {
    let a = chirp(6000, 3000.0, 4000.0);
    let scorer = DissimilarityScorer::new(ScoreConfig {
        order: NormOrder::P(0.5),
        ..Default::default()
    });
    assert!(matches!(scorer.score(&a, &a), Err(SyrinxError::InvalidConfig(_))));
}
