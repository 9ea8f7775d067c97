/// End-to-end synthesis tests.
///
/// A syllable synthesized from known constant gestures is used as the
/// reference for a second synthesis with the same gestures; the second run
/// must reproduce it and score zero against it.
use syrinx_dsp::{
    AnalysisConfig, ControlCurve, ControlParameters, DissimilarityScorer, Metric, PhysicalConstants,
    SegmentKind, SimulationConfig, SpectralAnalyzer, Syllable, SyllableId, SyllableSynthesizer,
};

const SR: f64 = 44100.0;
const N: usize = 8820;

fn chirp() -> Vec<f64> {
    (0..N)
        .map(|i| {
            let t = i as f64 / SR;
            0.8 * (2.0 * std::f64::consts::PI * (3000.0 * t + 5000.0 * t * t)).sin()
        })
        .collect()
}

fn synthesizer() -> SyllableSynthesizer<SpectralAnalyzer> {
    SyllableSynthesizer::new(SpectralAnalyzer::new(AnalysisConfig::default()), SimulationConfig::default())
}

fn seed(synth: &SyllableSynthesizer<SpectralAnalyzer>) -> Syllable {
    let id = SyllableId::recorded(3, 1, SegmentKind::Syllable);
    Syllable::new(&chirp(), SR, 0.25, id, synth.extractor()).unwrap()
}

fn no_reflection() -> PhysicalConstants {
    PhysicalConstants {
        reflection: 0.0,
        ..Default::default()
    }
}

#[test]
fn test_resynthesis_reproduces_synthetic_reference() {
    let synth = synthesizer();
    let seed = seed(&synth);
    let params = ControlParameters::constant(-1.0, 0.5, 4e4);
    let constants = no_reflection();
    let flat = vec![1.0; N];

    let first = synth
        .synthesize_from(&seed, ControlCurve::constant(-1.0, 0.5, N), &flat, params, &constants)
        .unwrap();
    let reference = first.syllable();
    assert!(!first.diverged());

    let second = synth
        .synthesize_from(reference, ControlCurve::constant(-1.0, 0.5, N), &flat, params, &constants)
        .unwrap();
    let max_diff = reference
        .samples()
        .iter()
        .zip(second.syllable().samples())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f64, f64::max);
    assert!(max_diff < 1e-12, "waveforms differ by {max_diff}");

    let report = DissimilarityScorer::default().score(reference, second.syllable()).unwrap();
    for (metric, value) in report.scalars() {
        if metric == Metric::UndefinedDfFrames {
            continue;
        }
        assert!(value.abs() < 1e-6, "{metric} = {value}");
    }
}

#[test]
fn test_constant_gestures_give_constant_curves() {
    let synth = synthesizer();
    let seed = seed(&synth);
    let params = ControlParameters::constant(-1.0, 0.5, 4e4);
    let constants = no_reflection();

    let fitted = synth.synthesize(&seed, params, &constants).unwrap();
    assert!(fitted.curve().alpha.iter().all(|&a| a == -1.0));
    assert!(fitted.curve().beta.iter().all(|&b| b == 0.5));

    let explicit = synth
        .synthesize_from(
            &seed,
            ControlCurve::constant(-1.0, 0.5, N),
            &seed.features().envelope,
            params,
            &constants,
        )
        .unwrap();
    assert_eq!(fitted.syllable().samples(), explicit.syllable().samples());
}

#[test]
fn test_synthesis_leaves_reference_untouched() {
    let synth = synthesizer();
    let seed = seed(&synth);
    let before = seed.clone();

    let scorer = DissimilarityScorer::default();
    let result = synth
        .solve(&seed, ControlParameters::default(), &PhysicalConstants::default(), &scorer)
        .unwrap();

    assert_eq!(seed.samples(), before.samples());
    assert_eq!(seed.features(), before.features());
    assert_eq!(seed.id(), before.id());
    assert_eq!(result.syllable().t0(), seed.t0());
    assert_eq!(result.syllable().len(), seed.len());
    assert!(result.scores().is_some());
}

#[test]
fn test_trajectory_can_be_dropped() {
    let synth = SyllableSynthesizer::new(
        SpectralAnalyzer::new(AnalysisConfig::default()),
        SimulationConfig {
            keep_trajectory: false,
            ..Default::default()
        },
    );
    let seed = seed(&synth);
    let result = synth
        .synthesize(&seed, ControlParameters::default(), &PhysicalConstants::default())
        .unwrap();
    assert!(result.integration().trajectory.is_empty());
    assert_eq!(result.integration().waveform.len(), N);
}

#[test]
fn test_float_wav_round_trip_preserves_pitch_track() {
    let path = std::env::temp_dir().join("syrinx_dsp_round_trip.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SR as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for s in chirp() {
        writer.write_sample(s as f32).unwrap();
    }
    writer.finalize().unwrap();

    let read: Vec<f64> = hound::WavReader::open(&path)
        .unwrap()
        .samples::<f32>()
        .map(|s| s.unwrap() as f64)
        .collect();
    std::fs::remove_file(&path).ok();

    let synth = synthesizer();
    let original = seed(&synth);
    let id = SyllableId::recorded(3, 1, SegmentKind::Syllable);
    let reloaded = Syllable::new(&read, SR, 0.25, id, synth.extractor()).unwrap();

    let report = DissimilarityScorer::default().score(&original, &reloaded).unwrap();
    assert!(report.scalar(Metric::ScoreFf).unwrap() < 1e-3);
    assert!(report.scalar(Metric::ScoreEnvelope).unwrap() < 1e-3);
}
