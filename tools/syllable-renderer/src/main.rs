/// Syllable Renderer: fit-once syrinx resynthesis of a recorded syllable.
///
/// Reads a mono WAV, synthesizes the model's version under the given motor
/// gesture coefficients, writes it as WAV and prints the dissimilarity scores.
///
/// Logging goes to stderr through `RUST_LOG` (default `info`).

use std::path::{Path, PathBuf};
use std::process;

use syrinx_dsp::config::NormOrder;
use syrinx_dsp::{
    ConstantsTable, ControlParameters, DissimilarityScorer, PhysicalConstants, SegmentKind,
    SpectralAnalyzer, Syllable, SyllableId, SyllableSynthesizer, SyrinxConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut tlim: Option<(f64, f64)> = None;
    let mut kind = SegmentKind::Syllable;
    let mut params = ControlParameters::default();
    let mut config_file: Option<PathBuf> = None;
    let mut constants_file: Option<PathBuf> = None;
    let mut species: Option<String> = None;
    let mut oversample: Option<usize> = None;
    let mut order: Option<NormOrder> = None;
    let mut json = false;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--input" | "-i" => input = Some(PathBuf::from(value(&args, &mut i, flag))),
            "--output" | "-o" => output = Some(PathBuf::from(value(&args, &mut i, flag))),
            "--tlim" => {
                let v = value(&args, &mut i, flag);
                let (start, end) = v
                    .split_once(',')
                    .unwrap_or_else(|| fail(&format!("--tlim expects START,END seconds, got '{v}'")));
                tlim = Some((parse(start.trim(), flag), parse(end.trim(), flag)));
            }
            "--kind" => {
                kind = value(&args, &mut i, flag)
                    .parse()
                    .unwrap_or_else(|e| fail(&format!("{e}")));
            }
            "--a0" => params.a[0] = parse(value(&args, &mut i, flag), flag),
            "--a1" => params.a[1] = parse(value(&args, &mut i, flag), flag),
            "--a2" => params.a[2] = parse(value(&args, &mut i, flag), flag),
            "--b0" => params.b[0] = parse(value(&args, &mut i, flag), flag),
            "--b1" => params.b[1] = parse(value(&args, &mut i, flag), flag),
            "--b2" => params.b[2] = parse(value(&args, &mut i, flag), flag),
            "--gamma" => params.gamma = parse(value(&args, &mut i, flag), flag),
            "--config" => config_file = Some(PathBuf::from(value(&args, &mut i, flag))),
            "--constants" => constants_file = Some(PathBuf::from(value(&args, &mut i, flag))),
            "--species" => species = Some(value(&args, &mut i, flag).to_string()),
            "--oversample" => oversample = Some(parse(value(&args, &mut i, flag), flag)),
            "--order" => {
                let v = value(&args, &mut i, flag);
                order = Some(match v {
                    "inf" | "infinity" => NormOrder::Infinity,
                    p => NormOrder::P(parse(p, flag)),
                });
            }
            "--json" => json = true,
            "--help" | "-h" => {
                print_usage();
                return;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let input = input.unwrap_or_else(|| fail("--input is required"));
    let output = output.unwrap_or_else(|| input.with_extension("synth.wav"));

    let mut config = match &config_file {
        Some(path) => SyrinxConfig::load(path).unwrap_or_else(|e| fail(&format!("{}: {e}", path.display()))),
        None => SyrinxConfig::default(),
    };
    if let Some(ovs) = oversample {
        config.simulation.oversample = ovs;
    }
    if let Some(order) = order {
        config.score.order = order;
    }

    let constants = match (&constants_file, &species) {
        (Some(path), Some(key)) => {
            let table = ConstantsTable::load(path).unwrap_or_else(|e| fail(&format!("{}: {e}", path.display())));
            table.get(key).unwrap_or_else(|e| {
                let known: Vec<&str> = table.keys().collect();
                fail(&format!("{}: {e}; available: {}", path.display(), known.join(", ")))
            })
        }
        (Some(_), None) => fail("--constants needs --species to pick an entry"),
        (None, Some(_)) => fail("--species needs a --constants table"),
        (None, None) => PhysicalConstants::default(),
    };

    let (samples, sample_rate) = read_wav(&input);
    let analyzer = SpectralAnalyzer::new(config.analysis.clone());
    let id = SyllableId::recorded(0, 0, kind);
    let reference = match tlim {
        Some(window) => Syllable::windowed(&samples, sample_rate, 0.0, window, id, &analyzer),
        None => Syllable::new(&samples, sample_rate, 0.0, id, &analyzer),
    }
    .unwrap_or_else(|e| fail(&format!("{}: {e}", input.display())));

    info!(
        input = %input.display(),
        samples = reference.len(),
        sample_rate,
        kind = %kind,
        "loaded reference syllable"
    );

    let synthesizer = SyllableSynthesizer::new(analyzer, config.simulation.clone());
    let scorer = DissimilarityScorer::new(config.score);
    let synth = synthesizer
        .solve(&reference, params, &constants, &scorer)
        .unwrap_or_else(|e| fail(&e.to_string()));

    if synth.diverged() {
        eprintln!("warning: synthesis diverged; scores describe a clipped trajectory");
    }

    write_wav(&output, synth.syllable().samples(), sample_rate as u32);
    eprintln!("Written: {}", output.display());

    let Some(report) = synth.scores() else {
        return;
    };
    if json {
        let map: serde_json::Map<String, serde_json::Value> = report
            .scalars()
            .map(|(metric, v)| (metric.name().to_string(), serde_json::json!(v)))
            .collect();
        println!("{}", serde_json::Value::Object(map));
    } else {
        for (metric, v) in report.scalars() {
            println!("{:<20} {v:.6e}", metric.name());
        }
    }
}

/// Advance past `flag` and return its value.
fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> &'a str {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .unwrap_or_else(|| fail(&format!("{flag} needs a value")))
}

fn parse<T: std::str::FromStr>(s: &str, flag: &str) -> T {
    s.parse().unwrap_or_else(|_| fail(&format!("invalid value '{s}' for {flag}")))
}

fn fail(msg: &str) -> ! {
    eprintln!("error: {msg}");
    process::exit(1);
}

/// Mono WAV to f64 samples in [-1, 1]. Extra channels are averaged down.
fn read_wav(path: &Path) -> (Vec<f64>, f64) {
    let mut reader =
        hound::WavReader::open(path).unwrap_or_else(|e| fail(&format!("{}: {e}", path.display())));
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>(),
        hound::SampleFormat::Int => {
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f64 / scale))
                .collect::<Result<_, _>>()
        }
    }
    .unwrap_or_else(|e| fail(&format!("{}: {e}", path.display())));

    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect();
    (samples, spec.sample_rate as f64)
}

fn write_wav(path: &Path, samples: &[f64], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 24,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .unwrap_or_else(|e| fail(&format!("{}: {e}", path.display())));
    let scale = (1 << 23) as f64 - 1.0;
    for &s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        writer
            .write_sample((clamped * scale) as i32)
            .unwrap_or_else(|e| fail(&format!("{}: {e}", path.display())));
    }
    writer
        .finalize()
        .unwrap_or_else(|e| fail(&format!("{}: {e}", path.display())));
}

fn print_usage() {
    eprintln!(
        r#"Syllable Renderer: syrinx model resynthesis of a recorded syllable

USAGE:
    syllable-renderer -i <WAV> [OPTIONS]

OPTIONS:
    -i, --input <PATH>          Recorded syllable (WAV, mixed down to mono)
    -o, --output <PATH>         Synthetic WAV (default: <input>.synth.wav)
        --tlim <START,END>      Analyse only this window (seconds)
        --kind <KIND>           syllable-like (default) or chunk-like
        --a0 --a1 --a2 <X>      alpha(t) = a0 + a1 t + a2 t^2
        --b0 --b1 --b2 <X>      beta(t) = b0 + b1 y + b2 y^2 over the pitch fit y
        --gamma <X>             Time scale (default: 40000)
        --config <PATH>         JSON with simulation/analysis/score sections
        --constants <PATH>      JSON table of physical constants by species
        --species <KEY>         Entry of the constants table to use
        --oversample <N>        Integration steps per output sample (default: 20)
        --order <P|inf>         Norm order for score reduction (default: 2)
        --json                  Print scalar scores as one JSON object
    -h, --help                  Print this help

EXAMPLES:
    syllable-renderer -i syl.wav --a0 0.11 --a1 0.05 --b0 -0.1 --b1 1
    syllable-renderer -i song.wav --tlim 0.20,0.35 --kind chunk-like --json
    syllable-renderer -i syl.wav --constants birds.json --species zonotrichia"#
    );
}
