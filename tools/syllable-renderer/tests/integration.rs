/// Integration tests for the syllable renderer CLI.
///
/// Each test writes a short chirp as the "recording", runs the binary on it
/// and checks the synthetic WAV and the printed scores.
use std::path::PathBuf;
use std::process::Command;

const SR: u32 = 44100;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "syllable-renderer", "--"]);
    cmd
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(name)
}

fn write_chirp(name: &str, seconds: f64) -> PathBuf {
    let path = temp_path(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SR,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).expect("failed to create input WAV");
    let n = (seconds * SR as f64) as usize;
    for i in 0..n {
        let t = i as f64 / SR as f64;
        let s = 0.5 * (2.0 * std::f64::consts::PI * (3000.0 * t + 6000.0 * t * t)).sin();
        writer.write_sample((s * 32767.0) as i16).expect("failed to write sample");
    }
    writer.finalize().expect("failed to finalize input WAV");
    path
}

#[test]
fn test_cli_renders_and_scores() {
    let input = write_chirp("syllable_cli_in.wav", 0.2);
    let output = temp_path("syllable_cli_out.wav");
    let _ = std::fs::remove_file(&output);

    let out = cargo_bin()
        .args(["--oversample", "4", "--json", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .output()
        .expect("failed to run syllable-renderer");

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(output.exists(), "WAV file not created");

    let reader = hound::WavReader::open(&output).expect("invalid WAV file");
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, SR);
    assert_eq!(reader.spec().bits_per_sample, 24);
    assert_eq!(reader.len(), 8820);

    let scores: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout is not JSON");
    for key in ["scoreFF", "scoreSxx", "scoreMel", "scoreMfccs", "scoreDF", "deltaFF_mean"] {
        assert!(scores[key].is_number(), "missing {key}");
    }

    std::fs::remove_file(&input).ok();
    std::fs::remove_file(&output).ok();
}

#[test]
fn test_cli_window() {
    let input = write_chirp("syllable_cli_window_in.wav", 0.5);
    let output = temp_path("syllable_cli_window_out.wav");
    let _ = std::fs::remove_file(&output);

    let status = cargo_bin()
        .args(["--oversample", "4", "--kind", "chunk-like", "--tlim", "0.1,0.3", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .status()
        .expect("failed to run syllable-renderer");

    assert!(status.success());
    let reader = hound::WavReader::open(&output).expect("invalid WAV file");
    assert_eq!(reader.len(), 8820);

    std::fs::remove_file(&input).ok();
    std::fs::remove_file(&output).ok();
}

#[test]
fn test_cli_constants_table() {
    let input = write_chirp("syllable_cli_table_in.wav", 0.2);
    let output = temp_path("syllable_cli_table_out.wav");
    let table = temp_path("syllable_cli_constants.json");
    std::fs::write(
        &table,
        r#"{ "test-bird": {
            "speed_of_sound": 350.0, "trachea_length": 0.019, "reflection": 0.0,
            "oec_compliance": 1.4e-10, "glottis_inertance": 20.0, "beak_inertance": 1e4,
            "beak_resistance": 5e6, "oec_resistance": 24e3 } }"#,
    )
    .unwrap();

    let ok = cargo_bin()
        .args(["--oversample", "4", "--species", "test-bird", "--constants"])
        .arg(&table)
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .status()
        .expect("failed to run syllable-renderer");
    assert!(ok.success());

    let missing = cargo_bin()
        .args(["--species", "other-bird", "--constants"])
        .arg(&table)
        .arg("-i")
        .arg(&input)
        .output()
        .expect("failed to run syllable-renderer");
    assert_eq!(missing.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&missing.stderr);
    assert!(stderr.contains("available: test-bird"), "stderr: {stderr}");

    std::fs::remove_file(&input).ok();
    std::fs::remove_file(&output).ok();
    std::fs::remove_file(&table).ok();
}

#[test]
fn test_cli_rejects_bad_configuration() {
    let input = write_chirp("syllable_cli_bad_in.wav", 0.2);

    for args in [
        vec!["--kind", "song-like"],
        vec!["--oversample", "0"],
        vec!["--order", "0.5"],
        vec!["--gamma", "fast"],
    ] {
        let status = cargo_bin()
            .args(&args)
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(temp_path("syllable_cli_bad_out.wav"))
            .status()
            .expect("failed to run syllable-renderer");
        assert_eq!(status.code(), Some(1), "{args:?} should be rejected");
    }

    std::fs::remove_file(&input).ok();
}
