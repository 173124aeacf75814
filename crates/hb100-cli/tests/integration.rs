//! Integration tests driving the `hb100-edit` binary in offline mode.

use std::path::Path;
use std::process::Command;

use hb100_catalog::PRESET_SIZE;
use hb100_preset::{decode_binary, decode_phb, encode_binary, export_preset, Preset};

fn hb100_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_hb100-edit"))
}

fn sample_preset(name: &str) -> Preset {
    let mut p = Preset::new(name);
    p.id = 11;
    p.effects[1].active = true;
    p.effects[1].id = 1;
    p.effects[1].values[0] = 64;
    p.effects[2].active = true;
    p.effects[2].id = 4;
    p.effects[2].values = [80, 50, 50, 55, 40, 90];
    p.expressions = [1, 1, 0, 100, 3, 64];
    p
}

fn write_binary(path: &Path, preset: &Preset) {
    std::fs::write(path, encode_binary(preset).unwrap()).unwrap();
}

#[test]
fn offline_roundtrip_binary_to_phb() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.bhb");
    let output = dir.path().join("a.json");
    write_binary(&input, &sample_preset("Round Trip"));

    let status = hb100_bin()
        .args(["--offline", "-d", "0", "-b"])
        .arg(&input)
        .arg("-P")
        .arg(&output)
        .status()
        .expect("failed to run hb100-edit");
    assert!(status.success());

    let text = std::fs::read_to_string(&output).unwrap();
    assert!(text.ends_with('\n'));
    let preset = decode_phb(&text).unwrap();
    assert_eq!(preset.name, "Round Trip");
    assert_eq!(preset.effects[2].values[0], 80);
}

#[test]
fn offline_roundtrip_phb_to_binary() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.phb");
    let output = dir.path().join("out.bhb");
    let original = sample_preset("Glassy");
    export_preset(&original, &input, true).unwrap();

    let status = hb100_bin()
        .args(["-o", "-d", "0", "-p"])
        .arg(&input)
        .arg("-B")
        .arg(&output)
        .status()
        .expect("failed to run hb100-edit");
    assert!(status.success());

    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(bytes.len(), PRESET_SIZE);
    let preset = decode_binary(&bytes).unwrap();
    // PHB dropped the slot, so the converted record is unassigned
    assert_eq!(preset.id, 0);
    assert_eq!(preset.name, "Glassy");
    assert_eq!(preset.expressions, original.expressions);
}

#[test]
fn both_input_formats_at_once_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let bhb = dir.path().join("a.bhb");
    let phb = dir.path().join("a.phb");
    let preset = sample_preset("Twice");
    write_binary(&bhb, &preset);
    export_preset(&preset, &phb, true).unwrap();

    let status = hb100_bin()
        .args(["--offline", "-d", "0", "-b"])
        .arg(&bhb)
        .arg("-p")
        .arg(&phb)
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn output_without_input_is_fatal() {
    let status = hb100_bin()
        .args(["--offline", "-d", "0", "-B", "nowhere.bhb"])
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn unreadable_input_is_fatal() {
    let status = hb100_bin()
        .args(["--offline", "-d", "0", "-b", "no-such-file.bhb"])
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn offline_with_nothing_to_do_exits_cleanly() {
    let output = hb100_bin().args(["--offline", "-d", "0"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("HB100 editor"));
    assert!(stdout.contains("Bye!"));
}

#[test]
fn imported_preset_is_dumped_when_not_converting() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("dump.bhb");
    write_binary(&input, &sample_preset("Dump Me"));

    let output = hb100_bin()
        .args(["--offline", "-C", "-b"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Dump Me"));
    assert!(stdout.contains("AMP"));
    assert!(stdout.contains("Expression"));
}

#[test]
fn help_lists_the_option_surface() {
    let output = hb100_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for option in [
        "--interactive",
        "--http-ws",
        "--offline",
        "--no-init",
        "--no-get-presets",
        "--no-get-extras",
        "--save-presets",
        "--change-preset",
        "--preset-in",
        "--preset-out",
        "--phb-in",
        "--phb-out",
        "--upload-preset",
        "--debug-level",
        "--debug-timestamps",
        "--disable-colors",
        "--libusb-debug",
    ] {
        assert!(stdout.contains(option), "missing {option} in --help");
    }
}
