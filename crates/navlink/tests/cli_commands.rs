#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::{Command, Output};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/navlink-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn navlink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_navlink"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("navlink should run")
}

#[test]
fn encode_output_decodes_back() {
    let dir = unique_temp_dir("roundtrip");
    let frame_path = dir.join("frame.bin");
    let frame_arg = frame_path.to_str().expect("utf-8 path");

    let encode = navlink(&[
        "--format",
        "json",
        "encode",
        "--protocol",
        "rover-terminal",
        "--id",
        "0x43",
        "--data",
        "status?",
        "--out",
        frame_arg,
    ]);
    assert!(encode.status.success());
    let stdout = String::from_utf8_lossy(&encode.stdout);
    assert!(stdout.contains("\"protocol\":\"rover-terminal\""));

    let decode = navlink(&[
        "--format",
        "json",
        "decode",
        frame_arg,
        "--protocol",
        "rover-terminal",
        "--strict",
    ]);
    assert!(decode.status.success());
    let stdout = String::from_utf8_lossy(&decode.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"name\":\"console_input\""));
    assert!(lines[1].contains("\"aborted_messages\":0"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn raw_encode_writes_frame_bytes() {
    let output = navlink(&[
        "--format",
        "raw",
        "encode",
        "--protocol",
        "onboard-logs",
        "--id",
        "0x0203",
        "--hex",
        "6f6b00",
    ]);
    assert!(output.status.success());
    assert_eq!(
        output.stdout,
        vec![0xAA, 0x05, 0x00, 0x03, 0x02, b'o', b'k', 0x00]
    );
}

#[test]
fn strict_decode_of_corrupted_capture_returns_60() {
    let dir = unique_temp_dir("strict");
    let frame_path = dir.join("frame.bin");
    let frame_arg = frame_path.to_str().expect("utf-8 path");

    let encode = navlink(&[
        "encode",
        "--protocol",
        "rover-terminal",
        "--data",
        "hello",
        "--out",
        frame_arg,
    ]);
    assert!(encode.status.success());

    let mut bytes = std::fs::read(&frame_path).expect("frame should exist");
    bytes[8] ^= 0x20;
    std::fs::write(&frame_path, &bytes).expect("frame should be writable");

    let lenient = navlink(&[
        "--format",
        "json",
        "decode",
        frame_arg,
        "--protocol",
        "rover-terminal",
    ]);
    assert!(lenient.status.success());
    assert!(String::from_utf8_lossy(&lenient.stdout).contains("\"failed_verifications\":1"));

    let strict = navlink(&[
        "--format",
        "json",
        "decode",
        frame_arg,
        "--protocol",
        "rover-terminal",
        "--strict",
    ]);
    assert_eq!(strict.status.code(), Some(60));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn checksum_prints_reference_crc() {
    let output = navlink(&[
        "--format",
        "json",
        "checksum",
        "--verifier",
        "crc16",
        "--data",
        "123456789",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"checksum\":\"0x31C3\""));
    assert!(stdout.contains("\"polynomial\":\"0x1021\""));
}

#[test]
fn layout_reports_max_payload() {
    let output = navlink(&["--format", "json", "layout", "--protocol", "onboard-logs"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"max_payload_len\":1021"));
}

#[test]
fn invalid_hex_returns_usage() {
    let output = navlink(&["checksum", "--verifier", "crc8", "--hex", "zz"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--hex is not valid hex"));
}

#[test]
fn oversized_payload_returns_data_invalid() {
    let big = "x".repeat(300);
    let output = navlink(&[
        "--format",
        "raw",
        "encode",
        "--protocol",
        "rover-terminal",
        "--data",
        &big,
    ]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn missing_capture_fails() {
    let output = navlink(&[
        "decode",
        "/tmp/navlink-does-not-exist.bin",
        "--protocol",
        "onboard-logs",
    ]);
    assert_eq!(output.status.code(), Some(1));
}
