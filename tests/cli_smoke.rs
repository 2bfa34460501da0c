use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

fn abs(x: u16, y: u16) -> [u8; 3] {
    [
        (((x >> 4) & 0xF0) | ((y >> 8) & 0x0F)) as u8,
        (x & 0xFF) as u8,
        (y & 0xFF) as u8,
    ]
}

#[test]
fn cli_frame_writes_png() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();

    let payload_path = dir.join("picture.b64");
    let out_path = dir.join("out.png");
    let _ = std::fs::remove_file(&out_path);

    // A line and a fill, uncompressed sci0.
    let mut bytes = vec![0xF0, 0x00, 0xF6];
    bytes.extend_from_slice(&abs(10, 10));
    bytes.extend_from_slice(&abs(60, 40));
    bytes.push(0xFF);
    std::fs::write(&payload_path, BASE64.encode(&bytes)).unwrap();

    let exe = std::env::var_os("CARGO_BIN_EXE_retropic")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "retropic.exe"
            } else {
                "retropic"
            });
            p
        });

    let payload_arg = payload_path.to_string_lossy().to_string();
    let out_arg = out_path.to_string_lossy().to_string();

    let status = std::process::Command::new(exe)
        .args([
            "frame",
            "--in",
            payload_arg.as_str(),
            "--dither",
            "2x2",
            "--post-scaler",
            "5x6",
            "--out",
        ])
        .arg(out_arg.as_str())
        .status()
        .unwrap();

    assert!(status.success());
    assert!(out_path.exists());
}
