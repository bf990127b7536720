use std::path::{Path, PathBuf};

use assert_cmd::Command;
use image::{Rgba, RgbaImage};
use predicates::prelude::*;

fn boxlens() -> Command {
    let mut cmd = Command::cargo_bin("boxlens").unwrap();
    cmd.env_remove("GEMINI_API_KEY")
        .env_remove("BOXLENS_GEMINI_API_KEY")
        .env("RUST_LOG", "warn");
    cmd
}

/// Config with a fixed red palette and no font files, so output is deterministic.
fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(
        &path,
        r##"
[render]
palette = ["#ff0000"]
font_files = []
"##,
    )
    .unwrap();
    path
}

fn write_white_png(dir: &Path, w: u32, h: u32) -> PathBuf {
    let path = dir.join("input.png");
    RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
        .save(&path)
        .unwrap();
    path
}

#[test]
fn outputs_tool_name() {
    let mut cmd = boxlens();
    cmd.arg("-V");
    cmd.assert().success().stdout("boxlens 0.1.0\n");
}

#[test]
fn decode_reads_json_from_stdin() {
    let mut cmd = boxlens();
    cmd.arg("decode").write_stdin(r#"{"cat": [100, 200, 300, 400]}"#);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"cat\""))
        .stdout(predicate::str::contains("400"));
}

#[test]
fn decode_recovers_boxes_from_prose_in_order() {
    let mut cmd = boxlens();
    cmd.arg("decode").write_stdin(
        r#"Here are the results: "dog": [0, 0, 500, 500] and "cat": [500, 500, 1000, 1000]"#,
    );
    let output = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();
    let dog = stdout.find("\"dog\"").expect("dog decoded");
    let cat = stdout.find("\"cat\"").expect("cat decoded");
    assert!(dog < cat);
}

#[test]
fn decode_without_boxes_prints_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("reply.txt");
    std::fs::write(&input, "Sorry, I can't see anything.").unwrap();

    let mut cmd = boxlens();
    cmd.arg("decode").arg(&input);
    cmd.assert().success().stdout("{}\n");
}

#[test]
fn render_draws_boxes_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let image = write_white_png(dir.path(), 400, 800);
    let reply = dir.path().join("reply.txt");
    std::fs::write(&reply, r#"```json
{"tower": [500, 250, 750, 500]}
```"#)
    .unwrap();
    let output = dir.path().join("out.png");

    let mut cmd = boxlens();
    cmd.arg("--config")
        .arg(&config)
        .arg("render")
        .arg(&image)
        .arg(&reply)
        .arg("--output")
        .arg(&output);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("#ff0000 tower"));

    let out = image::open(&output).unwrap().to_rgba8();
    assert_eq!(out.dimensions(), (400, 800));
    // x 100..200, y 400..600 on a 400x800 image
    assert_eq!(*out.get_pixel(150, 600), Rgba([255, 0, 0, 255]));
    assert_eq!(*out.get_pixel(200, 500), Rgba([255, 0, 0, 255]));
    assert_eq!(*out.get_pixel(150, 700), Rgba([255, 255, 255, 255]));
}

#[test]
fn render_without_boxes_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let image = write_white_png(dir.path(), 10, 10);
    let reply = dir.path().join("reply.txt");
    std::fs::write(&reply, "nothing here").unwrap();
    let output = dir.path().join("out.png");

    let mut cmd = boxlens();
    cmd.arg("--config")
        .arg(&config)
        .arg("render")
        .arg(&image)
        .arg(&reply)
        .arg("-o")
        .arg(&output);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("No valid bounding box coordinates found"));
    assert!(!output.exists());
}

#[test]
fn render_rejects_non_images() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let bogus = dir.path().join("photo.jpg");
    std::fs::write(&bogus, "definitely not a jpeg").unwrap();
    let reply = dir.path().join("reply.txt");
    std::fs::write(&reply, r#"{"a": [1, 2, 3, 4]}"#).unwrap();

    let mut cmd = boxlens();
    cmd.arg("--config").arg(&config).arg("render").arg(&bogus).arg(&reply);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not a valid JPG, JPEG or PNG image"));
}

#[test]
fn detect_without_api_key_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let image = write_white_png(dir.path(), 10, 10);

    let mut cmd = boxlens();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("detect")
        .arg(&image);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no API key"));
}

#[test]
fn models_lists_default_gemini_models() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let mut cmd = boxlens();
    cmd.arg("--config").arg(&config).arg("models");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("* gemini (Google Gemini)"))
        .stdout(predicate::str::contains("gemini-1.5-pro (default)"))
        .stdout(predicate::str::contains("gemini-1.5-flash-exp-0827"));
}

#[test]
fn missing_explicit_config_is_an_error() {
    let mut cmd = boxlens();
    cmd.arg("--config").arg("does/not/exist.toml").arg("models");
    cmd.assert().failure().stderr(predicate::str::contains("error:"));
}
