use std::process::Command;

use tempfile::TempDir;

fn scatterlight(root: &TempDir) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_scatterlight"));
    command
        .env("SCATTERLIGHT_CONFIG_DIR", root.path().join("config"))
        .env("SCATTERLIGHT_DATA_DIR", root.path().join("data"))
        .env("SCATTERLIGHT_OUTPUT_DIR", root.path().join("renders"));
    command
}

#[test]
fn where_reports_env_overridden_locations() {
    let root = TempDir::new().unwrap();
    let output = scatterlight(&root)
        .arg("where")
        .output()
        .expect("failed to run scatterlight where");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let config_line = format!(
        "config: {}",
        root.path().join("config").join("scatterlight.toml").display()
    );
    let camera_line = format!(
        "camera: {}",
        root.path().join("data").join("camera.toml").display()
    );
    let output_line = format!("output: {}", root.path().join("renders").display());
    assert!(stdout.contains(&config_line), "{stdout}");
    assert!(stdout.contains(&camera_line), "{stdout}");
    assert!(stdout.contains(&output_line), "{stdout}");
}

#[test]
fn where_reports_flag_overrides() {
    let root = TempDir::new().unwrap();
    let renders = root.path().join("elsewhere");
    let camera = root.path().join("saved").join("cam.toml");
    let output = scatterlight(&root)
        .arg("--output-dir")
        .arg(&renders)
        .arg("--state-file")
        .arg(&camera)
        .arg("where")
        .output()
        .expect("failed to run scatterlight where");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(
        stdout.contains(&format!("output: {}", renders.display())),
        "{stdout}"
    );
    assert!(
        stdout.contains(&format!("camera: {}", camera.display())),
        "{stdout}"
    );
}

#[test]
fn rejects_zero_sized_window() {
    let root = TempDir::new().unwrap();
    let output = scatterlight(&root)
        .args(["--size", "0x720", "capture"])
        .output()
        .expect("failed to run scatterlight");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("greater than zero"), "{stderr}");
}

#[test]
fn help_lists_headless_subcommands() {
    let output = Command::new(env!("CARGO_BIN_EXE_scatterlight"))
        .arg("--help")
        .output()
        .expect("failed to run scatterlight --help");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("capture"));
    assert!(stdout.contains("video"));
}
