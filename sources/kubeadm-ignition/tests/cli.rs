use std::path::Path;
use std::process::Command;

const BIN: &str = env!("CARGO_BIN_EXE_kubeadm-ignition");

fn test_data(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test_data")
        .join(name)
        .display()
        .to_string()
}

#[test]
fn writes_ignition_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("worker.ign");

    let status = Command::new(BIN)
        .args(["--input", test_data("worker.toml").as_str(), "--output"])
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let written = std::fs::read(&output).unwrap();
    let config: serde_json::Value = serde_json::from_slice(&written).unwrap();
    assert_eq!(config["ignition"]["version"], "2.3.0");
    assert_eq!(config["systemd"]["units"][0]["name"], "kubeadm.service");
}

#[test]
fn writes_ignition_to_stdout() {
    let output = Command::new(BIN)
        .args(["-i", test_data("init-control-plane.toml").as_str(), "-l", "debug"])
        .output()
        .unwrap();
    assert!(output.status.success());
    // Logs go to stderr, so stdout is only the config.
    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(config["storage"]["files"].as_array().unwrap().len() > 2);
}

#[test]
fn emits_clc() {
    let output = Command::new(BIN)
        .args(["-i", test_data("worker.toml").as_str(), "--emit-clc"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let source = String::from_utf8(output.stdout).unwrap();
    assert!(source.contains("kubeadm.service"));
    assert!(source.contains("/etc/kubeadm.yml"));
}

#[test]
fn bad_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.toml");
    std::fs::write(&input, "[role]\ntype = \"observer\"\n").unwrap();

    let output = Command::new(BIN)
        .arg("--input")
        .arg(&input)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Unable to parse node input"), "{}", stderr);

    let output = Command::new(BIN)
        .args(["--input", test_data("does-not-exist.toml").as_str()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}
