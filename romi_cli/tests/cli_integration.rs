use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Six-sensor robot on the simulator; pins are unused by the sim backend
// but must be present.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[pins]
left_enc_a = 4
left_enc_b = 17
right_enc_a = 27
right_enc_b = 22
line_channels = [0, 1, 2, 3, 4, 5]
line_even = 5
line_odd = 6
bumpers = [12, 16]
left_pwm = 18
left_dir = 23
left_sleep = 24
right_pwm = 19
right_dir = 25
right_sleep = 26

[control]
cycle_ms = 5
base_effort = 20.0
max_effort = 45.0

[pid.line]
kp = 8.0
kd = 0.05
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn romi(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("romi").unwrap();
    cmd.arg("--config").arg(cfg).env_remove("RUST_LOG");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["run", "--cycles", "20"], 0, "stopped: Cycles after 20 cycles", "stdout")]
#[case(&["self-check"], 0, "self-check OK", "stdout")]
#[case(&["calibrate"], 2, "--out", "stderr")]
#[case(&["run", "--cycles", "abc"], 2, "invalid value", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = romi(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn run_stops_on_bump() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = romi(&cfg)
        .env("ROMI_SIM_OBSTACLE_M", "0.01")
        .args(["--json", "run", "--cycles", "2000"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["stop_reason"], "Bump");
    assert!(v["cycles"].as_u64().unwrap() < 2000);
    assert_eq!(v["bumped_sensors"], serde_json::json!([0, 1]));
}

#[test]
fn run_keeps_going_after_bump_when_asked() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = romi(&cfg)
        .env("ROMI_SIM_OBSTACLE_M", "0.005")
        .args(["--json", "run", "--cycles", "60", "--no-stop-on-bump"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["stop_reason"], "Cycles");
    assert_eq!(v["cycles"], 60);
    assert_eq!(v["bumps"], 1);
}

#[test]
fn json_run_summary_has_wheel_state() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = romi(&cfg)
        .args(["--json", "run", "--cycles", "30"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["stop_reason"], "Cycles");
    assert!(v["left_rad"].as_f64().unwrap() > 0.0);
    assert!(v["right_rad"].as_f64().unwrap() > 0.0);
    assert!(v["heading_deg"].is_null());
}

#[test]
fn self_check_reports_chip_mismatch_with_exit_code() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    romi(&cfg)
        .env("ROMI_SIM_CHIP_ID", "0x42")
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("chip id 0x42"));
}

#[test]
fn chip_mismatch_as_json() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = romi(&cfg)
        .env("ROMI_SIM_CHIP_ID", "66")
        .args(["--json", "run", "--cycles", "5", "--heading-hold"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));

    let line = String::from_utf8_lossy(&out.stderr)
        .lines()
        .find(|l| l.contains("\"reason\""))
        .map(str::to_string)
        .expect("structured error line");
    let v: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(v["reason"], "ChipIdMismatch");
    assert_eq!(v["details"]["found"], 0x42);
}

#[test]
fn calibrate_writes_a_restorable_file() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out_path = dir.path().join("cal.toml");

    romi(&cfg)
        .args(["calibrate", "--pause-ms", "0", "--out"])
        .arg(&out_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("saved calibration"));

    let text = fs::read_to_string(&out_path).unwrap();
    assert!(text.contains("[calibration]"));
    let cal = romi_config::load_calibration(&out_path).unwrap();
    assert_eq!(cal.dark.len(), 6);
    assert_eq!(cal.light.len(), 6);
    assert!(cal.dark.iter().zip(&cal.light).all(|(d, l)| d > l));
    assert_eq!(cal.imu_coefficients.as_ref().map(Vec::len), Some(22));

    // The saved file drives a run with heading hold.
    romi(&cfg)
        .arg("--calibration")
        .arg(&out_path)
        .args(["run", "--cycles", "20", "--heading-hold"])
        .assert()
        .success()
        .stdout(predicate::str::contains("heading:"));
}

#[test]
fn calibrated_run_tracks_the_line() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let csv = dir.path().join("cal.csv");
    let mut f = fs::File::create(&csv).unwrap();
    writeln!(f, "sensor,dark,light").unwrap();
    for i in 0..6 {
        writeln!(f, "{i},3900,400").unwrap();
    }

    let out = romi(&cfg)
        .arg("--calibration")
        .arg(&csv)
        .args(["--json", "run", "--cycles", "40"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["line_lost"], false);
    let c = v["centroid"].as_f64().unwrap();
    assert!(c > 1.0 && c < 6.0, "centroid {c}");
}

#[rstest]
fn cli_reports_bad_calibration_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let bad_csv = dir.path().join("calib.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "raw,value").unwrap();
    writeln!(f, "100,0.0").unwrap();

    romi(&cfg)
        .arg("--calibration")
        .arg(&bad_csv)
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[test]
fn calibration_for_wrong_sensor_count_is_rejected() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let csv = dir.path().join("cal.csv");
    fs::write(&csv, "sensor,dark,light\n0,3900,400\n1,3900,400\n").unwrap();

    romi(&cfg)
        .arg("--calibration")
        .arg(&csv)
        .args(["run", "--cycles", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("one entry per line sensor (6)"));
}

#[test]
fn invalid_config_is_explained() {
    let dir = tempdir().unwrap();
    let path = write_valid_config(&dir);
    let text = fs::read_to_string(&path).unwrap();
    fs::write(&path, text.replace("max_effort = 45.0", "max_effort = 150.0")).unwrap();

    romi(&path)
        .args(["run", "--cycles", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("control.max_effort must be in (0, 100]"));
}

#[test]
fn missing_config_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope.toml");
    romi(&path)
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.toml"));
}
