use romi_config::{
    PersistedCalibration, load_calibration, load_calibration_toml, load_line_calibration_csv,
    save_calibration,
};
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

#[test]
fn reads_rows_in_sensor_order() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("line.csv");
    fs::write(&path, "sensor,dark,light\n0,3890,410\n1,3902,398\n2,3911,402\n").expect("write");

    let cal = load_line_calibration_csv(&path).expect("load");
    assert_eq!(cal.dark, vec![3890, 3902, 3911]);
    assert_eq!(cal.light, vec![410, 398, 402]);
    assert!(cal.heading_offset_deg.is_none());
}

#[rstest]
#[case("idx,dark,light\n0,1,2\n", "headers 'sensor,dark,light'")]
#[case("sensor,light,dark\n0,1,2\n", "headers 'sensor,dark,light'")]
#[case("sensor,dark,light\n", "no rows")]
#[case("sensor,dark,light\n1,3900,400\n", "expected 0")]
#[case("sensor,dark,light\n0,abc,400\n", "invalid CSV row 2")]
#[case("sensor,dark,light\n0,70000,400\n", "invalid CSV row 2")]
fn rejects_malformed_csv(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("line.csv");
    fs::write(&path, body).expect("write");
    let err = load_line_calibration_csv(&path).expect_err("should fail");
    let msg = format!("{err}");
    assert!(msg.contains(needle), "unexpected message: {msg}");
}

#[test]
fn save_then_load_restores_everything() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cal.toml");
    let cal = PersistedCalibration {
        dark: vec![3900, 3880],
        light: vec![400, 420],
        heading_offset_deg: Some(271.25),
        imu_coefficients: Some((0u8..22).collect()),
    };
    save_calibration(&path, &cal).expect("save");
    assert!(!path.with_extension("new").exists(), "temp file renamed away");

    let back = load_calibration(&path).expect("load");
    assert_eq!(back, cal);
}

#[test]
fn save_refuses_invalid_block() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cal.toml");
    let cal = PersistedCalibration {
        imu_coefficients: Some(vec![0; 21]),
        ..PersistedCalibration::default()
    };
    assert!(save_calibration(&path, &cal).is_err());
    assert!(!path.exists());
}

#[test]
fn toml_loader_rejects_mismatched_arrays() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cal.toml");
    fs::write(&path, "[calibration]\ndark = [1, 2, 3]\nlight = [1, 2]\n").expect("write");
    let err = load_calibration_toml(&path).expect_err("mismatch");
    assert!(format!("{err}").contains("calibration.dark has 3 entries"));
}

#[test]
fn dispatches_on_extension() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("line.CSV");
    fs::write(&path, "sensor,dark,light\n0,3000,500\n").expect("write");
    let cal = load_calibration(&path).expect("csv by extension");
    assert_eq!(cal.dark, vec![3000]);
}
