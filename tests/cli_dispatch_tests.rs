use std::process::Command;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_bioclash")
}

#[test]
fn simulate_command_dispatches_and_emits_json() {
    let output = Command::new(bin())
        .args(["simulate", "4", "11"])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("simulate should emit json");
    assert_eq!(payload["seed"], 11);
    assert_eq!(payload["max_rounds"], 4);
    let rounds = payload["rounds"].as_u64().expect("rounds should be a number");
    assert!((1..=4).contains(&rounds));
    assert_eq!(payload["event_count"].as_u64(), Some(rounds * 2));
    assert_eq!(payload["log"].as_array().map(Vec::len), Some(rounds as usize));
}

#[test]
fn simulate_is_deterministic_for_a_seed() {
    let run = || {
        Command::new(bin())
            .args(["simulate", "10", "5"])
            .output()
            .expect("simulate should run")
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn simulate_csv_flag_emits_damage_log() {
    let output = Command::new(bin())
        .args(["simulate", "3", "2", "--csv"])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();
    assert_eq!(
        lines.next(),
        Some("round,source,target,raw_damage,applied_damage,hit")
    );
    assert!(lines.count() >= 2);
}

#[test]
fn forecast_command_emits_rates() {
    let output = Command::new(bin())
        .args(["forecast", "300", "4"])
        .output()
        .expect("forecast should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("forecast should emit json");
    assert_eq!(payload["iterations"], 300);
    assert!(payload["victory_rate"].is_number());
}

#[test]
fn unknown_command_prints_usage() {
    let output = Command::new(bin())
        .arg("optimize")
        .output()
        .expect("binary should run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: bioclash"));
}
