use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_cli(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mapdl-session"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("mapdl-session should start")
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    let config = serde_json::json!({
        "sessionName": "demo",
        "workingDirectory": "work",
        "launchMode": "manual",
        "signalBackend": "file",
        "hooks": { "post": ["/COM, session post"] },
        "cases": [
            {
                "name": "A",
                "model": { "native": "models/a.db" },
                "components": { "groups": [{ "name": "Tip", "kind": "node" }], "units": 1 },
                "values": { "values": { "Tip_FX_i": { "value": 5.0 } } }
            },
            {
                "name": "B",
                "model": { "neutral": "models/b.cdb" },
                "loadHookFiles": false
            }
        ]
    });
    let path = dir.join("session.json");
    fs::write(
        &path,
        serde_json::to_string_pretty(&config).expect("config should encode"),
    )
    .expect("config should be written");
    path
}

#[test]
fn script_command_renders_every_configured_instance() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_config(temp.path());

    let output = run_cli(
        &["script", "--config", "session.json", "--output", "out/S_ctl.dat"],
        temp.path(),
    );
    assert!(
        output.status.success(),
        "script should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let script = fs::read_to_string(temp.path().join("out/S_ctl.dat"))
        .expect("script should be written to --output");
    assert!(script.contains("SES_TBL(1,1,1)='A'"));
    assert!(script.contains("SES_TBL(1,2,1)='B'"));
    assert!(script.contains("CDREAD,DB,'models/b','cdb'"));
    assert!(script.contains("/COM, session post"));
    assert!(script.contains("*DOWHILE,SES_LOOP"));
}

#[test]
fn signals_command_prints_names_and_stop_instructions() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = run_cli(
        &["signals", "--session", "beam_1", "--backend", "file"],
        temp.path(),
    );
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ready: SESbeam01READY"));
    assert!(stdout.contains("go: SESbeam01GO"));
    assert!(stdout.contains("write -1 to"));
    assert!(stdout.contains("SESbeam01GO.sig"));
}

#[test]
fn cache_command_reports_an_empty_cache() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_config(temp.path());

    let output = run_cli(&["cache", "--config", "session.json", "--case", "A"], temp.path());
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("(0 entries)"), "stdout was: {}", stdout);
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = run_cli(&["frobnicate"], temp.path());
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [CLI.USAGE]"), "stderr was: {}", stderr);
}

#[test]
fn overlong_session_name_is_a_configuration_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = run_cli(
        &["signals", "--session", "a_session_name_that_is_too_long"],
        temp.path(),
    );
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[CONFIG.SESSION_NAME]"), "stderr was: {}", stderr);
}

#[test]
fn missing_config_file_is_an_io_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = run_cli(&["run", "--config", "absent.json"], temp.path());
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[IO.CLI]"), "stderr was: {}", stderr);
    assert!(stderr.contains("absent.json"));
}

#[test]
fn duplicate_case_names_are_skipped_not_fatal() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = serde_json::json!({
        "sessionName": "dupes",
        "workingDirectory": "work",
        "launchMode": "manual",
        "signalBackend": "file",
        "timeoutSeconds": 0,
        "settleDelayMs": 0,
        "cases": [
            { "name": "A", "model": { "native": "a.db" }, "loadHookFiles": false },
            { "name": "A", "model": { "native": "other.db" }, "loadHookFiles": false },
            { "name": "B", "model": { "native": "b.db" }, "loadHookFiles": false }
        ]
    });
    fs::write(
        temp.path().join("dupes.json"),
        serde_json::to_string(&config).expect("config should encode"),
    )
    .expect("config should be written");

    let script = run_cli(&["script", "--config", "dupes.json"], temp.path());
    assert!(script.status.success());
    let text = String::from_utf8_lossy(&script.stdout);
    assert!(text.contains("*DIM,SES_TBL,STRING,"));
    assert!(text.contains("SES_TBL(1,2,1)='B'"));
    assert!(!text.contains("other"));

    let output = run_cli(&["run", "--config", "dupes.json"], temp.path());
    assert_eq!(output.status.code(), Some(5), "no engine answers in manual mode");
    let reports: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("run should print a JSON summary");
    let reports = reports.as_array().expect("summary should be an array");
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["case"], "A");
    assert_eq!(reports[1]["case"], "B");
    assert_eq!(reports[0]["status"], "failed");
}
