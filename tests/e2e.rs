use std::process::Command;

use vend_core::token;

const HEADER: &str = "user,utility,meter,amount,method,status,token,reference";

fn run(fixture: &str) -> (String, String, bool) {
    let path = format!("tests/fixtures/{fixture}");
    let output = Command::new(env!("CARGO_BIN_EXE_vend"))
        .arg(&path)
        .env("VEND_CONFIG", "tests/fixtures/vend.toml")
        .env("RUST_LOG", "warn")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn fields(line: &str) -> Vec<&str> {
    line.split(',').collect()
}

#[test]
fn valid_purchases() {
    let (stdout, stderr, success) = run("valid.csv");

    assert!(success);
    assert!(stderr.is_empty(), "unexpected stderr: {stderr}");

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], HEADER);
    assert_eq!(lines.len(), 4);

    let rows: Vec<Vec<&str>> = lines[1..].iter().map(|l| fields(l)).collect();
    assert_eq!(
        rows[0][..6],
        ["user-1", "Eko Electric", "45012345678", "5000.00", "wallet", "success"]
    );
    assert_eq!(
        rows[1][..6],
        ["user-1", "Ikeja Electric", "0101", "1000.00", "card", "success"]
    );
    assert_eq!(
        rows[2][..6],
        ["user-2", "Eko Electric", "99", "2500.50", "ussd", "success"]
    );

    for row in &rows {
        assert!(token::validate_checksum(row[6]).is_ok(), "bad token {}", row[6]);
        assert!(row[7].starts_with("PV"));
    }
}

#[test]
fn errors_warn_but_do_not_block() {
    let (stdout, stderr, success) = run("with_errors.csv");

    assert!(success);
    assert!(stderr.contains("unrecognized payment method"));
    assert!(stderr.contains("unknown utility"));
    assert!(stderr.contains("below the minimum purchase"));
    assert!(stderr.contains("insufficient wallet balance"));
    assert!(stderr.contains("duplicate submission"));

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], HEADER);
    assert_eq!(lines.len(), 2);
    assert_eq!(
        fields(lines[1])[..6],
        ["user-1", "Eko Electric", "1", "1000.00", "bank_transfer", "success"]
    );
}

#[test]
fn missing_argument_is_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_vend"))
        .output()
        .expect("failed to run binary");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("usage"));
}

#[test]
fn dotenv_log_level_applies_to_subscriber() {
    let root = env!("CARGO_MANIFEST_DIR");
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".env"),
        format!("RUST_LOG=info\nVEND_CONFIG={root}/tests/fixtures/vend.toml\n"),
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_vend"))
        .arg(format!("{root}/tests/fixtures/valid.csv"))
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("VEND_CONFIG")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run binary");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("purchase completed"), "stderr: {stderr}");
}
