// Integration tests for the `payrecon` binary: inspect, run, validate, exit codes.
// Run with: cargo test -p payrecon-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use payrecon_io::xlsx::write_workbook;
use payrecon_io::{SheetOut, Table};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    fixtures().join(name).to_string_lossy().into_owned()
}

fn payrecon() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_payrecon"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env("PAYRECON_SETTINGS", fixtures().join("settings.toml"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run(args: &[&str]) -> Output {
    payrecon().args(args).output().expect("spawn payrecon")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

#[test]
fn inspect_csv_lists_sentinel_and_columns() {
    let out = run(&["inspect", &fixture("meesho_sales.csv")]);
    assert!(out.status.success(), "exit code was {:?}", out.status);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("(unselected)"));
    assert!(stdout.contains("Invoice Amount"));
    assert!(stdout.contains("* Single Sheet"));
}

#[test]
fn inspect_json_shape() {
    let out = run(&["inspect", &fixture("meesho_prev.csv"), "--json"]);
    assert!(out.status.success());
    let v = stdout_json(&out);
    assert_eq!(v["sheets"][0], "Single Sheet");
    assert_eq!(v["columns"][0], "(unselected)");
    assert_eq!(v["columns"][2], "Final Settlement Amount");
    assert!(v.get("error").is_none());
}

#[test]
fn inspect_workbook_other_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settlement.xlsx");
    let cover = Table { headers: vec!["Report".into()], rows: vec![] };
    let payments = Table {
        headers: vec!["Order Item ID".into(), "Settlement Amount".into()],
        rows: vec![vec!["F1".into(), "600".into()]],
    };
    let bytes = write_workbook(&[
        SheetOut { name: "Cover", table: &cover },
        SheetOut { name: "Payments", table: &payments },
    ])
    .unwrap();
    std::fs::write(&path, bytes).unwrap();
    let path = path.to_string_lossy().into_owned();

    let out = run(&["inspect", &path, "--json"]);
    let v = stdout_json(&out);
    assert_eq!(v["sheets"], serde_json::json!(["Cover", "Payments"]));
    assert_eq!(v["active_sheet"], "Cover");

    let out = run(&["inspect", &path, "--sheet", "Payments", "--json"]);
    let v = stdout_json(&out);
    assert_eq!(v["active_sheet"], "Payments");
    assert_eq!(v["columns"], serde_json::json!(["(unselected)", "Order Item ID", "Settlement Amount"]));

    let out = run(&["inspect", &path, "--sheet", "Returns"]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn inspect_unsupported_file_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statement.pdf");
    std::fs::write(&path, b"%PDF-1.4").unwrap();
    let out = run(&["inspect", &path.to_string_lossy()]);
    assert_eq!(out.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&out.stderr).contains("unsupported file type"));
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_json_covers_every_marketplace() {
    let out = run(&["run", &fixture("close.job.toml"), "--json"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let v = stdout_json(&out);
    assert_eq!(v["job"], "October close");

    let results = v["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    // Settings order: Flipkart before Meesho
    assert_eq!(results[0]["meta"]["marketplace"], "Flipkart");
    assert_eq!(results[0]["variance_minor"], 0);

    let meesho = &results[1];
    assert_eq!(meesho["meta"]["marketplace"], "Meesho");
    assert_eq!(meesho["variance_minor"], 7525);
    assert_eq!(meesho["discrepancies"][0]["order_id"], "M4");
    assert_eq!(meesho["discrepancies"][0]["flags"][0]["kind"], "unpaid");
    assert_eq!(meesho["orphan_payments"][0]["order_id"], "M7");
}

#[test]
fn run_human_summary_on_stderr() {
    let out = run(&["run", &fixture("close.job.toml"), "--marketplace", "meesho"]);
    assert!(out.status.success());
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Meesho reconciliation"));
    assert!(stderr.contains("75.25"));
    assert!(!stderr.contains("Flipkart"));
}

#[test]
fn strict_fails_on_discrepancies() {
    let out = run(&["run", &fixture("close.job.toml"), "--strict"]);
    assert_eq!(out.status.code(), Some(12));
}

#[test]
fn tolerance_flag_absorbs_small_differences() {
    let out = run(&["run", &fixture("close.job.toml"), "--strict", "--tolerance", "100"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn bad_tolerance_is_usage_error() {
    let out = run(&["run", &fixture("close.job.toml"), "--tolerance", "lots"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn unknown_marketplace_is_usage_error() {
    let out = run(&["run", &fixture("close.job.toml"), "--marketplace", "amazon"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("available: flipkart, meesho"));
}

#[test]
fn incomplete_mapping_exits_11() {
    let out = run(&["run", &fixture("unmapped.job.toml")]);
    assert_eq!(out.status.code(), Some(11));
    assert!(String::from_utf8_lossy(&out.stderr).contains("select the Amount column"));
}

#[test]
fn missing_job_exits_3() {
    let out = run(&["run", "does-not-exist.toml"]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn invalid_job_exits_10() {
    let out = run(&["run", &fixture("broken.job.toml")]);
    assert_eq!(out.status.code(), Some(10));
}

#[test]
fn export_one_workbook_per_marketplace() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("variance.xlsx");
    let out = run(&["run", &fixture("close.job.toml"), "--export", &target.to_string_lossy()]);
    assert!(out.status.success());
    assert!(dir.path().join("variance-flipkart.xlsx").exists());
    assert!(dir.path().join("variance-meesho.xlsx").exists());

    let out = run(&["inspect", &dir.path().join("variance-meesho.xlsx").to_string_lossy(), "--json"]);
    let v = stdout_json(&out);
    assert_eq!(v["sheets"], serde_json::json!(["Summary", "Discrepancies", "Orphans"]));
}

#[test]
fn export_without_extension_uses_settings_format() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("variance");
    let out = run(&[
        "run",
        &fixture("close.job.toml"),
        "--marketplace",
        "Meesho",
        "--export",
        &target.to_string_lossy(),
    ]);
    assert!(out.status.success());
    let text = std::fs::read_to_string(dir.path().join("variance.csv")).unwrap();
    assert!(text.starts_with("Order ID,Expected,Received,Difference,Flags"));
    assert!(text.contains("M4,75.25,0.00,75.25,unpaid"));
}

#[test]
fn output_file_holds_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.json");
    let out = run(&["run", &fixture("close.job.toml"), "--output", &path.to_string_lossy()]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["results"].as_array().unwrap().len(), 2);
    assert!(v["session_id"].as_str().unwrap().len() >= 32);
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_complete_job() {
    let out = run(&["validate", &fixture("close.job.toml")]);
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("valid: job 'October close' with 2 marketplace(s)"));
}

#[test]
fn validate_lists_missing_bindings() {
    let out = run(&["validate", &fixture("unmapped.job.toml")]);
    assert_eq!(out.status.code(), Some(11));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("flipkart Previous Payments: select the Amount column"));
}

#[test]
fn validate_agrees_with_run_on_unbound_sales_amount() {
    let job = fixture("no_sales_amount.job.toml");

    let out = run(&["validate", &job]);
    assert_eq!(out.status.code(), Some(11));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Flipkart Sales: select the Amount column"));

    let out = run(&["run", &job]);
    assert_eq!(out.status.code(), Some(11));
}
