// End-to-end tests for the `tally` binary against a temporary database.
// Run with: cargo test -p tally-cli --test cli_tests

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const BATCH_A: &str = "\
ID_Transaccion,Fecha,Cuenta_Origen,Cuenta_Destino,Monto,Estado
TXN001,2023-01-01,ACC001,ACC002,100.50,Exitosa
TXN002,2023-01-02,ACC003,ACC004,200.75,Exitosa
TXN003,2023-01-03,ACC005,ACC006,300.25,Exitosa
TXN004,2023-01-04,ACC007,ACC008,400.00,Exitosa
";

const BATCH_B: &str = "\
ID_Transaccion;Fecha;Cuenta_Origen;Cuenta_Destino;Monto;Estado
TXN001;01/01/2023;ACC001;ACC002;$100.5;Successful
TXN002;02/01/2023;ACC003;ACC004;$210.75;Successful
TXN003;03/01/2023;ACC005;ACC006;300.25;Failed
TXN005;05/01/2023;ACC009;ACC010;€500.00;Successful
";

/// A scratch directory with an empty settings file and a database path, so
/// the user's own configuration never leaks into a test.
struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("settings.toml"), "").unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn settings(&self, contents: &str) {
        fs::write(self.path("settings.toml"), contents).unwrap();
    }

    fn tally(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_tally"))
            .current_dir(self.dir.path())
            .env_remove("TALLY_DB")
            .env_remove("RUST_LOG")
            .arg("--db")
            .arg(self.path("tally.db"))
            .arg("--config")
            .arg(self.path("settings.toml"))
            .args(args)
            .output()
            .expect("run tally")
    }

    fn upload(&self, file: &Path) -> String {
        let out = self.tally(&["upload", file.to_str().unwrap()]);
        assert!(out.status.success(), "upload failed: {}", stderr(&out));
        stdout(&out).trim().to_string()
    }
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn json(out: &Output) -> serde_json::Value {
    serde_json::from_slice(&out.stdout).expect("valid JSON on stdout")
}

fn ids(bucket: &serde_json::Value) -> Vec<String> {
    bucket
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["business_id"].as_str().unwrap().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// upload + compare
// ---------------------------------------------------------------------------

#[test]
fn upload_then_compare_writes_report() {
    let env = Env::new();
    let a = env.upload(&env.write("a.csv", BATCH_A));
    let b = env.upload(&env.write("b.csv", BATCH_B));
    assert_eq!(a, "1");
    assert_eq!(b, "2");

    let out = env.tally(&["compare", &a, &b, "--json"]);
    assert!(out.status.success(), "compare failed: {}", stderr(&out));

    let result = json(&out);
    assert_eq!(ids(&result["exact"]), vec!["TXN001"]);
    assert_eq!(ids(&result["discrepant"]), vec!["TXN002", "TXN003"]);
    assert_eq!(ids(&result["only_a"]), vec!["TXN004"]);
    assert_eq!(ids(&result["only_b"]), vec!["TXN005"]);
    assert_eq!(result["summary"]["amount_discrepancies"], 1);
    assert_eq!(result["summary"]["status_discrepancies"], 1);

    let report = env.path("comparison_1_2.xlsx");
    assert!(report.exists(), "default report path");
    assert!(fs::metadata(&report).unwrap().len() > 0);
}

#[test]
fn compare_human_summary_and_output_path() {
    let env = Env::new();
    let a = env.upload(&env.write("a.csv", BATCH_A));
    let b = env.upload(&env.write("b.csv", BATCH_B));

    let out = env.tally(&["compare", &a, &b, "-o", "march.xlsx"]);
    assert!(out.status.success(), "compare failed: {}", stderr(&out));

    let text = stdout(&out);
    assert!(text.contains("exact:        1"), "got: {text}");
    assert!(text.contains("discrepant:   2 (amount 1, status 1)"), "got: {text}");
    assert!(text.contains("march.xlsx"));
    assert!(env.path("march.xlsx").exists());
}

#[test]
fn upload_json_reports_row_count() {
    let env = Env::new();
    let out = env.tally(&["upload", env.write("a.csv", BATCH_A).to_str().unwrap(), "--json"]);
    assert!(out.status.success());

    let batch = json(&out);
    assert_eq!(batch["id"], 1);
    assert_eq!(batch["filename"], "a.csv");
    assert_eq!(batch["transaction_count"], 4);
}

// ---------------------------------------------------------------------------
// rejected input
// ---------------------------------------------------------------------------

#[test]
fn missing_status_column_exits_3_and_stores_nothing() {
    let env = Env::new();
    let file = env.write(
        "a.csv",
        "ID_Transaccion,Fecha,Cuenta_Origen,Cuenta_Destino,Monto\nTXN001,2023-01-01,A,B,1.00\n",
    );

    let out = env.tally(&["upload", file.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("error: no column found for 'status'"));
    assert!(stderr(&out).contains("hint:"));

    let list = env.tally(&["batch", "list", "--json"]);
    assert!(list.status.success());
    assert_eq!(json(&list), serde_json::json!([]));
}

#[test]
fn bad_amount_reports_row_and_column() {
    let env = Env::new();
    let contents = BATCH_A.replace("400.00", "monto_invalido");
    let out = env.tally(&["upload", env.write("a.csv", &contents).to_str().unwrap()]);

    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("row 4, column 'monto'"), "got: {}", stderr(&out));
}

#[test]
fn two_digit_year_is_rejected_at_upload() {
    let env = Env::new();
    let contents = BATCH_A.replace("2023-01-03", "03/01/23");
    let out = env.tally(&["upload", env.write("a.csv", &contents).to_str().unwrap()]);

    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("row 3, column 'fecha'"), "got: {}", stderr(&out));
    assert_eq!(json(&env.tally(&["batch", "list", "--json"])), serde_json::json!([]));
}

#[test]
fn unsupported_extension_exits_3() {
    let env = Env::new();
    let out = env.tally(&["upload", env.write("a.pdf", BATCH_A).to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn reject_policy_refuses_duplicate_ids() {
    let env = Env::new();
    env.settings("[reconcile]\nduplicates = \"reject\"\n");
    let contents = format!("{BATCH_A}TXN001,2023-01-05,ACC001,ACC002,1.00,Fallida\n");

    let out = env.tally(&["upload", env.write("a.csv", &contents).to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("TXN001"));
}

#[test]
fn configured_alias_is_used() {
    let env = Env::new();
    env.settings("[ingest.aliases]\namount = [\"importe\"]\n");
    let contents = BATCH_A.replace("Monto", "Importe");
    assert_eq!(env.upload(&env.write("a.csv", &contents)), "1");
}

#[test]
fn missing_input_file_is_usage_error() {
    let env = Env::new();
    let out = env.tally(&["upload", env.path("nope.csv").to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn invalid_settings_is_usage_error() {
    let env = Env::new();
    env.settings("[reconcile]\nduplicates = \"sometimes\"\n");
    let out = env.tally(&["batch", "list"]);
    assert_eq!(out.status.code(), Some(2));
}

// ---------------------------------------------------------------------------
// not found
// ---------------------------------------------------------------------------

#[test]
fn compare_unknown_batches_exits_4_naming_both() {
    let env = Env::new();
    let out = env.tally(&["compare", "8", "9"]);
    assert_eq!(out.status.code(), Some(4));
    assert!(stderr(&out).contains("batch not found: 8, 9"));
    assert!(!env.path("comparison_8_9.xlsx").exists());
}

#[test]
fn show_unknown_transaction_exits_4() {
    let env = Env::new();
    let out = env.tally(&["transactions", "show", "42"]);
    assert_eq!(out.status.code(), Some(4));
}

// ---------------------------------------------------------------------------
// inspection
// ---------------------------------------------------------------------------

#[test]
fn delete_batch_cascades_to_transactions() {
    let env = Env::new();
    let a = env.upload(&env.write("a.csv", BATCH_A));
    let b = env.upload(&env.write("b.csv", BATCH_B));

    let out = env.tally(&["batch", "delete", &a]);
    assert!(out.status.success());

    let list = json(&env.tally(&["batch", "list", "--json"]));
    let remaining: Vec<_> = list.as_array().unwrap().iter().map(|b| b["id"].clone()).collect();
    assert_eq!(remaining, vec![serde_json::json!(b.parse::<i64>().unwrap())]);

    let txs = json(&env.tally(&["transactions", "list", "--json"]));
    assert_eq!(txs.as_array().unwrap().len(), 4);
    assert!(txs.as_array().unwrap().iter().all(|t| t["batch_id"] == 2));

    let again = env.tally(&["batch", "delete", &a]);
    assert_eq!(again.status.code(), Some(4));
}

#[test]
fn transactions_list_pages_by_id() {
    let env = Env::new();
    env.upload(&env.write("a.csv", BATCH_A));
    env.upload(&env.write("b.csv", BATCH_B));

    let page = json(&env.tally(&["transactions", "list", "--skip", "3", "--limit", "2", "--json"]));
    let page = page.as_array().unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["business_id"], "TXN004");
    assert_eq!(page[1]["business_id"], "TXN001");
    assert_eq!(page[1]["batch_id"], 2);
}

#[test]
fn batch_show_includes_normalized_records() {
    let env = Env::new();
    let id = env.upload(&env.write("b.csv", BATCH_B));

    let batch = json(&env.tally(&["batch", "show", &id, "--json"]));
    let txs = batch["transactions"].as_array().unwrap();
    assert_eq!(txs.len(), 4);
    assert_eq!(txs[1]["occurred_at"], "2023-01-02T00:00:00");
    assert_eq!(txs[1]["amount"], "210.75");
    assert_eq!(txs[2]["status"], "Failed");
}
