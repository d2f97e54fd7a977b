use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PAYROLL: &str = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. PAYROLL.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
           COPY CUSTREC.
       PROCEDURE DIVISION.
       MAIN-PARA.
           PERFORM UPDATE-BALANCE.
           CALL 'BILLING'.
           STOP RUN.
       UPDATE-BALANCE.
           ADD 100 TO BALANCE.
";

const CUSTREC: &str = "\
\x20      01  CUSTOMER-REC.
           05  BALANCE        PIC 9(7)V99.
";

const BILLING: &str = "\
\x20      IDENTIFICATION DIVISION.
       PROGRAM-ID. BILLING.
       PROCEDURE DIVISION.
       BILL-PARA.
           GOBACK.
";

fn setup_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("copy")).unwrap();
    fs::write(root.join("PAYROLL.cbl"), PAYROLL).unwrap();
    fs::write(root.join("BILLING.cbl"), BILLING).unwrap();
    fs::write(root.join("copy/CUSTREC.cpy"), CUSTREC).unwrap();
    temp
}

#[allow(deprecated)]
fn cli(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cobol-lens").expect("binary");
    cmd.arg("--project").arg(root).arg("--quiet");
    cmd
}

fn run_ok(root: &Path, args: &[&str]) -> Value {
    let output = cli(root).args(args).output().expect("command run");
    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert!(output.status.success(), "stdout: {body}");
    assert_eq!(body["status"], "ok");
    body
}

#[test]
fn index_persists_units_and_reports_stats() {
    let temp = setup_project();
    let root = temp.path();

    let body = run_ok(root, &["index"]);
    assert_eq!(body["data"]["stats"]["indexed"], 2);
    assert_eq!(body["meta"]["units"], 2);
    assert!(root.join(".cobol-lens/units").is_dir());

    let again = run_ok(root, &["index"]);
    assert_eq!(again["data"]["restored"], 2);
    assert_eq!(again["data"]["stats"]["unchanged"], 2);
    assert_eq!(again["data"]["stats"]["indexed"], 0);

    let stats = run_ok(root, &["stats"]);
    assert_eq!(stats["data"]["corpus"]["units"], 2);
    let programs = stats["data"]["programs"].as_array().unwrap();
    let payroll = programs.iter().find(|p| p["program"] == "PAYROLL").unwrap();
    assert_eq!(payroll["calls"][0]["unit"], "BILLING");
}

#[test]
fn definition_and_references_resolve_copybook_items() {
    let temp = setup_project();
    let root = temp.path();

    let body = run_ok(root, &["definition", "balance"]);
    let defs = body["data"].as_array().unwrap();
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0]["kind"], "data_item");
    assert_eq!(defs[0]["unit"], "PAYROLL");

    let program = run_ok(root, &["definition", "PAYROLL"]);
    assert_eq!(program["data"][0]["kind"], "program");
    assert_eq!(program["data"][0]["unit"], "PAYROLL");

    let refs = run_ok(root, &["references", "BALANCE", "--unit", "PAYROLL"]);
    let roles: Vec<&str> = refs["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["definition", "read_write"]);
}

#[test]
fn graph_and_explain_describe_procedures() {
    let temp = setup_project();
    let root = temp.path();

    let graph = run_ok(root, &["graph", "PAYROLL/MAIN-PARA", "--depth", "1"]);
    assert_eq!(graph["data"]["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(graph["data"]["edges"].as_array().unwrap().len(), 2);

    let deps = run_ok(root, &["graph"]);
    assert_eq!(deps["data"].as_array().unwrap().len(), 2);

    let explain = run_ok(root, &["explain", "UPDATE-BALANCE"]);
    let source = explain["data"]["source"].as_array().unwrap();
    assert!(source
        .iter()
        .any(|line| line.as_str().unwrap().contains("ADD 100 TO BALANCE")));
    assert_eq!(explain["data"]["data"][0]["name"], "BALANCE");
}

#[test]
fn analytics_reports_overview_relationships_and_candidates() {
    let temp = setup_project();
    let root = temp.path();

    let body = run_ok(root, &["analytics"]);
    let data = &body["data"];
    assert_eq!(data["overview"]["programs"], 2);
    assert_eq!(data["overview"]["unique_dependencies"], 2);
    assert_eq!(data["relationships"]["isolated_programs"][0], "BILLING");
    assert_eq!(data["relationships"]["most_depended_on"][0]["name"], "BILLING");
    assert_eq!(data["refactoring"]["isolated_programs"][0]["program"], "BILLING");
    assert_eq!(data["refactoring"]["large_programs"].as_array().unwrap().len(), 0);

    let strict = run_ok(root, &["analytics", "--max-lines", "5", "--max-dependencies", "1"]);
    let large = strict["data"]["refactoring"]["large_programs"].as_array().unwrap();
    assert_eq!(large.len(), 1);
    assert_eq!(large[0]["program"], "PAYROLL");
    assert_eq!(strict["data"]["refactoring"]["highly_dependent"][0]["dependencies"], 2);
}

#[test]
fn deleted_sources_leave_the_corpus() {
    let temp = setup_project();
    let root = temp.path();
    run_ok(root, &["index"]);

    fs::remove_file(root.join("BILLING.cbl")).unwrap();
    let stats = run_ok(root, &["stats"]);
    assert_eq!(stats["data"]["corpus"]["units"], 1);
}

#[test]
fn query_errors_use_the_error_envelope() {
    let temp = setup_project();
    let root = temp.path();

    cli(root)
        .args(["search", "   "])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"code\": \"empty_query\""));

    cli(root)
        .args(["explain", "NO-SUCH-PARA"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("procedure_not_found"));

    cli(root)
        .args(["diagnostics", "--unit", "NOPE"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("unit_not_found"));
}

#[test]
fn bad_project_and_config_are_reported() {
    let temp = setup_project();
    let root = temp.path();

    cli(&root.join("missing"))
        .arg("stats")
        .assert()
        .failure()
        .stdout(predicate::str::contains("invalid_path"));

    fs::write(root.join("cobol-lens.toml"), "colour = \"blue\"\n").unwrap();
    cli(root)
        .arg("stats")
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"code\": \"config\""));
}
