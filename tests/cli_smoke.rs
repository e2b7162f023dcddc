use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn codescribe(args: &[&str]) -> Output {
    // `cargo test` sets this for integration tests.
    let bin = env!("CARGO_BIN_EXE_codescribe");
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("spawn codescribe")
}

fn write(root: &Path, rel: &str, content: &[u8]) {
    let p = root.join(rel);
    std::fs::create_dir_all(p.parent().unwrap()).unwrap();
    std::fs::write(p, content).unwrap();
}

fn record<'a>(doc: &'a Value, path: &str) -> &'a Value {
    doc["codebase"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["path"] == path)
        .unwrap_or_else(|| panic!("no record for {path}: {doc}"))
}

#[test]
fn extracts_tree_and_writes_default_output() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "a.py", b"def foo(x, y):\n    \"\"\"doc\"\"\"\n    pass\n");
    write(root, "lib/b.rb", b"def bar\nend\n");
    write(root, "web/bad.js", b"function ok() {}\n// \xff\xfe\n");
    write(root, "broken.py", b"def nope(:\n");
    write(root, "README.md", b"# not source\n");

    let out = codescribe(&[root.to_str().unwrap()]);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "stderr: {stderr}");
    assert!(stderr.contains("Parsing complete."), "stderr: {stderr}");
    assert!(
        stderr.contains("No git history found") || stderr.contains("Git not installed"),
        "missing history warning: {stderr}"
    );

    let written = root.join(".codescribe").join("parsed_code.json");
    let text = std::fs::read_to_string(&written).unwrap();
    assert!(text.starts_with("{\n    \"codebase\""), "expected 4-space indent");
    let doc: Value = serde_json::from_str(&text).unwrap();

    assert_eq!(doc["codebase"].as_array().unwrap().len(), 4);
    assert_eq!(doc["git_commits"], Value::Array(vec![]));

    let a = record(&doc, "a.py");
    assert_eq!(a["file"], "a.py");
    assert_eq!(a["functions"][0]["name"], "foo");
    assert_eq!(a["functions"][0]["parameters"], serde_json::json!(["x", "y"]));
    assert_eq!(a["functions"][0]["docstring"], "doc");

    let b = record(&doc, "lib/b.rb");
    assert_eq!(b["file"], "b.rb");
    assert_eq!(b["functions"][0]["name"], "bar");
    assert_eq!(b["functions"][0]["parameters"], serde_json::json!([]));
    assert!(b["functions"][0]["code"].is_null());

    let js = record(&doc, "web/bad.js");
    assert!(js["code"].as_str().unwrap().contains('\u{FFFD}'));

    let broken = record(&doc, "broken.py");
    assert!(broken["error"].as_str().unwrap().starts_with("AST parse error"));
    assert_eq!(broken["functions"], serde_json::json!([]));
}

#[test]
fn output_flag_and_stdout_agree() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "main.go", b"func main() {}\n");
    let out_file = tmp.path().join("out").join("doc.json");

    let out = codescribe(&[
        tmp.path().to_str().unwrap(),
        "--no-history",
        "--sequential",
        "--stdout",
        "--output",
        out_file.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let printed: Value = serde_json::from_slice(&out.stdout).unwrap();
    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&out_file).unwrap()).unwrap();
    assert_eq!(printed, saved);
    assert_eq!(saved["codebase"][0]["functions"][0]["name"], "main");
    assert!(!String::from_utf8_lossy(&out.stderr).contains("WARN"));
}

#[test]
fn empty_root_produces_empty_codebase() {
    let tmp = TempDir::new().unwrap();
    let out = codescribe(&[tmp.path().to_str().unwrap(), "--no-history", "--stdout"]);
    assert!(out.status.success());
    let doc: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(doc, serde_json::json!({ "codebase": [], "git_commits": [] }));
}

#[test]
fn missing_root_exits_non_zero() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("does-not-exist");
    let out = codescribe(&[missing.to_str().unwrap()]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Scan root does not exist"));
}

#[test]
fn inspect_prints_single_record() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "m.py", b"import os\nclass K:\n    \"\"\"K doc\"\"\"\n");
    let path = tmp.path().join("m.py");

    let out = codescribe(&["--inspect", path.to_str().unwrap()]);
    assert!(out.status.success());
    let rec: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(rec["file"], "m.py");
    assert_eq!(rec["imports"], serde_json::json!(["os"]));
    assert_eq!(rec["classes"][0]["docstring"], "K doc");
}
