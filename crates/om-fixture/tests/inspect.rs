use std::fs;
use std::process::Command;

fn fixture_inspect() -> Command {
    Command::new(env!("CARGO_BIN_EXE_fixture-inspect"))
}

#[test]
fn prints_table_fixture_as_frame() {
    let root = tempfile::tempdir().expect("tempdir");
    let testdata = root.path().join("testdata/demo/threshold");
    fs::create_dir_all(&testdata).expect("testdata dir");
    fs::write(testdata.join("in.csv"), "id,name\n1,a\n2,b\n").expect("write fixture");
    let source = root.path().join("operators/demo/threshold/threshold.rs");

    let output = fixture_inspect()
        .arg("--source")
        .arg(&source)
        .args(["--table", "in.csv", "--as-frame"])
        .output()
        .expect("run fixture-inspect");

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    assert!(stdout.contains("rows=2 columns=2"), "{stdout}");
    assert!(stdout.contains("id,name\n1,a\n2,b"), "{stdout}");
}

#[test]
fn missing_fixture_exits_with_error() {
    let root = tempfile::tempdir().expect("tempdir");
    let source = root.path().join("operators/demo/threshold/threshold.rs");

    let output = fixture_inspect()
        .arg("--source")
        .arg(&source)
        .args(["--message", "absent.json"])
        .output()
        .expect("run fixture-inspect");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.starts_with("fixture-inspect error: cannot read fixture"), "{stderr}");
}

#[test]
fn rejects_conflicting_fixture_flags() {
    let output = fixture_inspect()
        .args(["--source", "operators/p/o/o.rs", "--file", "a", "--table", "b.csv"])
        .output()
        .expect("run fixture-inspect");
    assert_eq!(output.status.code(), Some(1));
}
