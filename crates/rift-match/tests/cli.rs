use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;

const MATCHERS: &str = r#"
matchers:
  - name: 20-body
    body: { matches: '\d+ test' }
  - name: 10-body+header
    body: { matches: '\d+ test' }
    headers: { containsKey: X-Custom }
"#;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn run(matchers: &NamedTempFile, request: &NamedTempFile) -> (Option<i32>, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_rift-match"))
        .arg("--matchers")
        .arg(matchers.path())
        .arg("--request")
        .arg(request.path())
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    (
        output.status.code(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
    )
}

#[test]
fn reports_every_matcher_in_name_order() {
    let matchers = write_temp(MATCHERS);
    let request = write_temp(r#"{"method": "POST", "headers": {"X-Custom": "YES"}, "body": "42 test"}"#);

    let (code, stdout) = run(&matchers, &request);
    assert_eq!(code, Some(0));

    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("MATCH") && lines[0].contains("10-body+header"));
    assert!(lines[1].contains("MATCH") && lines[1].contains("20-body"));
}

#[test]
fn exits_one_when_nothing_matches() {
    let matchers = write_temp(MATCHERS);
    let request = write_temp(r#"{"bodyBase64": "bm8gZGlnaXRz"}"#);

    let (code, stdout) = run(&matchers, &request);
    assert_eq!(code, Some(1));
    assert!(!stdout.contains("MATCH"));
}

#[test]
fn exits_two_on_invalid_matcher_file() {
    let matchers = write_temp("matchers: [ { body: { matches: '(' } } ]");
    let request = write_temp("{}");

    let (code, _) = run(&matchers, &request);
    assert_eq!(code, Some(2));
}
