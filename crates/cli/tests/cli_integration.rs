use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

const MANIFEST: &str = r#"{
  "name": "tool",
  "options": [{ "kind": "flag", "keys": ["-v", "--verbose"] }],
  "commands": [
    {
      "name": "run",
      "aliases": ["r"],
      "options": [
        { "kind": "key", "keys": ["-j", "--jobs"], "value-type": "uint",
          "validators": [{ "greater-than": 0 }] },
        { "kind": "collected-key", "keys": ["-e", "--env"] }
      ],
      "params": [
        { "name": "program" },
        { "name": "args", "kind": "optional-collected" }
      ]
    }
  ],
  "subgroups": [
    {
      "name": "remote",
      "commands": [{ "name": "add", "params": [{ "name": "url" }] }]
    }
  ]
}"#;

fn make_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before UNIX_EPOCH")
        .as_nanos();
    let pid = std::process::id();
    let dir = std::env::temp_dir().join(format!("argbind-integ-{prefix}-{pid}-{nanos}"));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn write_manifest(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("argbind.json");
    fs::write(&path, contents).expect("failed to write manifest");
    path
}

fn argbind() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_argbind"));
    cmd.env_remove("ARGBIND_MANIFEST").env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_works() {
    let out = argbind()
        .arg("--help")
        .output()
        .expect("failed to run argbind --help");
    assert!(
        out.status.success(),
        "argbind --help failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr),
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.contains("argbind") && stdout.contains("parse") && stdout.contains("check"),
        "unexpected help output:\n{stdout}"
    );
}

#[test]
fn parse_prints_bindings_as_json() {
    let dir = make_temp_dir("parse-ok");
    let manifest = write_manifest(&dir, MANIFEST);

    let out = argbind()
        .arg("parse")
        .arg("--manifest")
        .arg(&manifest)
        .args(["--", "r", "--verbose", "-j", "4", "--env=A=1", "prog", "-x", "y"])
        .output()
        .expect("failed to run argbind parse");
    assert!(
        out.status.success(),
        "argbind parse failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr),
    );

    let value: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("parse output is not JSON");
    assert_eq!(value["command"], serde_json::json!(["run"]));
    assert_eq!(value["bindings"]["--verbose"], serde_json::json!(true));
    assert_eq!(value["bindings"]["--jobs"], serde_json::json!(4));
    assert_eq!(value["bindings"]["--env"], serde_json::json!(["A=1"]));
    assert_eq!(value["bindings"]["program"], serde_json::json!("prog"));
    assert_eq!(value["bindings"]["args"], serde_json::json!(["-x", "y"]));
    assert_eq!(value["positional"], serde_json::json!(["prog", "-x", "y"]));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn manifest_path_comes_from_environment() {
    let dir = make_temp_dir("parse-env");
    let manifest = write_manifest(&dir, MANIFEST);

    let out = argbind()
        .env("ARGBIND_MANIFEST", &manifest)
        .args(["parse", "--", "remote", "add", "https://example.com"])
        .output()
        .expect("failed to run argbind parse");
    assert!(out.status.success(), "stderr:\n{}", String::from_utf8_lossy(&out.stderr));

    let value: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("parse output is not JSON");
    assert_eq!(value["command"], serde_json::json!(["remote", "add"]));
    assert_eq!(value["bindings"]["url"], serde_json::json!("https://example.com"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn parse_errors_exit_with_usage_code() {
    let dir = make_temp_dir("parse-err");
    let manifest = write_manifest(&dir, MANIFEST);

    let cases: &[(&[&str], &str)] = &[
        (&["run", "-j", "0", "prog"], "invalid value '0' for -j: must be greater than 0"),
        (&["run", "--bogus", "prog"], "unrecognized option: --bogus"),
        (&["remote", "rm"], "command not found: remote rm"),
        (&["run"], "missing required argument: <program>"),
        (&[], "no command given for tool"),
    ];

    for (tokens, expected) in cases {
        let out = argbind()
            .arg("parse")
            .arg("--manifest")
            .arg(&manifest)
            .arg("--")
            .args(*tokens)
            .output()
            .expect("failed to run argbind parse");
        assert_eq!(out.status.code(), Some(2), "tokens: {tokens:?}");
        let stderr = String::from_utf8_lossy(&out.stderr);
        assert!(
            stderr.contains(&format!("error: {expected}")),
            "tokens: {tokens:?}\nstderr:\n{stderr}"
        );
        assert!(out.stdout.is_empty(), "tokens: {tokens:?}");
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_manifest_exits_with_failure() {
    let dir = make_temp_dir("no-manifest");

    let out = argbind()
        .current_dir(&dir)
        .args(["parse", "--", "run", "x"])
        .output()
        .expect("failed to run argbind parse");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("manifest not found"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn check_summarizes_manifest() {
    let dir = make_temp_dir("check-ok");
    write_manifest(&dir, MANIFEST);

    let out = argbind()
        .current_dir(&dir)
        .arg("check")
        .output()
        .expect("failed to run argbind check");
    assert!(out.status.success(), "stderr:\n{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("run (aliases: r)"), "{stdout}");
    assert!(stdout.contains("remote add"), "{stdout}");
    assert!(stdout.contains("OK: all declarations are valid"), "{stdout}");

    let out = argbind()
        .current_dir(&dir)
        .args(["check", "--json"])
        .output()
        .expect("failed to run argbind check --json");
    let report: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("check output is not JSON");
    assert_eq!(report["name"], serde_json::json!("tool"));
    assert_eq!(report["global_options"], serde_json::json!(1));
    assert_eq!(report["commands"][0]["options"], serde_json::json!(2));
    assert_eq!(report["commands"][0]["params"], serde_json::json!(2));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn check_rejects_conflicting_declarations() {
    let dir = make_temp_dir("check-bad");
    write_manifest(
        &dir,
        r#"{
  "name": "tool",
  "options": [{ "kind": "flag", "keys": ["-v"] }],
  "commands": [{ "name": "run", "options": [{ "kind": "flag", "keys": ["-v"] }] }]
}"#,
    );

    let out = argbind()
        .current_dir(&dir)
        .arg("check")
        .output()
        .expect("failed to run argbind check");
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("shadows a global option"), "{stderr}");

    let _ = fs::remove_dir_all(&dir);
}
