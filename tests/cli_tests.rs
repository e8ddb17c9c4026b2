//! CLI integration tests for the `sluice` binary.
//!
//! Runs the compiled binary inside temporary projects and checks exit codes,
//! output and written files.

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run sluice in `dir` and return (stdout, stderr, exit code).
fn run_sluice(dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_sluice"))
        .current_dir(dir)
        .env_remove("NODE_ENV")
        .env_remove("RUST_LOG")
        .args(["--no-color"])
        .args(args)
        .output()
        .expect("Failed to execute sluice");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code().unwrap_or(-1))
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn test_tasks_lists_graph() {
    let temp = TempDir::new().unwrap();
    let (stdout, _, code) = run_sluice(temp.path(), &["tasks"]);
    assert_eq!(code, 0);
    for name in ["build:html", "build:sass", "build:js", "build:sprite", "build:img", "build:fonts", "clean", "webserver", "build", "watch", "default"] {
        assert!(stdout.contains(name), "missing {} in\n{}", name, stdout);
    }
}

#[test]
fn test_unknown_task_is_invalid_args() {
    let temp = TempDir::new().unwrap();
    let (_, stderr, code) = run_sluice(temp.path(), &["build:everything"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("build:everything"));
}

#[test]
fn test_build_html_writes_dist() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/index.html", "<html><body>Hi</body></html>");

    let (stdout, _, code) = run_sluice(temp.path(), &["build:html"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Build succeeded"));
    assert_eq!(fs::read_to_string(temp.path().join("dist/index.html")).unwrap(), "<html><body>Hi</body></html>");
}

#[test]
fn test_config_file_changes_destination() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/index.html", "<p>x</p>");
    write(temp.path(), "sluice.toml", "[paths.html]\nsrc = [\"src/*.html\"]\ndest = \"public/\"\n");
    fs::create_dir_all(temp.path().join("src/nested")).unwrap();

    // discovered from a subdirectory, paths resolve against the config's dir
    let (_, _, code) = run_sluice(&temp.path().join("src/nested"), &["build:html"]);
    assert_eq!(code, 0);
    assert!(temp.path().join("public/index.html").exists());
    assert!(!temp.path().join("dist").exists());
}

#[test]
fn test_invalid_config_fails() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "sluice.toml", "[server]\nport = 0\n");

    let (_, stderr, code) = run_sluice(temp.path(), &["build:html"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Error loading config"));
}

#[test]
fn test_style_error_exits_nonzero() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/scss/main.scss", ".a { color: red;\n");

    let (_, stderr, code) = run_sluice(temp.path(), &["build:sass"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Build Error!"));
}

#[test]
fn test_clean_removes_dist() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "dist/css/old.css", "a{}");

    let (_, _, code) = run_sluice(temp.path(), &["clean"]);
    assert_eq!(code, 0);
    assert!(!temp.path().join("dist").exists());
}
