//! Build system integration tests
//!
//! Each test lays out a small project in a temporary directory and runs
//! tasks through the [`TaskRunner`], checking what lands in `dist/`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use sluice::build::{BuildContext, TaskError, TaskName, TaskRunner, TaskStatus};
use sluice::config::{BuildMode, SluiceConfig};
use sluice::notifier::{MemoryNotifier, ERROR_TITLE};

// ============================================================================
// Test Utilities
// ============================================================================

const PAGE: &str = r#"<!doctype html>
<html>
<head><link rel="stylesheet" href="css/main.css"></head>
<body><div class="used card" id="hero">Hello</div><script src="js/index.js"></script></body>
</html>
"#;

const STYLES: &str = r#"$accent: #c00;

.used { color: $accent; }
.unused { color: blue; }
#keepme { color: green; }
"#;

fn write(root: &Path, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

fn write_png(root: &Path, relative: &str, width: u32, height: u32, color: [u8; 4]) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbaImage::from_pixel(width, height, Rgba(color)).save(&path).unwrap();
    path
}

/// A project with one source of every kind.
fn create_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "src/index.html", PAGE);
    write(root, "src/about.html", "<html><body>About</body></html>");
    write(root, "src/scss/main.scss", STYLES);
    write(root, "src/js/index.js", "import { greet } from './greet.js';\nconsole.log(greet('world'));\n");
    write(root, "src/js/greet.js", "export function greet(name) {\n  return 'Hello, ' + name;\n}\n");
    write_png(root, "src/img/icons/home.png", 16, 16, [255, 0, 0, 255]);
    write_png(root, "src/img/icons/search.png", 8, 12, [0, 0, 255, 255]);
    write_png(root, "src/img/photo.png", 20, 10, [0, 128, 0, 255]);
    write(root, "src/img/logo.svg", "<!-- logo -->\n<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"10\" height=\"10\" viewBox=\"0 0 10 10\">\n  <rect width=\"10\" height=\"10\"/>\n</svg>\n");
    write(root, "src/fonts/open-sans.woff2", b"wOF2 fake font");
    write(root, "src/fonts/icons/glyphs.woff", b"wOFF fake font");
    temp
}

fn config() -> SluiceConfig {
    let mut config = SluiceConfig::default();
    config.style.delay_ms = 0;
    config.style.keep_selectors = vec!["keepme".to_string()];
    config.server.tunnel = None;
    config
}

fn runner(root: &Path, mode: BuildMode) -> TaskRunner {
    TaskRunner::new(BuildContext::new(config(), root.to_path_buf(), mode))
}

fn read(path: PathBuf) -> String {
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

/// Relative path to content hash for every file under `dir`.
fn tree_hash(dir: &Path) -> BTreeMap<String, String> {
    fn walk(base: &Path, dir: &Path, out: &mut BTreeMap<String, String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                let digest = Sha256::digest(fs::read(&path).unwrap());
                let relative = path.strip_prefix(base).unwrap().to_string_lossy().into_owned();
                out.insert(relative, format!("{:x}", digest));
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(dir, dir, &mut out);
    out
}

// ============================================================================
// Copy tasks
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_html_and_fonts_are_copied() {
    let temp = create_project();
    let root = temp.path();

    let result = runner(root, BuildMode::Development).run_tasks(&[TaskName::Html, TaskName::Fonts]).await.unwrap();
    assert!(result.is_success());

    assert_eq!(read(root.join("dist/index.html")), PAGE);
    assert!(root.join("dist/about.html").exists());
    assert_eq!(fs::read(root.join("dist/fonts/open-sans.woff2")).unwrap(), b"wOF2 fake font");
    assert_eq!(fs::read(root.join("dist/fonts/icons/glyphs.woff")).unwrap(), b"wOFF fake font");
    assert_eq!(result.get(TaskName::Fonts).unwrap().outputs.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_sources_are_skipped() {
    let temp = TempDir::new().unwrap();
    let result = runner(temp.path(), BuildMode::Development).run_tasks(&[TaskName::Html]).await.unwrap();
    assert_eq!(result.get(TaskName::Html).unwrap().status, TaskStatus::Skipped);
}

// ============================================================================
// Sprites and images
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_sprite_sheet_and_partial() {
    let temp = create_project();
    let root = temp.path();

    let result = runner(root, BuildMode::Development).run_tasks(&[TaskName::Sprite]).await.unwrap();
    assert!(result.is_success());

    let sheet = image::open(root.join("dist/img/sprite.png")).unwrap();
    assert!(sheet.width() >= 16 && sheet.height() >= 16);

    let partial = read(root.join("src/scss/components/_sprite.scss"));
    assert_eq!(partial.matches("\n.icon-").count(), 2);
    assert!(partial.contains(".icon-home {"));
    assert!(partial.contains(".icon-search {"));
    assert!(partial.contains("url('../img/sprite.png')"));
    assert!(partial.contains("$spritesheet-width:"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_img_runs_after_sprite() {
    let temp = create_project();
    let root = temp.path();

    let result = runner(root, BuildMode::Development).run_tasks(&[TaskName::Img]).await.unwrap();
    assert!(result.is_success());
    assert!(result.get(TaskName::Sprite).is_some());
    assert!(root.join("dist/img/sprite.png").exists());
    assert!(root.join("dist/img/photo.png").exists());
    assert!(!root.join("dist/img/icons/home.png").exists());
    assert!(!root.join("dist/img/icons").exists());

    let svg = read(root.join("dist/img/logo.svg"));
    assert!(!svg.contains("<!--"));
    assert!(svg.contains("<rect"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_img_second_run_writes_nothing() {
    let temp = create_project();
    let runner = runner(temp.path(), BuildMode::Development);

    let first = runner.run_tasks(&[TaskName::Img]).await.unwrap();
    // photo.png and logo.svg; icons only feed the sprite sheet
    assert_eq!(first.get(TaskName::Img).unwrap().outputs.len(), 2);

    let second = runner.run_tasks(&[TaskName::Img]).await.unwrap();
    let img = second.get(TaskName::Img).unwrap();
    assert!(img.outputs.is_empty());
    assert_eq!(img.status, TaskStatus::Skipped);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sprite_failure_fails_img() {
    let temp = create_project();
    write(temp.path(), "src/img/icons/broken.png", b"not a png");

    let result = runner(temp.path(), BuildMode::Development).run_tasks(&[TaskName::Img]).await.unwrap();
    assert!(!result.is_success());
    assert!(result.get(TaskName::Sprite).unwrap().status.is_failure());
    match &result.get(TaskName::Img).unwrap().status {
        TaskStatus::Failed(message) => assert!(message.contains("build:sprite")),
        other => panic!("expected failure, got {}", other),
    }
}

// ============================================================================
// Styles
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_production_styles_are_purged_and_minified() {
    let temp = create_project();
    let root = temp.path();

    let result = runner(root, BuildMode::Production).run_tasks(&[TaskName::Sass]).await.unwrap();
    assert!(result.is_success());

    let css = read(root.join("dist/css/main.css"));
    assert!(css.contains(".used"));
    assert!(css.contains("#keepme"));
    assert!(!css.contains(".unused"));
    assert!(!css.contains("sourceMappingURL"));
    assert!(!css.contains("\n  "));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_development_styles_have_source_map() {
    let temp = create_project();
    let root = temp.path();

    runner(root, BuildMode::Development).run_tasks(&[TaskName::Sass]).await.unwrap();

    let css = read(root.join("dist/css/main.css"));
    assert!(css.contains(".unused"));
    assert!(css.contains("\n"));
    let prefix = "sourceMappingURL=data:application/json;charset=utf-8;base64,";
    let start = css.find(prefix).unwrap() + prefix.len();
    let encoded = css[start..].split_whitespace().next().unwrap();
    let map: serde_json::Value = serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap();
    assert_eq!(map["version"], 3);
    assert_eq!(map["sources"][0], "src/scss/main.scss");
    assert_eq!(map["sourcesContent"][0], STYLES);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_style_error_notifies_and_fails() {
    let temp = create_project();
    write(temp.path(), "src/scss/main.scss", ".broken { color: red;\n");

    let notifier = Arc::new(MemoryNotifier::new());
    let ctx = BuildContext::new(config(), temp.path().to_path_buf(), BuildMode::Development)
        .with_notifier(notifier.clone());
    let result = TaskRunner::new(ctx).run_tasks(&[TaskName::Sass]).await.unwrap();

    assert!(result.get(TaskName::Sass).unwrap().status.is_failure());
    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, ERROR_TITLE);
    assert!(!temp.path().join("dist/css/main.css").exists());
}

// ============================================================================
// Scripts
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_script_bundle_by_mode() {
    let dev_project = create_project();
    let prod_project = create_project();

    let dev_runner = runner(dev_project.path(), BuildMode::Development);
    assert!(dev_runner.run_tasks(&[TaskName::Js]).await.unwrap().is_success());
    assert!(runner(prod_project.path(), BuildMode::Production).run_tasks(&[TaskName::Js]).await.unwrap().is_success());

    let dev = read(dev_project.path().join("dist/js/index.js"));
    let prod = read(prod_project.path().join("dist/js/index.js"));

    assert!(dev.contains("Hello, "));
    assert!(prod.contains("Hello, "));
    assert!(dev.contains("sourceMappingURL=data:application/json"));
    assert!(!prod.contains("sourceMappingURL"));
    assert!(prod.len() < dev.len());

    let modules = dev_runner.script().modules();
    assert!(modules.iter().any(|m| m.ends_with("greet.js")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_script_without_entry_is_skipped() {
    let temp = TempDir::new().unwrap();
    let result = runner(temp.path(), BuildMode::Development).run_tasks(&[TaskName::Js]).await.unwrap();
    assert_eq!(result.get(TaskName::Js).unwrap().status, TaskStatus::Skipped);
}

// ============================================================================
// Aggregates
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_clean_then_build_reproduces_tree() {
    let temp = create_project();
    let root = temp.path();
    let runner = runner(root, BuildMode::Production);

    let first = runner.run_tasks(&[TaskName::Build]).await.unwrap();
    assert!(first.is_success(), "{}", first.summary());
    let pristine = tree_hash(&root.join("dist"));
    assert!(pristine.contains_key("index.html"));
    assert!(pristine.contains_key("css/main.css"));
    assert!(pristine.contains_key("js/index.js"));

    let cleaned = runner.run_tasks(&[TaskName::Clean]).await.unwrap();
    assert!(cleaned.is_success());
    assert!(!root.join("dist").exists());

    runner.run_tasks(&[TaskName::Build]).await.unwrap();
    assert_eq!(tree_hash(&root.join("dist")), pristine);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clean_missing_dir_is_skipped() {
    let temp = TempDir::new().unwrap();
    let result = runner(temp.path(), BuildMode::Development).run_tasks(&[TaskName::Clean]).await.unwrap();
    assert_eq!(result.get(TaskName::Clean).unwrap().status, TaskStatus::Skipped);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_long_running_tasks_cannot_be_batched() {
    let temp = TempDir::new().unwrap();
    let err = runner(temp.path(), BuildMode::Development).run_tasks(&[TaskName::Html, TaskName::Watch]).await;
    assert!(matches!(err, Err(TaskError::NotBatchable(TaskName::Watch))));
}
