//! `build:sass`: compile SCSS, prefix, then minify and purge (production) or
//! attach a source map (development).
//!
//! Compilation errors are shown through the context's notifier and fail only
//! this invocation.

use crate::build::{BuildContext, TaskError};
use crate::config::{BuildMode, Category};
use crate::notifier::ERROR_TITLE;
use crate::reload::ReloadEvent;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Settings for one stylesheet compilation.
#[derive(Debug, Clone, Default)]
pub struct StyleOptions {
    pub mode: BuildMode,
    /// Browserslist queries for prefixing
    pub browsers: Vec<String>,
    /// Class and id names referenced by pages; `None` disables purging
    pub used_symbols: Option<HashSet<String>>,
}

pub async fn run(ctx: BuildContext) -> Result<Vec<PathBuf>, TaskError> {
    let delay = Duration::from_millis(ctx.config().style.delay_ms);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let outputs = tokio::task::spawn_blocking(move || build(&ctx)).await??;
    Ok(outputs)
}

/// Compile every non-partial entry and write it to the style destination.
pub fn build(ctx: &BuildContext) -> Result<Vec<PathBuf>, TaskError> {
    let entries = ctx.sources(Category::Style)?.files()?;
    let dest = ctx.dest(Category::Style);

    let mut options = StyleOptions {
        mode: ctx.mode(),
        browsers: ctx.config().style.browsers.clone(),
        used_symbols: None,
    };
    if ctx.is_production() {
        let mut used = page_symbols(ctx)?;
        used.extend(ctx.config().style.keep_selectors.iter().cloned());
        options.used_symbols = Some(used);
    }

    let mut outputs = Vec::new();
    for entry in entries.iter().filter(|f| !is_partial(&f.path)) {
        let target = dest.join(entry.relative.with_extension("css"));
        let css = match compile(&entry.path, &display_path(ctx, &entry.path), &options) {
            Ok(css) => css,
            Err(message) => {
                ctx.notifier().notify(ERROR_TITLE, &message);
                return Err(TaskError::Style(message));
            }
        };
        super::write_output(&target, css.as_bytes())?;

        let url = ctx
            .url_path(&target)
            .unwrap_or_else(|| target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
        ctx.reload().notify(ReloadEvent::css(url));
        outputs.push(target);
    }
    Ok(outputs)
}

/// Run the full pipeline for one entry file.
///
/// `source_name` is the path recorded in the source map.
pub fn compile(entry: &Path, source_name: &str, options: &StyleOptions) -> Result<String, String> {
    let css = compile_scss(entry)?;
    let production = options.mode.is_production();

    let unused = match &options.used_symbols {
        Some(used) if production => unused_symbols(&css, used),
        _ => HashSet::new(),
    };
    let mut out = transform(&css, source_name, &options.browsers, unused, production)?;

    if !production {
        let scss = fs::read_to_string(entry).map_err(|e| format!("{}: {}", entry.display(), e))?;
        out.push_str(&source_map_comment(source_name, &scss));
    }
    Ok(out)
}

fn compile_scss(entry: &Path) -> Result<String, String> {
    let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
    if let Some(dir) = entry.parent() {
        options = options.load_path(dir);
    }
    grass::from_path(entry, &options).map_err(|e| e.to_string())
}

/// Prefix for the target browsers, drop rules that only use `unused`
/// symbols and print.
pub fn transform(
    css: &str,
    filename: &str,
    browsers: &[String],
    unused: HashSet<String>,
    minify: bool,
) -> Result<String, String> {
    let browsers = if browsers.is_empty() {
        None
    } else {
        Browsers::from_browserslist(browsers.iter().map(String::as_str)).map_err(|e| e.to_string())?
    };
    let targets = Targets { browsers, ..Targets::default() };

    let mut sheet = StyleSheet::parse(css, ParserOptions { filename: filename.to_string(), ..ParserOptions::default() })
        .map_err(|e| e.to_string())?;
    sheet.minify(MinifyOptions { targets, unused_symbols: unused }).map_err(|e| e.to_string())?;
    let printed = sheet
        .to_css(PrinterOptions { minify, targets, ..PrinterOptions::default() })
        .map_err(|e| e.to_string())?;
    Ok(printed.code)
}

static CSS_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.#](-?[_a-zA-Z][\w-]*)").expect("valid regex"));
static HTML_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex"));
static HTML_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bid\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex"));

/// Class and id names appearing in `css` that are not in `used`.
pub fn unused_symbols(css: &str, used: &HashSet<String>) -> HashSet<String> {
    CSS_SYMBOL
        .captures_iter(css)
        .map(|c| c[1].to_string())
        .filter(|s| !used.contains(s))
        .collect()
}

/// Class and id names referenced from markup.
pub fn html_symbols(html: &str) -> HashSet<String> {
    let mut out = HashSet::new();
    for re in [&*HTML_CLASS, &*HTML_ID] {
        for caps in re.captures_iter(html) {
            let value = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or_default();
            out.extend(value.split_whitespace().map(str::to_string));
        }
    }
    out
}

fn page_symbols(ctx: &BuildContext) -> Result<HashSet<String>, TaskError> {
    let mut used = HashSet::new();
    for page in ctx.sources(Category::Html)?.files()? {
        let html = fs::read_to_string(&page.path).map_err(TaskError::io(&page.path))?;
        used.extend(html_symbols(&html));
    }
    Ok(used)
}

/// Inline source map linking the output back to its SCSS entry.
///
/// The compiler does not track positions, so the map carries the source
/// content with no segment mappings.
pub fn source_map_comment(source_name: &str, scss: &str) -> String {
    let map = serde_json::json!({
        "version": 3,
        "sources": [source_name],
        "sourcesContent": [scss],
        "names": [],
        "mappings": "",
    });
    format!(
        "\n/*# sourceMappingURL=data:application/json;charset=utf-8;base64,{} */\n",
        STANDARD.encode(map.to_string())
    )
}

fn is_partial(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with('_'))
}

fn display_path(ctx: &BuildContext, path: &Path) -> String {
    let relative = path.strip_prefix(ctx.project_root()).unwrap_or(path);
    relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_symbols() {
        let html = r#"<div class="icon-home  nav" id='main'><span CLASS="x"></span></div>"#;
        let symbols = html_symbols(html);
        for s in ["icon-home", "nav", "main", "x"] {
            assert!(symbols.contains(s), "missing {s}");
        }
    }

    #[test]
    fn test_unused_symbols() {
        let css = ".icon-home{color:red}.icon-user{color:blue}#main{margin:0}";
        let used: HashSet<String> = ["icon-home".to_string()].into();
        let unused = unused_symbols(css, &used);
        assert!(unused.contains("icon-user"));
        assert!(unused.contains("main"));
        assert!(!unused.contains("icon-home"));
    }

    #[test]
    fn test_transform_strips_unused_and_minifies() {
        let css = ".icon-home {\n  color: red;\n}\n.icon-user {\n  color: blue;\n}\n";
        let unused: HashSet<String> = ["icon-user".to_string()].into();
        let out = transform(css, "main.css", &[], unused, true).unwrap();
        assert!(out.contains(".icon-home{color:red}"));
        assert!(!out.contains("icon-user"));
        assert!(!out.contains('\n'));
    }

    #[test]
    fn test_transform_adds_prefixes() {
        let css = ".a { user-select: none; }";
        let out = transform(css, "main.css", &["safari 10".to_string()], HashSet::new(), false).unwrap();
        assert!(out.contains("-webkit-user-select: none"));
        assert!(out.contains('\n'));
    }

    #[test]
    fn test_source_map_comment_decodes() {
        let comment = source_map_comment("src/scss/main.scss", "a { b: c }");
        let encoded = comment
            .trim()
            .trim_start_matches("/*# sourceMappingURL=data:application/json;charset=utf-8;base64,")
            .trim_end_matches(" */");
        let json: serde_json::Value = serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["sources"][0], "src/scss/main.scss");
        assert_eq!(json["sourcesContent"][0], "a { b: c }");
    }

    #[test]
    fn test_is_partial() {
        assert!(is_partial(Path::new("src/scss/components/_sprite.scss")));
        assert!(!is_partial(Path::new("src/scss/main.scss")));
    }
}
