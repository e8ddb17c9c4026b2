//! Configuration schema types for `sluice.toml`
//!
//! Defines the path table and per-task settings, with defaults matching the
//! conventional `src/` → `dist/` project layout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Asset category a source file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// HTML pages
    Html,
    /// SCSS stylesheets
    Style,
    /// JavaScript modules
    Js,
    /// Images (excluding sprite icons)
    Img,
    /// Sprite icon sources
    Sprite,
    /// Font files
    Fonts,
}

impl Category {
    /// All categories, in path-table order.
    pub const ALL: [Category; 6] = [
        Category::Html,
        Category::Style,
        Category::Js,
        Category::Img,
        Category::Sprite,
        Category::Fonts,
    ];

    /// Lowercase identifier used in config keys and log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Html => "html",
            Category::Style => "style",
            Category::Js => "js",
            Category::Img => "img",
            Category::Sprite => "sprite",
            Category::Fonts => "fonts",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source selector, destination and watch globs for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPaths {
    /// Source glob patterns (a leading `!` excludes)
    pub src: Vec<String>,
    /// Destination directory
    pub dest: PathBuf,
    /// Globs observed in watch mode (defaults to `src` when empty)
    #[serde(default)]
    pub watch: Vec<String>,
}

impl AssetPaths {
    fn new(src: &str, dest: &str, watch: &str) -> Self {
        Self { src: vec![src.to_string()], dest: PathBuf::from(dest), watch: vec![watch.to_string()] }
    }

    /// Globs to watch, falling back to the source globs.
    pub fn watch_globs(&self) -> &[String] {
        if self.watch.is_empty() {
            &self.src
        } else {
            &self.watch
        }
    }
}

/// Sprite sheet inputs and its two outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpritePaths {
    /// Icon source globs
    pub src: Vec<String>,
    /// Directory receiving the packed sheet image
    #[serde(default = "default_sprite_image_dest")]
    pub image_dest: PathBuf,
    /// Directory receiving the generated stylesheet partial
    #[serde(default = "default_sprite_style_dest")]
    pub style_dest: PathBuf,
    /// Sheet image filename
    #[serde(default = "default_sprite_image_name")]
    pub image_name: String,
    /// Partial filename
    #[serde(default = "default_sprite_style_name")]
    pub style_name: String,
    /// URL of the sheet as referenced from the compiled stylesheet
    #[serde(default = "default_sprite_image_url")]
    pub image_url: String,
}

fn default_sprite_image_dest() -> PathBuf {
    PathBuf::from("dist/img/")
}

fn default_sprite_style_dest() -> PathBuf {
    PathBuf::from("src/scss/components/")
}

fn default_sprite_image_name() -> String {
    "sprite.png".to_string()
}

fn default_sprite_style_name() -> String {
    "_sprite.scss".to_string()
}

fn default_sprite_image_url() -> String {
    "../img/sprite.png".to_string()
}

impl Default for SpritePaths {
    fn default() -> Self {
        Self {
            src: vec!["src/img/icons/*.*".to_string()],
            image_dest: default_sprite_image_dest(),
            style_dest: default_sprite_style_dest(),
            image_name: default_sprite_image_name(),
            style_name: default_sprite_style_name(),
            image_url: default_sprite_image_url(),
        }
    }
}

/// Static mapping from asset category to sources and destinations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathTable {
    #[serde(default = "default_html")]
    pub html: AssetPaths,
    #[serde(default = "default_style")]
    pub style: AssetPaths,
    #[serde(default = "default_js")]
    pub js: AssetPaths,
    #[serde(default = "default_img")]
    pub img: AssetPaths,
    #[serde(default)]
    pub sprite: SpritePaths,
    #[serde(default = "default_fonts")]
    pub fonts: AssetPaths,
    /// Directory removed by the `clean` task
    #[serde(default = "default_clean")]
    pub clean: PathBuf,
}

fn default_html() -> AssetPaths {
    AssetPaths::new("src/*.html", "dist/", "src/*.html")
}

fn default_style() -> AssetPaths {
    AssetPaths::new("src/scss/main.scss", "dist/css/", "src/scss/**/*.scss")
}

fn default_js() -> AssetPaths {
    AssetPaths::new("src/js/index.js", "dist/js/", "src/js/**/*.js")
}

fn default_img() -> AssetPaths {
    // Sprite icons are packed into the sheet, not copied
    AssetPaths {
        src: vec!["src/img/**/*.*".to_string(), "!src/img/icons/*.*".to_string()],
        dest: PathBuf::from("dist/img/"),
        watch: vec!["src/img/**/*.*".to_string()],
    }
}

fn default_fonts() -> AssetPaths {
    AssetPaths::new("src/fonts/**/*.*", "dist/fonts/", "src/fonts/**/*.*")
}

fn default_clean() -> PathBuf {
    PathBuf::from("dist")
}

impl Default for PathTable {
    fn default() -> Self {
        Self {
            html: default_html(),
            style: default_style(),
            js: default_js(),
            img: default_img(),
            sprite: SpritePaths::default(),
            fonts: default_fonts(),
            clean: default_clean(),
        }
    }
}

impl PathTable {
    /// Source globs for a category.
    pub fn sources(&self, category: Category) -> &[String] {
        match category {
            Category::Html => &self.html.src,
            Category::Style => &self.style.src,
            Category::Js => &self.js.src,
            Category::Img => &self.img.src,
            Category::Sprite => &self.sprite.src,
            Category::Fonts => &self.fonts.src,
        }
    }

    /// Watch globs for a category.
    pub fn watch_globs(&self, category: Category) -> &[String] {
        match category {
            Category::Html => self.html.watch_globs(),
            Category::Style => self.style.watch_globs(),
            Category::Js => self.js.watch_globs(),
            Category::Img => self.img.watch_globs(),
            Category::Sprite => &self.sprite.src,
            Category::Fonts => self.fonts.watch_globs(),
        }
    }
}

/// Stylesheet pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Delay before compiling, lets editors finish flushing the file
    #[serde(default = "default_style_delay")]
    pub delay_ms: u64,
    /// Browserslist queries used for vendor prefixing
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
    /// Class or id names kept even when no HTML page references them
    #[serde(default)]
    pub keep_selectors: Vec<String>,
}

fn default_style_delay() -> u64 {
    100
}

fn default_browsers() -> Vec<String> {
    ["> 0.5%", "last 2 versions", "Firefox ESR", "not dead"].iter().map(|s| s.to_string()).collect()
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self { delay_ms: default_style_delay(), browsers: default_browsers(), keep_selectors: vec![] }
    }
}

/// Script bundle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Output filename of the bundle
    #[serde(default = "default_bundle_name")]
    pub bundle_name: String,
}

fn default_bundle_name() -> String {
    "index.js".to_string()
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self { bundle_name: default_bundle_name() }
    }
}

/// Image optimisation passes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// PNG optimisation preset (0-6)
    #[serde(default = "default_png_level")]
    pub png_level: u8,
    /// Re-encode GIFs through a quantised palette, kept only when smaller
    #[serde(default = "default_true")]
    pub gif_reencode: bool,
    /// Strip the `viewBox` attribute from SVG roots
    #[serde(default = "default_true")]
    pub svg_remove_view_box: bool,
    /// Drop unreferenced `id` attributes from SVGs
    #[serde(default)]
    pub svg_cleanup_ids: bool,
}

fn default_png_level() -> u8 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            png_level: default_png_level(),
            gif_reencode: true,
            svg_remove_view_box: true,
            svg_cleanup_ids: false,
        }
    }
}

/// Sprite sheet layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteConfig {
    /// Pixels between packed icons
    #[serde(default)]
    pub padding: u32,
    /// Prefix prepended to each icon name
    #[serde(default = "default_class_prefix")]
    pub class_prefix: String,
}

fn default_class_prefix() -> String {
    "icon-".to_string()
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self { padding: 0, class_prefix: default_class_prefix() }
    }
}

/// Development server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served at `/`
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Show an in-page toast when the browser reloads
    #[serde(default)]
    pub notify: bool,
    /// Requested public tunnel subdomain
    #[serde(default = "default_tunnel")]
    pub tunnel: Option<String>,
    /// Tunnel broker
    #[serde(default = "default_tunnel_host")]
    pub tunnel_host: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_tunnel() -> Option<String> {
    Some("venom".to_string())
}

fn default_tunnel_host() -> String {
    "https://localtunnel.me".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_dir: default_base_dir(),
            notify: false,
            tunnel: default_tunnel(),
            tunnel_host: default_tunnel_host(),
        }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Window for coalescing filesystem events, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_debounce_ms() -> u32 {
    50
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

/// Complete sluice.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SluiceConfig {
    #[serde(default)]
    pub paths: PathTable,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub script: ScriptConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub sprite: SpriteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "paths.html.src")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sluice.toml: '{}' {}", self.field, self.message)
    }
}

impl SluiceConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        let categories = [
            ("html", &self.paths.html),
            ("style", &self.paths.style),
            ("js", &self.paths.js),
            ("img", &self.paths.img),
            ("fonts", &self.paths.fonts),
        ];
        for (name, paths) in categories {
            check_globs(&mut errors, &format!("paths.{}.src", name), &paths.src);
            check_globs(&mut errors, &format!("paths.{}.watch", name), &paths.watch);
            if paths.dest.as_os_str().is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("paths.{}.dest", name),
                    message: "must be a non-empty path".to_string(),
                });
            }
        }

        let sprite = &self.paths.sprite;
        check_globs(&mut errors, "paths.sprite.src", &sprite.src);
        let sprite_fields = [
            ("paths.sprite.image_dest", sprite.image_dest.as_os_str().is_empty()),
            ("paths.sprite.style_dest", sprite.style_dest.as_os_str().is_empty()),
            ("paths.sprite.image_name", sprite.image_name.is_empty()),
            ("paths.sprite.style_name", sprite.style_name.is_empty()),
            ("paths.sprite.image_url", sprite.image_url.is_empty()),
        ];
        for (field, empty) in sprite_fields {
            if empty {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: "must be non-empty".to_string(),
                });
            }
        }

        if self.paths.clean.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "paths.clean".to_string(),
                message: "must be a non-empty path".to_string(),
            });
        }

        if self.script.bundle_name.is_empty() {
            errors.push(ConfigValidationError {
                field: "script.bundle_name".to_string(),
                message: "must be non-empty".to_string(),
            });
        }

        if self.images.png_level > 6 {
            errors.push(ConfigValidationError {
                field: "images.png_level".to_string(),
                message: "must be between 0 and 6".to_string(),
            });
        }

        if self.server.port == 0 {
            errors.push(ConfigValidationError {
                field: "server.port".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if matches!(&self.server.tunnel, Some(name) if name.is_empty()) {
            errors.push(ConfigValidationError {
                field: "server.tunnel".to_string(),
                message: "must be a non-empty subdomain when set".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

fn check_globs(errors: &mut Vec<ConfigValidationError>, field: &str, globs: &[String]) {
    for pattern in globs {
        let body = pattern.strip_prefix('!').unwrap_or(pattern);
        if body.is_empty() {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: "contains an empty pattern".to_string(),
            });
        } else if let Err(e) = glob::Pattern::new(body) {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: format!("has invalid glob '{}': {}", pattern, e),
            });
        }
    }
}
