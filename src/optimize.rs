//! Per-format image optimisation.
//!
//! Every pass is lossless with respect to what the browser renders. The
//! optimised bytes are only used when they are smaller than the input.

use crate::config::ImagesConfig;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::AnimationDecoder;
use regex::Regex;
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// Failure inside an optimisation pass.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("png: {0}")]
    Png(#[from] oxipng::PngError),
    #[error("gif: {0}")]
    Gif(#[from] image::ImageError),
    #[error("svg is not valid UTF-8")]
    SvgEncoding,
}

/// Formats with a dedicated pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Gif,
    Jpeg,
    Svg,
    Other,
}

impl ImageKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("png") => ImageKind::Png,
            Some("gif") => ImageKind::Gif,
            Some("jpg") | Some("jpeg") => ImageKind::Jpeg,
            Some("svg") => ImageKind::Svg,
            _ => ImageKind::Other,
        }
    }
}

/// Optimise `data`, returning the bytes to write.
///
/// Returns the input unchanged when no pass applies or the pass did not
/// shrink it.
/// JPEG files always pass through unchanged.
pub fn optimize(kind: ImageKind, data: &[u8], config: &ImagesConfig) -> Result<Vec<u8>, OptimizeError> {
    let candidate = match kind {
        ImageKind::Png => Some(optimize_png(data, config.png_level)?),
        ImageKind::Gif if config.gif_reencode => Some(reencode_gif(data)?),
        ImageKind::Svg => {
            let text = std::str::from_utf8(data).map_err(|_| OptimizeError::SvgEncoding)?;
            Some(minify_svg(text, config).into_bytes())
        }
        ImageKind::Jpeg | ImageKind::Gif | ImageKind::Other => None,
    };

    Ok(match candidate {
        Some(bytes) if bytes.len() < data.len() => bytes,
        _ => data.to_vec(),
    })
}

fn optimize_png(data: &[u8], level: u8) -> Result<Vec<u8>, OptimizeError> {
    let options = oxipng::Options::from_preset(level);
    Ok(oxipng::optimize_from_memory(data, &options)?)
}

fn reencode_gif(data: &[u8]) -> Result<Vec<u8>, OptimizeError> {
    let decoder = GifDecoder::new(Cursor::new(data))?;
    let frames = decoder.into_frames().collect_frames()?;

    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        if frames.len() > 1 {
            encoder.set_repeat(Repeat::Infinite)?;
        }
        encoder.encode_frames(frames)?;
    }
    Ok(out)
}

static XML_DECL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\?xml[^>]*\?>").expect("valid regex"));
static DOCTYPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<!DOCTYPE[^>]*>").expect("valid regex"));
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static METADATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<metadata\b.*?</metadata>|<metadata\b[^>]*/>").expect("valid regex")
});
static EDITOR_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(sodipodi|inkscape):[\w-]+\b[^>]*/>|<(sodipodi|inkscape):([\w-]+)\b.*?</(sodipodi|inkscape):[\w-]+>")
        .expect("valid regex")
});
static EDITOR_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s(?:xmlns:)?(?:sodipodi|inkscape|sketch)(?::[\w-]+)?="[^"]*""#).expect("valid regex")
});
static BETWEEN_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").expect("valid regex"));
static SVG_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<svg\b[^>]*>").expect("valid regex"));
static ID_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\sid="([^"]*)""#).expect("valid regex"));

/// Strip editor cruft and insignificant whitespace from an SVG document.
pub fn minify_svg(svg: &str, config: &ImagesConfig) -> String {
    let mut out = XML_DECL.replace_all(svg, "").into_owned();
    for re in [&*DOCTYPE, &*COMMENT, &*METADATA, &*EDITOR_ELEMENT, &*EDITOR_ATTR] {
        out = re.replace_all(&out, "").into_owned();
    }
    out = BETWEEN_TAGS.replace_all(&out, "><").into_owned();

    if config.svg_remove_view_box {
        out = remove_redundant_view_box(&out);
    }
    if config.svg_cleanup_ids {
        out = remove_unreferenced_ids(&out);
    }

    out.trim().to_string()
}

/// Drop the root `viewBox` when it is exactly `0 0 width height`.
fn remove_redundant_view_box(svg: &str) -> String {
    let Some(open) = SVG_OPEN.find(svg) else {
        return svg.to_string();
    };
    let tag = open.as_str();
    let (Some(width), Some(height), Some(view_box)) =
        (attr(tag, "width"), attr(tag, "height"), attr(tag, "viewBox"))
    else {
        return svg.to_string();
    };

    let numbers: Vec<f64> = view_box
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    let px = |v: &str| v.trim_end_matches("px").parse::<f64>().ok();

    let redundant = matches!(
        (numbers.as_slice(), px(&width), px(&height)),
        ([x, y, w, h], Some(pw), Some(ph)) if *x == 0.0 && *y == 0.0 && *w == pw && *h == ph
    );
    if !redundant {
        return svg.to_string();
    }

    let stripped = tag.replacen(&format!(" viewBox=\"{}\"", view_box), "", 1);
    format!("{}{}{}", &svg[..open.start()], stripped, &svg[open.end()..])
}

fn attr(tag: &str, name: &str) -> Option<String> {
    let needle = format!(" {}=\"", name);
    let start = tag.find(&needle)? + needle.len();
    let len = tag[start..].find('"')?;
    Some(tag[start..start + len].to_string())
}

fn remove_unreferenced_ids(svg: &str) -> String {
    ID_ATTR
        .replace_all(svg, |caps: &regex::Captures| {
            let id = &caps[1];
            if svg.contains(&format!("#{}", id)) {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}
