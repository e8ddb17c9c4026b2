//! `build:sprite`: pack icons into one sheet and generate its SCSS partial.
//!
//! The sheet image and the partial go to different directories (the partial
//! lands back in the source tree so stylesheets can import it).

use crate::atlas::{pack_sprites, SpriteFrame, SpriteInput, SpriteSheet};
use crate::build::{BuildContext, TaskError};
use crate::config::Category;
use image::ImageOutputFormat;
use std::fmt::Write as _;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub fn run(ctx: &BuildContext) -> Result<Vec<PathBuf>, TaskError> {
    let files = ctx.sources(Category::Sprite)?.files()?;
    let paths = &ctx.config().paths.sprite;

    let mut icons = Vec::with_capacity(files.len());
    for file in &files {
        let image = image::open(&file.path).map_err(|e| TaskError::image(&file.path, e))?.to_rgba8();
        let name = file.path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        icons.push(SpriteInput { name, image });
    }

    let sheet = pack_sprites(&icons, ctx.config().sprite.padding)?;
    let partial = render_partial(&sheet, &paths.image_url, &ctx.config().sprite.class_prefix);

    let image_path = ctx.resolve_path(&paths.image_dest).join(&paths.image_name);
    let partial_path = ctx.resolve_path(&paths.style_dest).join(&paths.style_name);

    let (image_written, partial_written) = rayon::join(
        || write_sheet(&sheet, &image_path),
        || super::write_output(&partial_path, partial.as_bytes()),
    );

    let mut outputs = Vec::with_capacity(2);
    if image_written? {
        outputs.push(image_path);
    }
    partial_written?;
    outputs.push(partial_path);

    tracing::info!("Packed {} icons into {}x{} sheet", sheet.frames.len(), sheet.image.width(), sheet.image.height());
    Ok(outputs)
}

/// Encode and write the sheet; an empty sheet writes nothing.
fn write_sheet(sheet: &SpriteSheet, path: &Path) -> Result<bool, TaskError> {
    if sheet.frames.is_empty() {
        return Ok(false);
    }
    let mut png = Vec::new();
    sheet
        .image
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| TaskError::image(path, e))?;
    super::write_output(path, &png)?;
    Ok(true)
}

fn px(value: u32) -> String {
    format!("{}px", value)
}

fn offset(value: u32) -> String {
    if value == 0 {
        "0px".to_string()
    } else {
        format!("-{}px", value)
    }
}

/// SCSS partial with sheet variables, one variable map and one rule per icon.
pub fn render_partial(sheet: &SpriteSheet, image_url: &str, prefix: &str) -> String {
    let (width, height) = (sheet.image.width(), sheet.image.height());
    let mut out = String::new();

    let _ = writeln!(out, "// Generated by sluice. Changes will be overwritten.");
    let _ = writeln!(out, "$spritesheet-width: {};", px(width));
    let _ = writeln!(out, "$spritesheet-height: {};", px(height));
    let _ = writeln!(out, "$spritesheet-image: '{}';", image_url);

    for frame in &sheet.frames {
        let _ = writeln!(out, "{}", icon_variable(frame, prefix, width, height, image_url));
    }

    for frame in &sheet.frames {
        let _ = write!(
            out,
            "\n.{prefix}{name} {{\n  background-image: url('{url}');\n  background-position: {x} {y};\n  width: {w};\n  height: {h};\n}}\n",
            prefix = prefix,
            name = frame.name,
            url = image_url,
            x = offset(frame.x),
            y = offset(frame.y),
            w = px(frame.width),
            h = px(frame.height),
        );
    }

    out
}

/// `$icon-name: (x, y, offset-x, offset-y, width, height, sheet-width, sheet-height, image, name);`
fn icon_variable(frame: &SpriteFrame, prefix: &str, sheet_w: u32, sheet_h: u32, image_url: &str) -> String {
    format!(
        "${prefix}{name}: ({x}, {y}, {ox}, {oy}, {w}, {h}, {sw}, {sh}, '{url}', '{prefix}{name}');",
        prefix = prefix,
        name = frame.name,
        x = px(frame.x),
        y = px(frame.y),
        ox = offset(frame.x),
        oy = offset(frame.y),
        w = px(frame.width),
        h = px(frame.height),
        sw = px(sheet_w),
        sh = px(sheet_h),
        url = image_url,
    )
}
