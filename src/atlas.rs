//! Sprite sheet packing - combines icons into one image with per-icon offsets
//!
//! Implements a growing binary-tree packer: blocks are placed largest first
//! into the free space of a tree of rectangles, and the sheet grows right or
//! down when nothing fits, preferring whichever keeps it closer to square.

use image::{Rgba, RgbaImage};
use serde::Serialize;
use thiserror::Error;

/// Error during sprite packing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackError {
    /// An icon with no pixels cannot be placed
    #[error("sprite '{0}' has zero width or height")]
    ZeroSized(String),
    /// The packer found no free node and could not grow
    #[error("no room to place sprite '{0}'")]
    Unplaceable(String),
}

/// A rectangle to be placed.
#[derive(Debug, Clone)]
pub struct Block {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// Where a block ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

/// Packed layout; `placements[i]` belongs to input block `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone)]
struct Node {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    used: bool,
    right: Option<usize>,
    down: Option<usize>,
}

impl Node {
    fn free(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h, used: false, right: None, down: None }
    }
}

/// Arena-backed binary tree of free and used rectangles.
struct Packer {
    nodes: Vec<Node>,
    root: usize,
}

impl Packer {
    fn new(w: u32, h: u32) -> Self {
        Self { nodes: vec![Node::free(0, 0, w, h)], root: 0 }
    }

    fn alloc(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn find(&self, idx: usize, w: u32, h: u32) -> Option<usize> {
        let node = &self.nodes[idx];
        if node.used {
            node.right
                .and_then(|r| self.find(r, w, h))
                .or_else(|| node.down.and_then(|d| self.find(d, w, h)))
        } else if w <= node.w && h <= node.h {
            Some(idx)
        } else {
            None
        }
    }

    fn split(&mut self, idx: usize, w: u32, h: u32) -> Placement {
        let Node { x, y, w: nw, h: nh, .. } = self.nodes[idx];
        let down = self.alloc(Node::free(x, y + h, nw, nh - h));
        let right = self.alloc(Node::free(x + w, y, nw - w, h));
        let node = &mut self.nodes[idx];
        node.used = true;
        node.down = Some(down);
        node.right = Some(right);
        Placement { x, y }
    }

    fn place(&mut self, w: u32, h: u32) -> Option<Placement> {
        match self.find(self.root, w, h) {
            Some(idx) => Some(self.split(idx, w, h)),
            None => self.grow(w, h),
        }
    }

    fn grow(&mut self, w: u32, h: u32) -> Option<Placement> {
        let Node { w: rw, h: rh, .. } = self.nodes[self.root];

        let can_grow_down = w <= rw;
        let can_grow_right = h <= rh;
        // keep the sheet roughly square
        let should_grow_right = can_grow_right && rh >= rw + w;
        let should_grow_down = can_grow_down && rw >= rh + h;

        if should_grow_right {
            self.grow_right(w, h)
        } else if should_grow_down {
            self.grow_down(w, h)
        } else if can_grow_right {
            self.grow_right(w, h)
        } else if can_grow_down {
            self.grow_down(w, h)
        } else {
            None
        }
    }

    fn grow_right(&mut self, w: u32, h: u32) -> Option<Placement> {
        let old = self.root;
        let Node { w: rw, h: rh, .. } = self.nodes[old];
        let right = self.alloc(Node::free(rw, 0, w, rh));
        self.root = self.alloc(Node {
            x: 0,
            y: 0,
            w: rw + w,
            h: rh,
            used: true,
            right: Some(right),
            down: Some(old),
        });
        let idx = self.find(self.root, w, h)?;
        Some(self.split(idx, w, h))
    }

    fn grow_down(&mut self, w: u32, h: u32) -> Option<Placement> {
        let old = self.root;
        let Node { w: rw, h: rh, .. } = self.nodes[old];
        let down = self.alloc(Node::free(0, rh, rw, h));
        self.root = self.alloc(Node {
            x: 0,
            y: 0,
            w: rw,
            h: rh + h,
            used: true,
            right: Some(old),
            down: Some(down),
        });
        let idx = self.find(self.root, w, h)?;
        Some(self.split(idx, w, h))
    }
}

/// Pack blocks into a single sheet.
///
/// Each block is inflated by `padding` on its right and bottom edges while
/// packing; the reported sheet size is the bounding box of the placed
/// blocks without trailing padding.
pub fn pack(blocks: &[Block], padding: u32) -> Result<Layout, PackError> {
    if let Some(block) = blocks.iter().find(|b| b.width == 0 || b.height == 0) {
        return Err(PackError::ZeroSized(block.name.clone()));
    }
    if blocks.is_empty() {
        return Ok(Layout { width: 0, height: 0, placements: vec![] });
    }

    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (&blocks[a], &blocks[b]);
        let max = |k: &Block| k.width.max(k.height);
        let min = |k: &Block| k.width.min(k.height);
        max(b)
            .cmp(&max(a))
            .then(min(b).cmp(&min(a)))
            .then(b.height.cmp(&a.height))
            .then(b.width.cmp(&a.width))
            .then(a.name.cmp(&b.name))
    });

    let first = &blocks[order[0]];
    let mut packer = Packer::new(first.width + padding, first.height + padding);
    let mut placements = vec![Placement { x: 0, y: 0 }; blocks.len()];

    for idx in order {
        let block = &blocks[idx];
        placements[idx] = packer
            .place(block.width + padding, block.height + padding)
            .ok_or_else(|| PackError::Unplaceable(block.name.clone()))?;
    }

    let width = blocks.iter().zip(&placements).map(|(b, p)| p.x + b.width).max().unwrap_or(0);
    let height = blocks.iter().zip(&placements).map(|(b, p)| p.y + b.height).max().unwrap_or(0);

    Ok(Layout { width, height, placements })
}

/// An icon to be packed
#[derive(Debug)]
pub struct SpriteInput {
    pub name: String,
    pub image: RgbaImage,
}

/// Position of an icon within the sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpriteFrame {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Composed sheet plus the frame of every icon, in input order.
#[derive(Debug)]
pub struct SpriteSheet {
    pub image: RgbaImage,
    pub frames: Vec<SpriteFrame>,
}

/// Transparent color for sheet background
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Pack icons and compose them into one image.
pub fn pack_sprites(sprites: &[SpriteInput], padding: u32) -> Result<SpriteSheet, PackError> {
    let blocks: Vec<Block> = sprites
        .iter()
        .map(|s| Block { name: s.name.clone(), width: s.image.width(), height: s.image.height() })
        .collect();
    let layout = pack(&blocks, padding)?;

    let mut image = RgbaImage::from_pixel(layout.width, layout.height, TRANSPARENT);
    let mut frames = Vec::with_capacity(sprites.len());
    for (sprite, place) in sprites.iter().zip(&layout.placements) {
        copy_sprite_to_sheet(&mut image, &sprite.image, place.x, place.y);
        frames.push(SpriteFrame {
            name: sprite.name.clone(),
            x: place.x,
            y: place.y,
            width: sprite.image.width(),
            height: sprite.image.height(),
        });
    }

    Ok(SpriteSheet { image, frames })
}

/// Copy an icon into the sheet at the given position
fn copy_sprite_to_sheet(sheet: &mut RgbaImage, sprite: &RgbaImage, x: u32, y: u32) {
    for (sx, sy, pixel) in sprite.enumerate_pixels() {
        if x + sx < sheet.width() && y + sy < sheet.height() {
            sheet.put_pixel(x + sx, y + sy, *pixel);
        }
    }
}
