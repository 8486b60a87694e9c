//! Rendering surface.
//!
//! [`Renderer`] is the seam the director renders through. [`FlatRenderer`]
//! is a plain software rasterizer: solid rectangles for sprites without a
//! source, scaled images for sprites with one, and glyph blocks for text.
//! It exists so a performance can run end to end without a GPU or a font
//! stack; anything fancier plugs in behind the trait.

use image::imageops;
use image::{Rgba, RgbaImage};
use storyline_common::error::{StorylineError, StorylineResult};

use crate::scene::{parse_color, Filter, Node, NodeContent, NodeId, SceneGraph};

/// Turns the scene graph into one RGBA frame.
pub trait Renderer: Send {
    fn render(&mut self, graph: &SceneGraph, time: f64) -> StorylineResult<RgbaImage>;

    /// Output size in pixels.
    fn dimensions(&self) -> (u32, u32);
}

/// Accumulated placement while walking down the tree.
#[derive(Debug, Clone, Copy)]
struct Transform {
    x: f32,
    y: f32,
    scale: f32,
    alpha: f32,
}

impl Transform {
    const IDENTITY: Transform = Transform {
        x: 0.0,
        y: 0.0,
        scale: 1.0,
        alpha: 1.0,
    };

    fn child(self, node: &Node) -> Transform {
        Transform {
            x: self.x + (node.x + node.offset_x) * self.scale,
            y: self.y + node.y * self.scale,
            scale: self.scale * node.scale,
            alpha: self.alpha * node.alpha,
        }
    }
}

/// Software renderer over `image::RgbaImage`.
#[derive(Debug, Clone)]
pub struct FlatRenderer {
    width: u32,
    height: u32,
    background: Rgba<u8>,
}

impl FlatRenderer {
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Self {
        Self {
            width,
            height,
            background,
        }
    }

    /// Build from a canvas size and a `#rrggbb` background.
    pub fn with_background(width: u32, height: u32, background: &str) -> StorylineResult<Self> {
        Ok(Self::new(width, height, parse_color(background)?))
    }

    fn draw_node(
        &self,
        target: &mut RgbaImage,
        graph: &SceneGraph,
        id: NodeId,
        parent: Transform,
        time: f64,
    ) {
        let node = graph.node(id);
        if !node.visible || node.alpha <= 0.0 {
            return;
        }
        let transform = parent.child(node);

        if node.filters.is_empty() {
            self.draw_subtree(target, graph, node, transform, time);
            return;
        }

        let mut layer = RgbaImage::new(self.width, self.height);
        self.draw_subtree(&mut layer, graph, node, transform, time);
        for filter in &node.filters {
            layer = apply_filter(layer, filter);
        }
        blit(target, &layer, 0, 0, 1.0);
    }

    fn draw_subtree(
        &self,
        target: &mut RgbaImage,
        graph: &SceneGraph,
        node: &Node,
        transform: Transform,
        time: f64,
    ) {
        self.draw_content(target, node, transform, time);
        for child in &node.children {
            self.draw_node(target, graph, *child, transform, time);
        }
    }

    fn draw_content(&self, target: &mut RgbaImage, node: &Node, t: Transform, time: f64) {
        let width = node.width * t.scale;
        let height = node.height * t.scale;

        match &node.content {
            NodeContent::Container => {}
            NodeContent::Sprite {
                color,
                source,
                source_started_at,
                ..
            } => {
                let frame = source
                    .as_ref()
                    .and_then(|s| s.render(time - source_started_at));
                match frame {
                    Some(image) => {
                        let (w, h) = if width >= 1.0 && height >= 1.0 {
                            (width as f64, height as f64)
                        } else {
                            (
                                image.width() as f64 * t.scale as f64,
                                image.height() as f64 * t.scale as f64,
                            )
                        };
                        let rect = Rect {
                            x: t.x.round() as i64,
                            y: t.y.round() as i64,
                            w: w.round() as i64,
                            h: h.round() as i64,
                        };
                        blit_scaled(target, image, rect, t.alpha);
                    }
                    None => fill_rect(target, t.x, t.y, width, height, *color, t.alpha),
                }
            }
            NodeContent::Text {
                content,
                color,
                font_size,
                reveal,
            } => {
                let total = content.chars().count();
                let shown = ((*reveal as f64) * total as f64 + 1e-6).floor() as usize;
                self.draw_glyphs(target, content, shown, *color, *font_size, width, t);
            }
        }
    }

    /// Lay out the first `shown` characters as blocks, wrapping at the node width.
    #[allow(clippy::too_many_arguments)]
    fn draw_glyphs(
        &self,
        target: &mut RgbaImage,
        content: &str,
        shown: usize,
        color: Rgba<u8>,
        font_size: f32,
        max_width: f32,
        t: Transform,
    ) {
        let advance = font_size * 0.6 * t.scale;
        let glyph_height = font_size * 0.8 * t.scale;
        let line_height = font_size * 1.2 * t.scale;
        if advance <= 0.0 {
            return;
        }

        let mut pen_x = 0.0f32;
        let mut pen_y = 0.0f32;
        for c in content.chars().take(shown) {
            if c == '\n' {
                pen_x = 0.0;
                pen_y += line_height;
                continue;
            }
            // Wide glyphs take two cells.
            let cell = if is_wide(c) { advance * 2.0 } else { advance };
            if max_width > 0.0 && pen_x > 0.0 && pen_x + cell > max_width {
                pen_x = 0.0;
                pen_y += line_height;
            }
            if !c.is_whitespace() {
                fill_rect(
                    target,
                    t.x + pen_x + cell * 0.1,
                    t.y + pen_y,
                    cell * 0.8,
                    glyph_height,
                    color,
                    t.alpha,
                );
            }
            pen_x += cell;
        }
    }
}

impl Renderer for FlatRenderer {
    fn render(&mut self, graph: &SceneGraph, time: f64) -> StorylineResult<RgbaImage> {
        if self.width == 0 || self.height == 0 {
            return Err(StorylineError::render(format!(
                "cannot render onto a {}x{} canvas",
                self.width, self.height
            )));
        }
        let mut canvas = RgbaImage::from_pixel(self.width, self.height, self.background);
        if !graph.is_empty() {
            self.draw_node(&mut canvas, graph, graph.root(), Transform::IDENTITY, time);
        }
        Ok(canvas)
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xAC00..=0xD7AF | 0xF900..=0xFAFF)
}

fn fill_rect(
    target: &mut RgbaImage,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    color: Rgba<u8>,
    opacity: f32,
) {
    if width <= 0.0 || height <= 0.0 {
        return;
    }
    let (tw, th) = target.dimensions();
    let x0 = x.round().max(0.0) as u32;
    let y0 = y.round().max(0.0) as u32;
    let x1 = ((x + width).round().max(0.0) as u32).min(tw);
    let y1 = ((y + height).round().max(0.0) as u32).min(th);

    for py in y0..y1 {
        for px in x0..x1 {
            blend(target.get_pixel_mut(px, py), color, opacity);
        }
    }
}

fn blit(target: &mut RgbaImage, source: &RgbaImage, x: i64, y: i64, opacity: f32) {
    let (tw, th) = target.dimensions();
    for (sx, sy, pixel) in source.enumerate_pixels() {
        let px = x + sx as i64;
        let py = y + sy as i64;
        if px < 0 || py < 0 || px >= tw as i64 || py >= th as i64 {
            continue;
        }
        blend(target.get_pixel_mut(px as u32, py as u32), *pixel, opacity);
    }
}

/// Destination rectangle in canvas pixels; may extend past the canvas.
#[derive(Debug, Clone, Copy)]
struct Rect {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

/// Nearest-neighbour scale of `source` into `rect`. Only destination pixels
/// that land on the canvas are sampled, so cost is bounded by the canvas.
fn blit_scaled(target: &mut RgbaImage, source: &RgbaImage, rect: Rect, opacity: f32) {
    let (tw, th) = target.dimensions();
    let (sw, sh) = source.dimensions();
    if sw == 0 || sh == 0 || rect.w <= 0 || rect.h <= 0 {
        return;
    }
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = rect.x.saturating_add(rect.w).min(tw as i64);
    let y1 = rect.y.saturating_add(rect.h).min(th as i64);

    for py in y0..y1 {
        let sy = (((py - rect.y) as f64 + 0.5) * sh as f64 / rect.h as f64) as u32;
        for px in x0..x1 {
            let sx = (((px - rect.x) as f64 + 0.5) * sw as f64 / rect.w as f64) as u32;
            let pixel = *source.get_pixel(sx.min(sw - 1), sy.min(sh - 1));
            blend(target.get_pixel_mut(px as u32, py as u32), pixel, opacity);
        }
    }
}

/// Source-over compositing with straight alpha.
fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>, opacity: f32) {
    let sa = src[3] as f32 / 255.0 * opacity.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for i in 0..3 {
        let c = (src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) / out_a;
        dst[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

fn apply_filter(layer: RgbaImage, filter: &Filter) -> RgbaImage {
    match *filter {
        Filter::Blur { radius } => {
            if radius > 0.0 {
                imageops::blur(&layer, radius)
            } else {
                layer
            }
        }
        Filter::Grayscale => map_rgb(layer, |r, g, b| {
            let l = 0.299 * r + 0.587 * g + 0.114 * b;
            (l, l, l)
        }),
        Filter::Sepia => map_rgb(layer, |r, g, b| {
            (
                0.393 * r + 0.769 * g + 0.189 * b,
                0.349 * r + 0.686 * g + 0.168 * b,
                0.272 * r + 0.534 * g + 0.131 * b,
            )
        }),
        Filter::Brightness { amount } => {
            map_rgb(layer, |r, g, b| (r * amount, g * amount, b * amount))
        }
        Filter::Tint { color, strength } => {
            let s = strength.clamp(0.0, 1.0);
            let (tr, tg, tb) = (color[0] as f32, color[1] as f32, color[2] as f32);
            map_rgb(layer, |r, g, b| {
                (r + (tr - r) * s, g + (tg - g) * s, b + (tb - b) * s)
            })
        }
    }
}

fn map_rgb(mut layer: RgbaImage, f: impl Fn(f32, f32, f32) -> (f32, f32, f32)) -> RgbaImage {
    for pixel in layer.pixels_mut() {
        if pixel[3] == 0 {
            continue;
        }
        let (r, g, b) = f(pixel[0] as f32, pixel[1] as f32, pixel[2] as f32);
        pixel[0] = r.round().clamp(0.0, 255.0) as u8;
        pixel[1] = g.round().clamp(0.0, 255.0) as u8;
        pixel[2] = b.round().clamp(0.0, 255.0) as u8;
    }
    layer
}
