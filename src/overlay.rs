//! Rasterises a [`LayoutBlock`] into the transparent text layer that the
//! compositor places over the background clip.

use crate::catalog::Quote;
use crate::error::{ShortsError, ShortsResult};
use crate::layout::{layout_quote, FontMetrics, LayoutBlock, LayoutStyle, PlacedLine, Rect, TextExtent};
use ab_glyph::{FontVec, PxScale};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect as PixelRect;
use std::path::Path;

pub const BACKDROP_FILL: Rgba<u8> = Rgba([0, 0, 0, 165]);
pub const QUOTE_SHADOW: Rgba<u8> = Rgba([0, 0, 0, 160]);
pub const QUOTE_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const AUTHOR_SHADOW: Rgba<u8> = Rgba([0, 0, 0, 140]);
pub const AUTHOR_FILL: Rgba<u8> = Rgba([220, 220, 220, 230]);
pub const SHADOW_OFFSET: i32 = 2;

/// TrueType font used both to measure and to draw overlay text.
pub struct GlyphFont {
    font: FontVec,
}

impl GlyphFont {
    pub fn from_bytes(bytes: Vec<u8>) -> ShortsResult<Self> {
        let font = FontVec::try_from_vec(bytes)
            .map_err(|err| ShortsError::layout(format!("invalid font data: {err}")))?;
        Ok(Self { font })
    }

    pub async fn load(path: &Path) -> ShortsResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| ShortsError::layout(format!("cannot read font {}: {}", path.display(), err)))?;
        Self::from_bytes(bytes)
    }
}

impl FontMetrics for GlyphFont {
    fn measure(&self, text: &str, size: f32) -> TextExtent {
        if text.is_empty() {
            return TextExtent { width: 0, height: 0 };
        }
        let (width, height) = text_size(PxScale::from(size), &self.font, text);
        TextExtent { width, height }
    }
}

/// Fills `rect` with `radius`-rounded corners. Pixels are overwritten, not blended.
pub fn draw_backdrop(canvas: &mut RgbaImage, rect: Rect, radius: u32, fill: Rgba<u8>) {
    let (w, h) = (rect.width(), rect.height());
    if w == 0 || h == 0 {
        return;
    }

    let r = radius.min(w / 2).min(h / 2);
    let ri = r as i32;

    if w > 2 * r {
        draw_filled_rect_mut(canvas, PixelRect::at(rect.left + ri, rect.top).of_size(w - 2 * r, h), fill);
    }
    if h > 2 * r {
        draw_filled_rect_mut(canvas, PixelRect::at(rect.left, rect.top + ri).of_size(w, h - 2 * r), fill);
    }
    if r == 0 {
        return;
    }

    let corners = [
        (rect.left + ri, rect.top + ri),
        (rect.right - ri - 1, rect.top + ri),
        (rect.left + ri, rect.bottom - ri - 1),
        (rect.right - ri - 1, rect.bottom - ri - 1),
    ];
    for center in corners {
        draw_filled_circle_mut(canvas, center, ri, fill);
    }
}

fn draw_shadowed(
    canvas: &mut RgbaImage,
    font: &GlyphFont,
    line: &PlacedLine,
    size: f32,
    shadow: Rgba<u8>,
    fill: Rgba<u8>,
) {
    let scale = PxScale::from(size);
    draw_text_mut(
        canvas,
        shadow,
        line.x + SHADOW_OFFSET,
        line.y + SHADOW_OFFSET,
        scale,
        &font.font,
        &line.text,
    );
    draw_text_mut(canvas, fill, line.x, line.y, scale, &font.font, &line.text);
}

pub fn paint_overlay(block: &LayoutBlock, font: &GlyphFont, style: &LayoutStyle) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(style.canvas_width, style.canvas_height, Rgba([0, 0, 0, 0]));

    draw_backdrop(&mut canvas, block.backdrop, style.corner_radius, BACKDROP_FILL);

    for line in &block.lines {
        draw_shadowed(&mut canvas, font, line, style.quote_size, QUOTE_SHADOW, QUOTE_FILL);
    }
    draw_shadowed(
        &mut canvas,
        font,
        &block.author,
        style.author_size,
        AUTHOR_SHADOW,
        AUTHOR_FILL,
    );

    canvas
}

/// Lays out `quote`, paints it and writes the PNG to `dest`.
pub fn render_overlay(quote: &Quote, font: &GlyphFont, style: &LayoutStyle, dest: &Path) -> ShortsResult<LayoutBlock> {
    let block = layout_quote(quote, font, style);
    let canvas = paint_overlay(&block, font, style);
    canvas
        .save_with_format(dest, ImageFormat::Png)
        .map_err(|err| ShortsError::layout(format!("cannot write overlay {}: {}", dest.display(), err)))?;
    Ok(block)
}
