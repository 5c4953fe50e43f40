//! Text layout for the quote overlay: greedy word wrap against measured
//! pixel widths, then a vertically centred block with a padded backdrop.
//!
//! Geometry only. Pixels are produced by [`crate::overlay`].

use crate::catalog::Quote;

pub const CANVAS_WIDTH: u32 = 1080;
pub const CANVAS_HEIGHT: u32 = 1920;
pub const TEXT_MARGIN: u32 = 200;
pub const MAX_TEXT_WIDTH: u32 = CANVAS_WIDTH - 2 * TEXT_MARGIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextExtent {
    pub width: u32,
    pub height: u32,
}

/// Pixel extent of `text` rendered at `size` px.
pub trait FontMetrics {
    fn measure(&self, text: &str, size: f32) -> TextExtent;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutStyle {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub max_text_width: u32,
    pub quote_size: f32,
    pub author_size: f32,
    pub line_spacing: u32,
    pub author_gap: u32,
    pub padding_y: u32,
    pub backdrop_margin: u32,
    pub corner_radius: u32,
    /// Vertical centre of the block as a fraction of canvas height.
    pub center_fraction: f64,
}

impl Default for LayoutStyle {
    fn default() -> Self {
        Self {
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            max_text_width: MAX_TEXT_WIDTH,
            quote_size: 68.0,
            author_size: 46.0,
            line_spacing: 14,
            author_gap: 24,
            padding_y: 50,
            backdrop_margin: 60,
            corner_radius: 32,
            center_fraction: 0.38,
        }
    }
}

/// Half-open pixel rectangle `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, other: &Rect) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PlacedLine {
    #[cfg(test)]
    pub(crate) fn bounds(&self) -> Rect {
        Rect {
            left: self.x,
            top: self.y,
            right: self.x + self.width as i32,
            bottom: self.y + self.height as i32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutBlock {
    pub lines: Vec<PlacedLine>,
    pub author: PlacedLine,
    pub block_height: u32,
    pub center_y: i32,
    pub backdrop: Rect,
}

impl LayoutBlock {
    pub fn top(&self) -> i32 {
        self.center_y - (self.block_height / 2) as i32
    }

    pub fn bottom(&self) -> i32 {
        self.top() + self.block_height as i32
    }
}

pub fn author_line(author: &str) -> String {
    format!("— {}", author.trim())
}

/// Greedy wrap: a word joins the current line while the measured line stays
/// within `max_width`. A word wider than `max_width` gets a line of its own.
pub fn wrap_words<M>(text: &str, metrics: &M, size: f32, max_width: u32) -> Vec<String>
where
    M: FontMetrics + ?Sized,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }

        let candidate = format!("{current} {word}");
        if metrics.measure(&candidate, size).width <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub fn layout_quote<M>(quote: &Quote, metrics: &M, style: &LayoutStyle) -> LayoutBlock
where
    M: FontMetrics + ?Sized,
{
    let wrapped = wrap_words(&quote.content, metrics, style.quote_size, style.max_text_width);
    let extents: Vec<TextExtent> = wrapped
        .iter()
        .map(|line| metrics.measure(line, style.quote_size))
        .collect();

    let author_text = author_line(&quote.author);
    let author_extent = metrics.measure(&author_text, style.author_size);

    let quote_height = if extents.is_empty() {
        0
    } else {
        extents.iter().map(|e| e.height).sum::<u32>()
            + style.line_spacing * (extents.len() as u32 - 1)
            + style.author_gap
    };
    let block_height = quote_height + author_extent.height;

    let center_y = (style.canvas_height as f64 * style.center_fraction) as i32;
    let top = center_y - (block_height / 2) as i32;

    let centered_x = |width: u32| (style.canvas_width as i32 - width as i32) / 2;

    let mut y = top;
    let mut lines = Vec::with_capacity(wrapped.len());
    for (text, extent) in wrapped.into_iter().zip(extents) {
        lines.push(PlacedLine {
            text,
            x: centered_x(extent.width),
            y,
            width: extent.width,
            height: extent.height,
        });
        y += (extent.height + style.line_spacing) as i32;
    }

    let author = PlacedLine {
        text: author_text,
        x: centered_x(author_extent.width),
        y: top + quote_height as i32,
        width: author_extent.width,
        height: author_extent.height,
    };

    let backdrop = Rect {
        left: style.backdrop_margin as i32,
        top: top - style.padding_y as i32,
        right: (style.canvas_width - style.backdrop_margin) as i32,
        bottom: top + block_height as i32 + style.padding_y as i32,
    };

    LayoutBlock {
        lines,
        author,
        block_height,
        center_y,
        backdrop,
    }
}
