//! Text Layout - Wrapping, Multi-line Placement, Auto-fit
//!
//! All measurements are in rendered pixels of the resolved font, so text
//! transforms must be applied before calling into this module.

use image::RgbImage;

use crate::fields::{Alignment, Rgb};
use crate::fonts::{FontHandle, FontResolver};

/// Point-size decrement used by [`fit_by_size_reduction`].
pub const FIT_STEP: u32 = 2;

/// Greedy word wrap. Words are never split; a word wider than `max_width` gets its own line.
pub fn wrap(text: &str, font: &FontHandle, max_width: u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in text.split_whitespace() {
        let mut candidate = current.join(" ");
        if !candidate.is_empty() {
            candidate.push(' ');
        }
        candidate.push_str(word);

        if font.text_width(&candidate) <= max_width {
            current.push(word);
        } else if current.is_empty() {
            lines.push(word.to_string());
        } else {
            lines.push(current.join(" "));
            current = vec![word];
        }
    }

    if !current.is_empty() {
        lines.push(current.join(" "));
    }
    lines
}

/// Left x of one line for the given alignment.
pub fn line_start_x(start_x: i32, line_width: u32, alignment: Alignment) -> i32 {
    match alignment {
        Alignment::Left => start_x,
        Alignment::Center => start_x - (line_width / 2) as i32,
    }
}

/// Draw lines top-down from `start_y`; returns the y below the last line.
#[allow(clippy::too_many_arguments)]
pub fn draw_multiline(
    canvas: &mut RgbImage,
    lines: &[String],
    start_x: i32,
    start_y: i32,
    font: &FontHandle,
    alignment: Alignment,
    line_spacing: i32,
    color: Rgb,
) -> i32 {
    let mut y = start_y;
    for line in lines {
        let x = line_start_x(start_x, font.text_width(line), alignment);
        font.draw(canvas, x, y, line, color);
        y += font.line_height(line) as i32 + line_spacing;
    }
    y
}

/// Shrink the point size by [`FIT_STEP`] until `text` fits `max_width`.
///
/// Stops at `min_size` and returns that font even if it still overflows.
pub fn fit_by_size_reduction(
    resolver: &FontResolver,
    text: &str,
    font_family: &str,
    initial_size: u32,
    max_width: u32,
    min_size: u32,
) -> FontHandle {
    let mut size = initial_size;
    let mut font = resolver.resolve(font_family, size);

    while font.text_width(text) > max_width && size > min_size {
        size = size.saturating_sub(FIT_STEP).max(min_size);
        font = resolver.resolve(font_family, size);
    }
    font
}
