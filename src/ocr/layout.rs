//! Fitting translated text into a line box

use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont};

/// Text measurement at a given pixel size
pub trait TextMeasure {
    /// Advance width of a single-line string
    fn width(&self, text: &str, size: f32) -> f32;

    /// Distance between consecutive baselines
    fn line_height(&self, size: f32) -> f32;
}

impl TextMeasure for FontArc {
    fn width(&self, text: &str, size: f32) -> f32 {
        let scaled = self.as_scaled(PxScale::from(size));
        let mut width = 0.0;
        let mut previous: Option<GlyphId> = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(previous) = previous {
                width += scaled.kern(previous, id);
            }
            width += scaled.h_advance(id);
            previous = Some(id);
        }
        width
    }

    fn line_height(&self, size: f32) -> f32 {
        let scaled = self.as_scaled(PxScale::from(size));
        scaled.height() + scaled.line_gap()
    }
}

/// Text broken into lines at a chosen size
#[derive(Debug, Clone, PartialEq)]
pub struct FittedText {
    pub size: f32,
    pub lines: Vec<String>,
    /// False when even the smallest size overflows the box
    pub fits: bool,
}

/// Greedy word wrap to `max_width` pixels
///
/// A word wider than the box keeps a line of its own.
pub fn wrap_words(text: &str, measure: &impl TextMeasure, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if measure.width(&candidate, size) <= max_width {
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

/// Largest size in `[min_size, max_size]` whose wrapped text fits the box
///
/// Sizes are tried in whole-pixel steps from the top. When nothing fits the
/// smallest size is returned with `fits == false` and the caller clips.
pub fn fit_text(
    text: &str,
    measure: &impl TextMeasure,
    box_width: f32,
    box_height: f32,
    max_size: f32,
    min_size: f32,
) -> FittedText {
    let min_size = min_size.max(1.0);
    let mut size = max_size.max(min_size);

    loop {
        let lines = wrap_words(text, measure, size, box_width);
        let height = measure.line_height(size) * lines.len() as f32;
        let widest = lines.iter().map(|l| measure.width(l, size)).fold(0.0, f32::max);

        if height <= box_height && widest <= box_width {
            return FittedText { size, lines, fits: true };
        }
        if size <= min_size {
            return FittedText { size: min_size, lines, fits: false };
        }
        size = (size - 1.0).max(min_size);
    }
}
