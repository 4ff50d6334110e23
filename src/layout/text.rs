use crate::text_metrics;
use crate::theme::Theme;

use super::LabelSize;

/// Measures label text in the presentation font.
pub trait LabelSizer {
    fn measure(&self, text: &str) -> LabelSize;
}

/// Measures with the real font face from the system font database.
///
/// Falls back to per-character width estimates when no face resolves for the
/// theme's font family.
#[derive(Debug, Clone)]
pub struct FontSizer {
    font_family: String,
    font_size: f32,
    bold: bool,
}

impl FontSizer {
    pub fn new(theme: &Theme) -> Self {
        Self {
            font_family: theme.font_family.clone(),
            font_size: theme.font_size,
            bold: theme.font_weight == "bold",
        }
    }
}

impl LabelSizer for FontSizer {
    fn measure(&self, text: &str) -> LabelSize {
        if let Some(extent) =
            text_metrics::measure_text(text, self.font_size, &self.font_family, self.bold)
        {
            return LabelSize {
                width: extent.width,
                height: extent.height,
            };
        }
        LabelSize {
            width: estimate_width(text, self.font_size),
            height: self.font_size * 1.15,
        }
    }
}

/// Monospace stand-in: every character is `char_width` wide.
#[derive(Debug, Clone, Copy)]
pub struct FixedWidthSizer {
    pub char_width: f32,
    pub line_height: f32,
}

impl Default for FixedWidthSizer {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 14.0,
        }
    }
}

impl LabelSizer for FixedWidthSizer {
    fn measure(&self, text: &str) -> LabelSize {
        LabelSize {
            width: self.char_width * text.chars().count() as f32,
            height: self.line_height,
        }
    }
}

pub(crate) fn estimate_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(char_width_factor).sum::<f32>() * font_size
}

pub(super) fn char_width_factor(ch: char) -> f32 {
    // Bold Arial advances in em units.
    match ch {
        ' ' | '.' | ',' | ':' | ';' | '!' | '\'' | '|' => 0.278,
        'i' | 'j' | 'l' => 0.278,
        'f' | 't' | '/' | '\\' | '[' | ']' => 0.333,
        '-' | '(' | ')' | '{' | '}' | 'r' => 0.389,
        'I' => 0.278,
        'J' | 's' | 'c' | 'a' | 'e' | 'k' | 'v' | 'x' | 'y' | 'z' => 0.556,
        '0'..='9' | '_' | '#' | '$' => 0.556,
        'b' | 'd' | 'g' | 'h' | 'n' | 'o' | 'p' | 'q' | 'u' => 0.611,
        'm' => 0.889,
        'w' => 0.778,
        'M' => 0.833,
        'W' => 0.944,
        '@' => 0.975,
        'A'..='Z' => 0.722,
        _ if ch.is_ascii() => 0.584,
        _ => 0.75,
    }
}
