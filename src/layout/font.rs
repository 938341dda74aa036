//! Font metrics for layout

/// Line height as a multiple of the font size
const LINE_HEIGHT_RATIO: f32 = 1.2;

/// Average advance of a Latin glyph as a multiple of the font size
const ADVANCE_RATIO: f32 = 0.5;

/// Metrics needed for text layout
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    /// Font size the metrics were derived for
    pub font_size: f32,
    /// Line height in logical pixels
    pub line_height: f32,
    /// Width of ASCII characters (0-127)
    pub char_widths: Vec<f32>,
    /// Default width for non-ASCII characters
    pub default_width: f32,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self::for_size(16.0)
    }
}

impl FontMetrics {
    pub fn new(line_height: f32, char_widths: Vec<f32>, default_width: f32) -> Self {
        Self {
            font_size: line_height / LINE_HEIGHT_RATIO,
            line_height,
            char_widths,
            default_width,
        }
    }

    /// Proportional metrics scaled to a font size
    pub fn for_size(font_size: f32) -> Self {
        let advance = font_size * ADVANCE_RATIO;
        let char_widths = (0u8..128)
            .map(|b| match b {
                b' ' | b'i' | b'l' | b'j' | b'.' | b',' | b'\'' | b'!' | b':' | b';' => {
                    advance * 0.5
                }
                b'm' | b'w' | b'M' | b'W' => advance * 1.5,
                b'A'..=b'Z' => advance * 1.2,
                _ => advance,
            })
            .collect();

        Self {
            font_size,
            line_height: font_size * LINE_HEIGHT_RATIO,
            char_widths,
            // Wide scripts take a full em
            default_width: font_size,
        }
    }

    /// Get width of a character
    pub fn width(&self, c: char) -> f32 {
        if c.is_ascii() {
            if c.is_ascii_control() {
                return 0.0;
            }
            if let Some(w) = self.char_widths.get(c as usize) {
                return *w;
            }
        }
        self.default_width
    }

    /// Width of a run of text
    pub fn measure(&self, text: &str) -> f32 {
        text.chars().map(|c| self.width(c)).sum()
    }

    /// Metrics for a scaled variant of this font (headings)
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            font_size: self.font_size * factor,
            line_height: self.line_height * factor,
            char_widths: self.char_widths.iter().map(|w| w * factor).collect(),
            default_width: self.default_width * factor,
        }
    }
}
