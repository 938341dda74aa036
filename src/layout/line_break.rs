//! Line breaking algorithm

use crate::layout::font::FontMetrics;
use std::ops::Range;
use unicode_linebreak::{linebreaks, BreakOpportunity};
use unicode_segmentation::UnicodeSegmentation;

/// Greedy line breaker over UAX #14 break opportunities
#[derive(Debug, Default, Clone, Copy)]
pub struct LineBreaker;

impl LineBreaker {
    pub fn new() -> Self {
        Self
    }

    /// Break a paragraph into byte ranges that each fit within `max_width`.
    ///
    /// Ranges may carry trailing whitespace at soft breaks; mandatory line
    /// terminators are excluded. An empty paragraph still yields one line.
    pub fn break_lines(&self, text: &str, max_width: f32, metrics: &FontMetrics) -> Vec<Range<usize>> {
        if text.is_empty() {
            return vec![0..0];
        }

        let mut lines = Vec::new();
        let mut line_start: usize = 0;
        let mut line_width: f32 = 0.0;
        let mut segment_start: usize = 0;

        for (offset, opportunity) in linebreaks(text) {
            let segment = &text[segment_start..offset];
            let visible = metrics.measure(segment.trim_end());

            // Soft wrap before this segment
            if line_start < segment_start && line_width + visible > max_width {
                lines.push(line_start..segment_start);
                line_start = segment_start;
                line_width = 0.0;
            }

            if visible > max_width {
                // Emergency breaks between graphemes
                for (idx, grapheme) in segment.grapheme_indices(true) {
                    let width = metrics.measure(grapheme);
                    let at = segment_start + idx;
                    let is_space = grapheme.trim().is_empty();
                    if !is_space && line_start < at && line_width + width > max_width {
                        lines.push(line_start..at);
                        line_start = at;
                        line_width = 0.0;
                    }
                    line_width += width;
                }
            } else {
                line_width += metrics.measure(segment);
            }

            if opportunity == BreakOpportunity::Mandatory {
                let line = &text[line_start..offset];
                let end = line_start + line.trim_end_matches(['\n', '\r']).len();
                lines.push(line_start..end);
                line_start = offset;
                line_width = 0.0;
            }

            segment_start = offset;
        }

        if lines.is_empty() {
            lines.push(0..0);
        }
        lines
    }
}
