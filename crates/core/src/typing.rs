use std::time::Duration;

use unicode_segmentation::UnicodeSegmentation;

pub const DEFAULT_CHAR_DELAY: Duration = Duration::from_millis(50);

const INDICATOR_PER_CHAR: Duration = Duration::from_millis(15);
const INDICATOR_MIN: Duration = Duration::from_millis(800);
const INDICATOR_MAX: Duration = Duration::from_millis(3000);

/// Type-on reveal of a reply, one grapheme cluster per tick.
#[derive(Debug, Clone)]
pub struct TypingAnimation {
    text: String,
    boundaries: Vec<usize>,
    delay: Duration,
}

impl TypingAnimation {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_delay(text, DEFAULT_CHAR_DELAY)
    }

    pub fn with_delay(text: impl Into<String>, delay: Duration) -> Self {
        let text = text.into();
        let boundaries = text
            .grapheme_indices(true)
            .map(|(offset, grapheme)| offset + grapheme.len())
            .collect();
        Self {
            text,
            boundaries,
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Text visible after `tick` ticks.
    pub fn frame(&self, tick: usize) -> &str {
        match tick.min(self.boundaries.len()) {
            0 => "",
            visible => &self.text[..self.boundaries[visible - 1]],
        }
    }

    /// The growing prefixes, ending with the full text.
    pub fn frames(&self) -> impl Iterator<Item = &str> + '_ {
        (1..=self.boundaries.len()).map(move |tick| self.frame(tick))
    }

    /// The grapheme appended at each tick.
    pub fn increments(&self) -> impl Iterator<Item = &str> + '_ {
        self.text.graphemes(true)
    }
}

/// How long the embed surface shows its typing indicator for a reply.
pub fn typing_duration(text: &str) -> Duration {
    let chars = text.chars().count() as u32;
    (INDICATOR_PER_CHAR * chars).clamp(INDICATOR_MIN, INDICATOR_MAX)
}
