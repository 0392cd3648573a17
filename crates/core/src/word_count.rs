//! Word counting and target-range classification for long-form responses.

/// Classification of a word count against an inclusive target range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordCountStatus {
    /// Nothing written yet.
    Unwritten,
    /// Some text, but fewer words than the minimum.
    BelowMinimum { deficit: usize },
    /// More words than the maximum.
    AboveMaximum { excess: usize },
    /// Count lies in `min..=max`.
    WithinRange,
}

/// Inclusive word target for a writing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordRange {
    pub min: usize,
    pub max: usize,
}

impl WordRange {
    #[must_use]
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Replace the minimum with a content-supplied word limit.
    ///
    /// The maximum never drops below the new minimum.
    #[must_use]
    pub fn with_minimum(self, min: usize) -> Self {
        Self {
            min,
            max: self.max.max(min),
        }
    }

    #[must_use]
    pub fn classify(&self, text: &str) -> WordCountStatus {
        status(count(text), self.min, self.max)
    }
}

/// Number of whitespace-delimited tokens in `text`.
#[must_use]
pub fn count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Classify `count` against the inclusive range `min..=max`.
#[must_use]
pub fn status(count: usize, min: usize, max: usize) -> WordCountStatus {
    if count == 0 {
        WordCountStatus::Unwritten
    } else if count < min {
        WordCountStatus::BelowMinimum {
            deficit: min - count,
        }
    } else if count > max {
        WordCountStatus::AboveMaximum {
            excess: count - max,
        }
    } else {
        WordCountStatus::WithinRange
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_whitespace_tokens() {
        assert_eq!(count(""), 0);
        assert_eq!(count("   "), 0);
        assert_eq!(count("a b  c"), 3);
        assert_eq!(count("\tThe chart\nshows  growth. "), 4);
    }

    #[test]
    fn boundaries_are_within_range() {
        assert_eq!(status(50, 50, 80), WordCountStatus::WithinRange);
        assert_eq!(status(80, 50, 80), WordCountStatus::WithinRange);
    }

    #[test]
    fn reports_deficit_and_excess() {
        assert_eq!(
            status(49, 50, 80),
            WordCountStatus::BelowMinimum { deficit: 1 }
        );
        assert_eq!(status(81, 50, 80), WordCountStatus::AboveMaximum { excess: 1 });
        assert_eq!(status(0, 50, 80), WordCountStatus::Unwritten);
    }

    #[test]
    fn minimum_override_keeps_range_ordered() {
        let range = WordRange::new(100, 120).with_minimum(150);
        assert_eq!(range, WordRange::new(150, 150));
        assert_eq!(WordRange::new(50, 80).with_minimum(60), WordRange::new(60, 80));
    }
}
