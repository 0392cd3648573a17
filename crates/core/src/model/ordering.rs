use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown phase ordering: {0}")]
pub struct OrderingParseError(pub String);

/// One of the four assessed skill areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Listening,
    Reading,
    Writing,
    Speaking,
}

/// Which of the two timed phases is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PhaseNumber {
    One,
    Two,
}

impl PhaseNumber {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            PhaseNumber::One => 1,
            PhaseNumber::Two => 2,
        }
    }

    /// The phase that follows this one, if any.
    #[must_use]
    pub fn next(self) -> Option<PhaseNumber> {
        match self {
            PhaseNumber::One => Some(PhaseNumber::Two),
            PhaseNumber::Two => None,
        }
    }

    #[must_use]
    pub fn from_u8(value: u8) -> Option<PhaseNumber> {
        match value {
            1 => Some(PhaseNumber::One),
            2 => Some(PhaseNumber::Two),
            _ => None,
        }
    }
}

impl fmt::Display for PhaseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Skill pair the test-taker chose to sit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOrdering {
    ListeningSpeaking,
    ReadingWriting,
}

impl PhaseOrdering {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseOrdering::ListeningSpeaking => "listening_speaking",
            PhaseOrdering::ReadingWriting => "reading_writing",
        }
    }

    #[must_use]
    pub fn other(self) -> PhaseOrdering {
        match self {
            PhaseOrdering::ListeningSpeaking => PhaseOrdering::ReadingWriting,
            PhaseOrdering::ReadingWriting => PhaseOrdering::ListeningSpeaking,
        }
    }

    /// Skill pair sat during `phase`. Phase 2 always covers the pair not
    /// chosen for phase 1.
    #[must_use]
    pub fn pair_for(self, phase: PhaseNumber) -> PhaseOrdering {
        match phase {
            PhaseNumber::One => self,
            PhaseNumber::Two => self.other(),
        }
    }

    #[must_use]
    pub fn skills_for(self, phase: PhaseNumber) -> [Skill; 2] {
        self.pair_for(phase).skills()
    }

    #[must_use]
    pub fn skills(self) -> [Skill; 2] {
        match self {
            PhaseOrdering::ListeningSpeaking => [Skill::Listening, Skill::Speaking],
            PhaseOrdering::ReadingWriting => [Skill::Reading, Skill::Writing],
        }
    }
}

impl fmt::Display for PhaseOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseOrdering {
    type Err = OrderingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "listening_speaking" => Ok(PhaseOrdering::ListeningSpeaking),
            "reading_writing" => Ok(PhaseOrdering::ReadingWriting),
            other => Err(OrderingParseError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_two_covers_the_other_pair() {
        let ordering = PhaseOrdering::ReadingWriting;
        assert_eq!(
            ordering.skills_for(PhaseNumber::One),
            [Skill::Reading, Skill::Writing]
        );
        assert_eq!(
            ordering.skills_for(PhaseNumber::Two),
            [Skill::Listening, Skill::Speaking]
        );
    }

    #[test]
    fn phase_numbers_step_forward_once() {
        assert_eq!(PhaseNumber::One.next(), Some(PhaseNumber::Two));
        assert_eq!(PhaseNumber::Two.next(), None);
        assert_eq!(PhaseNumber::from_u8(3), None);
    }
}
