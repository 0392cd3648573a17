use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::content::QuestionKind;
use crate::word_count::WordRange;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("no option selected")]
    EmptyChoice,

    #[error("no matching option selected")]
    EmptyMatching,

    #[error("expected TRUE, FALSE or NOT GIVEN, got {0:?}")]
    InvalidTrueFalseNotGiven(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed answer key: {0}")]
pub struct KeyParseError(pub String);

//
// ─── KEYS ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WritingTask {
    /// Chart description.
    Task1,
    /// Essay.
    Task2,
}

impl WritingTask {
    #[must_use]
    pub fn default_range(self) -> WordRange {
        match self {
            WritingTask::Task1 => WordRange::new(50, 80),
            WritingTask::Task2 => WordRange::new(100, 120),
        }
    }
}

/// Composite answer identifier derived from section, passage or task indices.
///
/// Each skill owns a distinct string prefix, so two different keys never
/// render to the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AnswerKey {
    Listening { section: u32, question: u32 },
    Reading { passage: u32, question: u32 },
    Writing(WritingTask),
    SpeakingPart1(u32),
    SpeakingPart2,
    SpeakingPart3(u32),
}

impl fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerKey::Listening { section, question } => {
                write!(f, "listening_s{section}_q{question}")
            }
            AnswerKey::Reading { passage, question } => write!(f, "reading_p{passage}_q{question}"),
            AnswerKey::Writing(WritingTask::Task1) => f.write_str("writing_task1"),
            AnswerKey::Writing(WritingTask::Task2) => f.write_str("writing_task2"),
            AnswerKey::SpeakingPart1(id) => write!(f, "speaking_part1_{id}"),
            AnswerKey::SpeakingPart2 => f.write_str("speaking_part2"),
            AnswerKey::SpeakingPart3(id) => write!(f, "speaking_part3_{id}"),
        }
    }
}

fn split_indices(rest: &str, outer: char) -> Option<(u32, u32)> {
    let rest = rest.strip_prefix(outer)?;
    let (first, second) = rest.split_once("_q")?;
    Some((first.parse().ok()?, second.parse().ok()?))
}

impl FromStr for AnswerKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || KeyParseError(s.to_owned());
        if let Some(rest) = s.strip_prefix("listening_") {
            let (section, question) = split_indices(rest, 's').ok_or_else(err)?;
            return Ok(AnswerKey::Listening { section, question });
        }
        if let Some(rest) = s.strip_prefix("reading_") {
            let (passage, question) = split_indices(rest, 'p').ok_or_else(err)?;
            return Ok(AnswerKey::Reading { passage, question });
        }
        match s {
            "writing_task1" => return Ok(AnswerKey::Writing(WritingTask::Task1)),
            "writing_task2" => return Ok(AnswerKey::Writing(WritingTask::Task2)),
            "speaking_part2" => return Ok(AnswerKey::SpeakingPart2),
            _ => {}
        }
        if let Some(id) = s.strip_prefix("speaking_part1_") {
            return id.parse().map(AnswerKey::SpeakingPart1).map_err(|_| err());
        }
        if let Some(id) = s.strip_prefix("speaking_part3_") {
            return id.parse().map(AnswerKey::SpeakingPart3).map_err(|_| err());
        }
        Err(err())
    }
}

impl TryFrom<String> for AnswerKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AnswerKey> for String {
    fn from(key: AnswerKey) -> Self {
        key.to_string()
    }
}

//
// ─── VALUES ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrueFalseNotGiven {
    True,
    False,
    NotGiven,
}

impl TrueFalseNotGiven {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TrueFalseNotGiven::True => "TRUE",
            TrueFalseNotGiven::False => "FALSE",
            TrueFalseNotGiven::NotGiven => "NOT GIVEN",
        }
    }
}

impl FromStr for TrueFalseNotGiven {
    type Err = AnswerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" => Ok(TrueFalseNotGiven::True),
            "false" | "f" => Ok(TrueFalseNotGiven::False),
            "not given" | "not_given" | "ng" => Ok(TrueFalseNotGiven::NotGiven),
            _ => Err(AnswerError::InvalidTrueFalseNotGiven(s.to_owned())),
        }
    }
}

/// A single response, tagged by the question shape it answers.
///
/// Serializes to the plain string the grading service expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum AnswerValue {
    /// Option token such as `"B"`.
    Choice(String),
    FreeText(String),
    TrueFalseNotGiven(TrueFalseNotGiven),
    /// Selected heading or paragraph token.
    Matching(String),
}

impl AnswerValue {
    /// Decode raw input for a question of the given kind.
    ///
    /// Choice input may be a full option label (`"B. In the morning"`); only
    /// the token before the first `.` is kept.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` when the input cannot represent an answer of
    /// that kind.
    pub fn decode(kind: QuestionKind, raw: &str) -> Result<Self, AnswerError> {
        match kind {
            QuestionKind::MultipleChoice => {
                let token = raw.split('.').next().unwrap_or_default().trim();
                if token.is_empty() {
                    return Err(AnswerError::EmptyChoice);
                }
                Ok(AnswerValue::Choice(token.to_owned()))
            }
            QuestionKind::TrueFalseNotGiven => raw.parse().map(AnswerValue::TrueFalseNotGiven),
            QuestionKind::Matching => {
                let token = raw.trim();
                if token.is_empty() {
                    return Err(AnswerError::EmptyMatching);
                }
                Ok(AnswerValue::Matching(token.to_owned()))
            }
            QuestionKind::FreeText => Ok(AnswerValue::FreeText(raw.to_owned())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            AnswerValue::Choice(token) | AnswerValue::Matching(token) => token,
            AnswerValue::FreeText(text) => text,
            AnswerValue::TrueFalseNotGiven(v) => v.as_str(),
        }
    }

    /// Free text counts as answered only when it has non-whitespace content.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

impl From<AnswerValue> for String {
    fn from(value: AnswerValue) -> Self {
        match value {
            AnswerValue::Choice(token) | AnswerValue::Matching(token) => token,
            AnswerValue::FreeText(text) => text,
            AnswerValue::TrueFalseNotGiven(v) => v.as_str().to_owned(),
        }
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Complete answer mapping captured at submission time, in entry order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnswerSnapshot(IndexMap<AnswerKey, AnswerValue>);

impl AnswerSnapshot {
    #[must_use]
    pub fn new(entries: IndexMap<AnswerKey, AnswerValue>) -> Self {
        Self(entries)
    }

    #[must_use]
    pub fn get(&self, key: &AnswerKey) -> Option<&AnswerValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AnswerKey, &AnswerValue)> {
        self.0.iter()
    }

    #[must_use]
    pub fn into_inner(self) -> IndexMap<AnswerKey, AnswerValue> {
        self.0
    }
}
