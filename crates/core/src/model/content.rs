use serde::{Deserialize, Serialize};

use crate::model::answer::{AnswerKey, WritingTask};
use crate::model::ordering::Skill;
use crate::word_count::WordRange;

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

/// Response shape expected by a question.
///
/// Generated content uses several spellings for the same shape; they are
/// folded together here so the answer decoder only sees four cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalseNotGiven,
    Matching,
    FreeText,
}

impl From<String> for QuestionKind {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "multiple_choice" => QuestionKind::MultipleChoice,
            "tf_ng" | "true_false_not_given" => QuestionKind::TrueFalseNotGiven,
            "matching" | "matching_headings" => QuestionKind::Matching,
            _ => QuestionKind::FreeText,
        }
    }
}

impl From<QuestionKind> for String {
    fn from(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::TrueFalseNotGiven => "tf_ng",
            QuestionKind::Matching => "matching",
            QuestionKind::FreeText => "short_answer",
        }
        .to_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

//
// ─── SKILL SECTIONS ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningSection {
    pub id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub audio_transcript: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl ListeningSection {
    /// Transcript to narrate, if the section carries a non-blank one.
    #[must_use]
    pub fn transcript(&self) -> Option<&str> {
        self.audio_transcript
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningContent {
    #[serde(default)]
    pub sections: Vec<ListeningSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPassage {
    pub id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingContent {
    #[serde(default)]
    pub passages: Vec<ReadingPassage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartTask {
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub chart_description: Option<String>,
    #[serde(default)]
    pub word_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssayTask {
    pub question: String,
    #[serde(default)]
    pub word_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingContent {
    #[serde(default)]
    pub task1: Option<ChartTask>,
    #[serde(default)]
    pub task2: Option<EssayTask>,
}

impl WritingContent {
    /// Word target for `task`, honouring a content-supplied minimum.
    #[must_use]
    pub fn range_for(&self, task: WritingTask) -> WordRange {
        let limit = match task {
            WritingTask::Task1 => self.task1.as_ref().and_then(|t| t.word_limit),
            WritingTask::Task2 => self.task2.as_ref().and_then(|t| t.word_limit),
        };
        let range = task.default_range();
        match limit {
            Some(min) if min > 0 => range.with_minimum(min),
            _ => range,
        }
    }

    #[must_use]
    pub fn has_task(&self, task: WritingTask) -> bool {
        match task {
            WritingTask::Task1 => self.task1.is_some(),
            WritingTask::Task2 => self.task2.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakingQuestion {
    pub id: u32,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueCard {
    pub topic: String,
    #[serde(default)]
    pub task_card: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakingContent {
    #[serde(default)]
    pub part1: Vec<SpeakingQuestion>,
    #[serde(default)]
    pub part2: Option<CueCard>,
    #[serde(default)]
    pub part3: Vec<SpeakingQuestion>,
}

//
// ─── PHASE CONTENT ─────────────────────────────────────────────────────────────
//

/// Generated material for one phase. Only the two skills of the phase's pair
/// are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listening: Option<ListeningContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<ReadingContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writing: Option<WritingContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaking: Option<SpeakingContent>,
}

impl PhaseContent {
    #[must_use]
    pub fn has_skill(&self, skill: Skill) -> bool {
        match skill {
            Skill::Listening => self.listening.is_some(),
            Skill::Reading => self.reading.is_some(),
            Skill::Writing => self.writing.is_some(),
            Skill::Speaking => self.speaking.is_some(),
        }
    }

    #[must_use]
    pub fn listening_section(&self, section_id: u32) -> Option<&ListeningSection> {
        self.listening
            .as_ref()?
            .sections
            .iter()
            .find(|section| section.id == section_id)
    }

    /// Every answer slot this content exposes, in presentation order.
    #[must_use]
    pub fn answer_slots(&self) -> Vec<(AnswerKey, QuestionKind)> {
        let mut slots = Vec::new();

        if let Some(listening) = &self.listening {
            for section in &listening.sections {
                for q in &section.questions {
                    slots.push((
                        AnswerKey::Listening {
                            section: section.id,
                            question: q.id,
                        },
                        q.kind,
                    ));
                }
            }
        }

        if let Some(reading) = &self.reading {
            for passage in &reading.passages {
                for q in &passage.questions {
                    slots.push((
                        AnswerKey::Reading {
                            passage: passage.id,
                            question: q.id,
                        },
                        q.kind,
                    ));
                }
            }
        }

        if let Some(speaking) = &self.speaking {
            for q in &speaking.part1 {
                slots.push((AnswerKey::SpeakingPart1(q.id), QuestionKind::FreeText));
            }
            if speaking.part2.is_some() {
                slots.push((AnswerKey::SpeakingPart2, QuestionKind::FreeText));
            }
            for q in &speaking.part3 {
                slots.push((AnswerKey::SpeakingPart3(q.id), QuestionKind::FreeText));
            }
        }

        if let Some(writing) = &self.writing {
            for task in [WritingTask::Task1, WritingTask::Task2] {
                if writing.has_task(task) {
                    slots.push((AnswerKey::Writing(task), QuestionKind::FreeText));
                }
            }
        }

        slots
    }

    /// Expected response shape for `key`, if the content has such a slot.
    #[must_use]
    pub fn kind_of(&self, key: &AnswerKey) -> Option<QuestionKind> {
        self.answer_slots()
            .into_iter()
            .find(|(slot, _)| slot == key)
            .map(|(_, kind)| kind)
    }
}
