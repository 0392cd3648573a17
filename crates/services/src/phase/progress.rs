use exam_core::model::PhaseContent;

use crate::answers::AnswerStore;

/// Answered versus expected responses for the loaded phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

impl PhaseProgress {
    /// Count every answer slot in `content` holding a non-blank response.
    #[must_use]
    pub fn measure(content: &PhaseContent, answers: &AnswerStore) -> Self {
        let slots = content.answer_slots();
        let total = slots.len();
        let answered = slots
            .iter()
            .filter(|(key, _)| answers.is_answered(key))
            .count();
        Self {
            total,
            answered,
            remaining: total - answered,
            is_complete: answered == total,
        }
    }
}
