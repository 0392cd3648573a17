use indexmap::IndexMap;

use exam_core::model::{AnswerError, AnswerKey, AnswerSnapshot, AnswerValue, QuestionKind};

/// Responses collected during the active phase, in first-entry order.
///
/// Each key has exactly one writer (its input control), so plain
/// last-write-wins is enough. Shape checks happen in [`AnswerStore::record`];
/// [`AnswerStore::set`] stores whatever it is given.
#[derive(Debug, Clone, Default)]
pub struct AnswerStore {
    entries: IndexMap<AnswerKey, AnswerValue>,
}

impl AnswerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `key`.
    pub fn set(&mut self, key: AnswerKey, value: AnswerValue) {
        self.entries.insert(key, value);
    }

    /// Decode `raw` for a question of `kind`, then store it.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` if the input is not a valid answer of that kind;
    /// the previous entry is left untouched.
    pub fn record(&mut self, key: AnswerKey, kind: QuestionKind, raw: &str) -> Result<(), AnswerError> {
        let value = AnswerValue::decode(kind, raw)?;
        self.set(key, value);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &AnswerKey) -> Option<&AnswerValue> {
        self.entries.get(key)
    }

    /// Full mapping, used verbatim as the submission payload.
    #[must_use]
    pub fn snapshot(&self) -> AnswerSnapshot {
        AnswerSnapshot::new(self.entries.clone())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` holds a non-blank answer.
    #[must_use]
    pub fn is_answered(&self, key: &AnswerKey) -> bool {
        self.entries.get(key).is_some_and(|value| !value.is_blank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::WritingTask;

    fn reading(question: u32) -> AnswerKey {
        AnswerKey::Reading {
            passage: 1,
            question,
        }
    }

    #[test]
    fn last_write_wins() {
        let mut store = AnswerStore::new();
        store.set(reading(1), AnswerValue::Choice("A".into()));
        store.set(reading(1), AnswerValue::Choice("C".into()));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.get(&reading(1)), Some(&AnswerValue::Choice("C".into())));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn snapshot_keeps_every_key_in_entry_order() {
        let mut store = AnswerStore::new();
        store.set(AnswerKey::Writing(WritingTask::Task2), AnswerValue::FreeText("Essay".into()));
        store.set(reading(2), AnswerValue::Matching("iv".into()));
        store.set(reading(1), AnswerValue::Choice("B".into()));
        store.set(AnswerKey::Writing(WritingTask::Task2), AnswerValue::FreeText("Essay v2".into()));

        let keys: Vec<String> = store.snapshot().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["writing_task2", "reading_p1_q2", "reading_p1_q1"]);
    }

    #[test]
    fn invalid_input_keeps_previous_entry() {
        let mut store = AnswerStore::new();
        store
            .record(reading(3), QuestionKind::TrueFalseNotGiven, "not given")
            .unwrap();
        assert!(store
            .record(reading(3), QuestionKind::TrueFalseNotGiven, "perhaps")
            .is_err());
        assert_eq!(store.get(&reading(3)).map(AnswerValue::as_str), Some("NOT GIVEN"));
    }

    #[test]
    fn clear_empties_the_store() {
        let mut store = AnswerStore::new();
        store.set(AnswerKey::SpeakingPart2, AnswerValue::FreeText("   ".into()));
        assert!(!store.is_answered(&AnswerKey::SpeakingPart2));
        store.clear();
        assert!(store.is_empty());
    }
}
