//! In-process stand-in for the exam service, for tests and offline demos.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use exam_core::Clock;
use exam_core::model::{
    AnswerKey, AnswerSnapshot, ChartTask, CueCard, EssayTask, FinalResults, Level,
    ListeningContent, ListeningSection, PhaseContent, PhaseNumber, PhaseOrdering, Question,
    QuestionKind, ReadingContent, ReadingPassage, SessionId, SessionRecord, SessionStatus,
    SpeakingContent, SpeakingQuestion, WritingContent, WritingTask,
};
use reqwest::StatusCode;
use serde_json::json;

use crate::api::{ApiError, ApiOperation, ExamApi};

#[derive(Default)]
struct Inner {
    clock: Clock,
    next_id: u64,
    sessions: HashMap<SessionId, SessionRecord>,
    calls: HashMap<ApiOperation, usize>,
    failures: HashMap<ApiOperation, usize>,
    withheld: HashSet<PhaseNumber>,
    submissions: Vec<(SessionId, PhaseNumber, AnswerSnapshot)>,
}

/// In-memory exam service with call accounting and failure injection.
///
/// Every call yields to the scheduler once before touching state, so callers
/// observe a suspension point as they would with a real network round trip.
#[derive(Clone, Default)]
pub struct InMemoryExamApi {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryExamApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(self, clock: Clock) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.clock = clock;
        }
        self
    }

    /// Make the next `times` calls of `op` fail with a server error.
    pub fn fail_next(&self, op: ApiOperation, times: usize) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner.failures.entry(op).or_default() += times;
        }
    }

    /// Generation for `phase` will report success but leave the content empty.
    pub fn withhold_content(&self, phase: PhaseNumber) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.withheld.insert(phase);
        }
    }

    /// Number of times `op` was invoked, including failed attempts.
    #[must_use]
    pub fn calls(&self, op: ApiOperation) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Answer snapshots accepted so far, in arrival order.
    #[must_use]
    pub fn submissions(&self) -> Vec<(SessionId, PhaseNumber, AnswerSnapshot)> {
        self.inner
            .lock()
            .map(|inner| inner.submissions.clone())
            .unwrap_or_default()
    }

    async fn begin(&self, op: ApiOperation) -> Result<MutexGuard<'_, Inner>, ApiError> {
        tokio::task::yield_now().await;
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| ApiError::Backend(e.to_string()))?;
        *inner.calls.entry(op).or_default() += 1;
        if let Some(remaining) = inner.failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ApiError::Status {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    detail: format!("injected failure for {op:?}"),
                });
            }
        }
        Ok(inner)
    }
}

fn bad_request(detail: &str) -> ApiError {
    ApiError::Status {
        status: StatusCode::BAD_REQUEST,
        detail: detail.to_owned(),
    }
}

fn session_mut(inner: &mut Inner, id: SessionId) -> Result<&mut SessionRecord, ApiError> {
    inner.sessions.get_mut(&id).ok_or(ApiError::NotFound)
}

#[async_trait]
impl ExamApi for InMemoryExamApi {
    async fn create_session(&self, level: Level) -> Result<SessionRecord, ApiError> {
        let mut inner = self.begin(ApiOperation::CreateSession).await?;
        inner.next_id += 1;
        let id = SessionId::new(inner.next_id);
        let record = SessionRecord {
            id,
            level,
            selected_phase: None,
            status: SessionStatus::Initialized,
            phase1_content: None,
            phase2_content: None,
            phase1_scores: None,
            phase2_scores: None,
            final_results: None,
            created_at: inner.clock.now(),
            updated_at: None,
        };
        inner.sessions.insert(id, record.clone());
        Ok(record)
    }

    async fn select_phase(
        &self,
        id: SessionId,
        ordering: PhaseOrdering,
    ) -> Result<SessionRecord, ApiError> {
        let mut inner = self.begin(ApiOperation::SelectPhase).await?;
        let now = inner.clock.now();
        let record = session_mut(&mut inner, id)?;
        if record.status != SessionStatus::Initialized {
            return Err(bad_request("Phase already selected"));
        }
        record.selected_phase = Some(ordering);
        record.status = SessionStatus::Phase1Selected;
        record.updated_at = Some(now);
        Ok(record.clone())
    }

    async fn generate_phase(
        &self,
        id: SessionId,
        phase: PhaseNumber,
    ) -> Result<SessionRecord, ApiError> {
        let mut inner = self.begin(ApiOperation::Generate(phase)).await?;
        let now = inner.clock.now();
        let withheld = inner.withheld.contains(&phase);
        let record = session_mut(&mut inner, id)?;
        let ordering = record
            .selected_phase
            .ok_or_else(|| bad_request("Please select a phase first"))?;
        if record.content_for(phase).is_some() {
            return Ok(record.clone());
        }
        if phase == PhaseNumber::Two && record.status != SessionStatus::Phase1Completed {
            return Err(bad_request("Please complete phase 1 first"));
        }
        if !withheld {
            let content = sample_content(ordering.pair_for(phase));
            match phase {
                PhaseNumber::One => {
                    record.phase1_content = Some(content);
                    record.status = SessionStatus::Phase1Generated;
                }
                PhaseNumber::Two => {
                    record.phase2_content = Some(content);
                    record.status = SessionStatus::Phase2Generated;
                }
            }
        }
        record.updated_at = Some(now);
        Ok(record.clone())
    }

    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, ApiError> {
        let mut inner = self.begin(ApiOperation::GetSession).await?;
        session_mut(&mut inner, id).map(|record| record.clone())
    }

    async fn submit_answers(
        &self,
        id: SessionId,
        phase: PhaseNumber,
        answers: &AnswerSnapshot,
    ) -> Result<SessionRecord, ApiError> {
        let mut inner = self.begin(ApiOperation::Submit(phase)).await?;
        let now = inner.clock.now();
        let record = session_mut(&mut inner, id)?;
        let Some(content) = record.content_for(phase) else {
            return Err(bad_request(&format!(
                "Phase {phase} content not generated"
            )));
        };
        let scores = score_phase(content, answers);
        match phase {
            PhaseNumber::One => {
                record.phase1_scores = Some(scores);
                record.status = SessionStatus::Phase1Completed;
            }
            PhaseNumber::Two => {
                record.phase2_scores = Some(scores);
                record.status = SessionStatus::Phase2Completed;
            }
        }
        record.updated_at = Some(now);
        let updated = record.clone();
        inner.submissions.push((id, phase, answers.clone()));
        Ok(updated)
    }

    async fn aggregate_results(&self, id: SessionId) -> Result<SessionRecord, ApiError> {
        let mut inner = self.begin(ApiOperation::Aggregate).await?;
        let now = inner.clock.now();
        let record = session_mut(&mut inner, id)?;
        if record.final_results.is_some() {
            return Ok(record.clone());
        }
        if record.status != SessionStatus::Phase2Completed {
            return Err(bad_request("Please complete both phases first"));
        }

        let band = |skill: &str, field: &str| {
            [&record.phase1_scores, &record.phase2_scores]
                .into_iter()
                .flatten()
                .find_map(|scores| scores.get(skill)?.get(field)?.as_f64())
                .unwrap_or(0.0)
        };
        let listening = band("listening", "band");
        let reading = band("reading", "band");
        let writing = band("writing", "overall_band");
        let speaking = band("speaking", "overall_band");

        record.final_results = Some(FinalResults {
            overall: FinalResults::mean_band(listening, reading, writing, speaking),
            listening,
            reading,
            writing,
            speaking,
            detailed_analysis: Some(json!({ "ielts_analysis": {}, "beyond_ielts": {} })),
        });
        record.status = SessionStatus::Completed;
        record.updated_at = Some(now);
        Ok(record.clone())
    }

    async fn generate_analysis(&self, id: SessionId) -> Result<SessionRecord, ApiError> {
        let mut inner = self.begin(ApiOperation::GenerateAnalysis).await?;
        let record = session_mut(&mut inner, id)?;
        let Some(results) = record.final_results.as_mut() else {
            return Err(bad_request("Please aggregate results first"));
        };
        if results.detailed_analysis.is_none() {
            results.detailed_analysis = Some(json!({ "ielts_analysis": {}, "beyond_ielts": {} }));
        }
        Ok(record.clone())
    }
}

//
// ─── FAKE GRADING ──────────────────────────────────────────────────────────────
//

/// Objective skills are marked against `correct_answer`; subjective skills get
/// a flat band when anything was written.
fn score_phase(content: &PhaseContent, answers: &AnswerSnapshot) -> serde_json::Value {
    let mut scores = serde_json::Map::new();

    let objective = |questions: Vec<(AnswerKey, &Question)>| {
        let total = questions.len();
        let raw = questions
            .iter()
            .filter(|(key, q)| {
                let given = answers.get(key).map(|v| v.as_str().trim().to_ascii_lowercase());
                let expected = q.correct_answer.as_deref().map(|a| a.trim().to_ascii_lowercase());
                given.is_some() && given == expected
            })
            .count();
        let band = if total == 0 {
            0.0
        } else {
            (raw as f64 / total as f64 * 9.0 * 2.0).round() / 2.0
        };
        json!({ "raw_score": raw, "total_questions": total, "band": band })
    };

    if let Some(listening) = &content.listening {
        let questions = listening
            .sections
            .iter()
            .flat_map(|s| {
                s.questions.iter().map(|q| {
                    (
                        AnswerKey::Listening {
                            section: s.id,
                            question: q.id,
                        },
                        q,
                    )
                })
            })
            .collect();
        scores.insert("listening".into(), objective(questions));
    }
    if let Some(reading) = &content.reading {
        let questions = reading
            .passages
            .iter()
            .flat_map(|p| {
                p.questions.iter().map(|q| {
                    (
                        AnswerKey::Reading {
                            passage: p.id,
                            question: q.id,
                        },
                        q,
                    )
                })
            })
            .collect();
        scores.insert("reading".into(), objective(questions));
    }

    let written = |prefix: &str| {
        answers
            .iter()
            .any(|(key, value)| key.to_string().starts_with(prefix) && !value.is_blank())
    };
    if content.writing.is_some() {
        let band = if written("writing_") { 5.0 } else { 0.0 };
        scores.insert("writing".into(), json!({ "overall_band": band }));
    }
    if content.speaking.is_some() {
        let band = if written("speaking_") { 5.0 } else { 0.0 };
        scores.insert("speaking".into(), json!({ "overall_band": band }));
    }

    serde_json::Value::Object(scores)
}

//
// ─── SAMPLE CONTENT ────────────────────────────────────────────────────────────
//

fn question(id: u32, kind: &str, text: &str, options: &[&str], answer: &str) -> Question {
    Question {
        id,
        kind: QuestionKind::from(kind.to_owned()),
        question: text.to_owned(),
        options: options.iter().map(|o| (*o).to_owned()).collect(),
        correct_answer: Some(answer.to_owned()),
    }
}

/// Small fixed test covering the two skills of `pair`.
#[must_use]
pub fn sample_content(pair: PhaseOrdering) -> PhaseContent {
    match pair {
        PhaseOrdering::ListeningSpeaking => PhaseContent {
            listening: Some(ListeningContent {
                sections: vec![
                    ListeningSection {
                        id: 1,
                        title: "Booking a room".into(),
                        instructions: "Answer questions 1-2.".into(),
                        audio_transcript: Some(
                            "Good morning, I'd like to book a double room for Friday.".into(),
                        ),
                        questions: vec![
                            question(
                                1,
                                "multiple_choice",
                                "Which day is the booking for?",
                                &["A. Thursday", "B. Friday", "C. Saturday"],
                                "B",
                            ),
                            question(2, "fill_blank", "Room type: ____ room", &[], "double"),
                        ],
                    },
                    ListeningSection {
                        id: 2,
                        title: "Campus tour".into(),
                        instructions: "Answer question 1.".into(),
                        audio_transcript: Some(
                            "The library opens at eight and closes at ten.".into(),
                        ),
                        questions: vec![question(
                            1,
                            "short_answer",
                            "When does the library open?",
                            &[],
                            "eight",
                        )],
                    },
                ],
            }),
            speaking: Some(SpeakingContent {
                part1: vec![
                    SpeakingQuestion {
                        id: 1,
                        question: "Where is your hometown?".into(),
                    },
                    SpeakingQuestion {
                        id: 2,
                        question: "Do you work or study?".into(),
                    },
                ],
                part2: Some(CueCard {
                    topic: "Describe a journey you enjoyed".into(),
                    task_card: "Say where you went, who with, and why you enjoyed it.".into(),
                }),
                part3: vec![SpeakingQuestion {
                    id: 1,
                    question: "Why do people travel more today?".into(),
                }],
            }),
            ..PhaseContent::default()
        },
        PhaseOrdering::ReadingWriting => PhaseContent {
            reading: Some(ReadingContent {
                passages: vec![ReadingPassage {
                    id: 1,
                    title: "Urban cycling".into(),
                    content: "Cycling to work has doubled in the last decade.".into(),
                    questions: vec![
                        question(
                            1,
                            "multiple_choice",
                            "What has doubled?",
                            &["A. Cycling to work", "B. Car ownership"],
                            "A",
                        ),
                        question(2, "tf_ng", "Cycling has tripled.", &[], "FALSE"),
                        question(3, "matching_headings", "Heading for paragraph A", &[], "iii"),
                    ],
                }],
            }),
            writing: Some(WritingContent {
                task1: Some(ChartTask {
                    instructions: None,
                    chart_description: Some(
                        "Bar chart: commuters by mode, 2010 vs 2020.".into(),
                    ),
                    word_limit: Some(WritingTask::Task1.default_range().min),
                }),
                task2: Some(EssayTask {
                    question: "Should cities ban cars from their centres?".into(),
                    word_limit: Some(WritingTask::Task2.default_range().min),
                }),
            }),
            ..PhaseContent::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::AnswerValue;
    use exam_core::time::fixed_clock;

    fn snapshot(entries: &[(&str, &str)]) -> AnswerSnapshot {
        AnswerSnapshot::new(
            entries
                .iter()
                .map(|(k, v)| (k.parse().unwrap(), AnswerValue::FreeText((*v).to_owned())))
                .collect(),
        )
    }

    #[tokio::test]
    async fn enforces_lifecycle_order() {
        let api = InMemoryExamApi::new().with_clock(fixed_clock());
        let session = api.create_session(Level::Intermediate).await.unwrap();

        let err = api
            .generate_phase(session.id, PhaseNumber::One)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { .. }));

        api.select_phase(session.id, PhaseOrdering::ReadingWriting)
            .await
            .unwrap();
        let err = api
            .generate_phase(session.id, PhaseNumber::Two)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { .. }));

        let record = api
            .generate_phase(session.id, PhaseNumber::One)
            .await
            .unwrap();
        assert!(record.phase1_content.as_ref().unwrap().reading.is_some());
        assert_eq!(record.status, SessionStatus::Phase1Generated);
    }

    #[tokio::test]
    async fn aggregates_mean_of_four_bands() {
        let api = InMemoryExamApi::new();
        let id = api.create_session(Level::Advanced).await.unwrap().id;
        api.select_phase(id, PhaseOrdering::ReadingWriting).await.unwrap();
        api.generate_phase(id, PhaseNumber::One).await.unwrap();
        api.submit_answers(
            id,
            PhaseNumber::One,
            &snapshot(&[("reading_p1_q1", "A"), ("writing_task2", "Yes.")]),
        )
        .await
        .unwrap();
        api.generate_phase(id, PhaseNumber::Two).await.unwrap();
        api.submit_answers(id, PhaseNumber::Two, &snapshot(&[("speaking_part2", "I went...")]))
            .await
            .unwrap();

        let record = api.aggregate_results(id).await.unwrap();
        let results = record.final_results.unwrap();
        assert_eq!(results.reading, 3.0);
        assert_eq!(results.writing, 5.0);
        assert_eq!(results.speaking, 5.0);
        assert_eq!(results.listening, 0.0);
        assert_eq!(results.overall, 3.3);
        assert_eq!(record.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn injected_failures_are_counted_and_consumed() {
        let api = InMemoryExamApi::new();
        api.fail_next(ApiOperation::CreateSession, 1);

        assert!(api.create_session(Level::Beginner).await.is_err());
        assert!(api.create_session(Level::Beginner).await.is_ok());
        assert_eq!(api.calls(ApiOperation::CreateSession), 2);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let api = InMemoryExamApi::new();
        let err = api.get_session(SessionId::new(99)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }
}
