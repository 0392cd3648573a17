mod common;

use std::time::Duration;

use exam_core::model::{AnswerKey, Level, PhaseNumber, PhaseOrdering, Skill, WritingTask};
use remote::ApiOperation;
use services::{PhaseError, PhaseState, SubmitOutcome};

use common::{TimedSynth, session};

fn reading(question: u32) -> AnswerKey {
    AnswerKey::Reading {
        passage: 1,
        question,
    }
}

fn listening(section: u32, question: u32) -> AnswerKey {
    AnswerKey::Listening { section, question }
}

fn synth() -> std::sync::Arc<TimedSynth> {
    TimedSynth::new(Duration::from_secs(1))
}

#[tokio::test]
async fn reading_writing_first_runs_both_phases_to_results() {
    let (api, controller) = session(Level::Intermediate, PhaseOrdering::ReadingWriting, synth()).await;
    controller.start().await.unwrap();

    assert_eq!(controller.visible_skills(), Some([Skill::Reading, Skill::Writing]));
    let PhaseState::Ready { phase, content, .. } = controller.state() else {
        panic!("phase 1 should be ready");
    };
    assert_eq!(phase, PhaseNumber::One);
    assert!(content.reading.is_some() && content.writing.is_some());
    assert!(content.listening.is_none() && content.speaking.is_none());

    controller.record_answer(reading(1), "A").unwrap();
    controller
        .record_answer(
            AnswerKey::Writing(WritingTask::Task1),
            "Commuting by bicycle doubled between 2010 and 2020.",
        )
        .unwrap();

    assert_eq!(
        controller.submit().await.unwrap(),
        SubmitOutcome::Advanced(PhaseNumber::Two)
    );
    assert!(controller.snapshot().is_empty());
    assert_eq!(controller.visible_skills(), Some([Skill::Listening, Skill::Speaking]));
    let PhaseState::Ready { phase, content, .. } = controller.state() else {
        panic!("phase 2 should be ready");
    };
    assert_eq!(phase, PhaseNumber::Two);
    assert!(content.listening.is_some() && content.speaking.is_some());

    let submitted = api.submissions();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].1, PhaseNumber::One);
    assert_eq!(submitted[0].2.len(), 2);

    controller.record_answer(listening(1, 1), "B. Friday").unwrap();
    controller
        .record_answer(AnswerKey::SpeakingPart2, "Last summer I took the train to the coast.")
        .unwrap();

    let SubmitOutcome::Completed(results) = controller.submit().await.unwrap() else {
        panic!("phase 2 submit should complete the test");
    };
    assert_eq!(results.reading, 3.0);
    assert_eq!(results.listening, 3.0);
    assert_eq!(results.writing, 5.0);
    assert_eq!(results.speaking, 5.0);
    assert_eq!(results.overall, 4.0);
    assert_eq!(controller.results(), Some(results));
    assert!(matches!(controller.state(), PhaseState::Done { .. }));
}

#[tokio::test]
async fn concurrent_submits_send_one_request() {
    let (api, controller) = session(Level::Advanced, PhaseOrdering::ReadingWriting, synth()).await;
    controller.start().await.unwrap();
    controller.record_answer(reading(2), "not given").unwrap();

    let other = controller.clone();
    let (first, second) = tokio::join!(controller.submit(), other.submit());

    let mut outcomes = vec![first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(|outcome| matches!(outcome, SubmitOutcome::Ignored));
    assert_eq!(
        outcomes,
        vec![SubmitOutcome::Advanced(PhaseNumber::Two), SubmitOutcome::Ignored]
    );
    assert_eq!(api.calls(ApiOperation::Submit(PhaseNumber::One)), 1);
}

#[tokio::test]
async fn failed_submission_keeps_answers_for_retry() {
    let (api, controller) = session(Level::Beginner, PhaseOrdering::ReadingWriting, synth()).await;
    controller.start().await.unwrap();
    controller.record_answer(reading(3), "iii").unwrap();
    api.fail_next(ApiOperation::Submit(PhaseNumber::One), 1);

    let err = controller.submit().await.unwrap_err();
    assert!(matches!(
        err,
        PhaseError::SubmissionFailed {
            phase: PhaseNumber::One,
            ..
        }
    ));
    assert!(matches!(
        controller.state(),
        PhaseState::Ready {
            phase: PhaseNumber::One,
            answers_submitted: false,
            ..
        }
    ));
    assert_eq!(controller.snapshot().len(), 1);

    assert_eq!(
        controller.submit().await.unwrap(),
        SubmitOutcome::Advanced(PhaseNumber::Two)
    );
    assert_eq!(api.submissions()[0].2.len(), 1);
}

#[tokio::test]
async fn aggregation_retry_does_not_resubmit_answers() {
    let (api, controller) =
        session(Level::Intermediate, PhaseOrdering::ListeningSpeaking, synth()).await;
    controller.start().await.unwrap();
    controller.record_answer(listening(2, 1), "eight").unwrap();
    controller.submit().await.unwrap();
    controller.record_answer(reading(1), "B").unwrap();

    api.fail_next(ApiOperation::Aggregate, 1);
    let err = controller.submit().await.unwrap_err();
    assert!(matches!(err, PhaseError::AggregationFailed(_)));
    assert!(matches!(
        controller.state(),
        PhaseState::Ready {
            phase: PhaseNumber::Two,
            answers_submitted: true,
            ..
        }
    ));
    assert!(matches!(
        controller.record_answer(reading(1), "A"),
        Err(PhaseError::InputLocked(_))
    ));

    let outcome = controller.submit().await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Completed(_)));
    assert_eq!(api.calls(ApiOperation::Submit(PhaseNumber::Two)), 1);
    assert_eq!(api.calls(ApiOperation::Aggregate), 2);
}

#[tokio::test]
async fn reloading_a_generated_phase_skips_generation() {
    let (api, controller) = session(Level::Elementary, PhaseOrdering::ReadingWriting, synth()).await;
    controller.start().await.unwrap();
    controller.record_answer(reading(1), "A").unwrap();

    controller.enter_phase(PhaseNumber::One).await.unwrap();

    assert_eq!(api.calls(ApiOperation::Generate(PhaseNumber::One)), 1);
    assert!(controller.snapshot().is_empty());
    assert_eq!(controller.epoch(), 2);
}

#[tokio::test]
async fn superseded_load_is_discarded() {
    let (_api, controller) =
        session(Level::Intermediate, PhaseOrdering::ListeningSpeaking, synth()).await;

    let other = controller.clone();
    let (first, second) = tokio::join!(
        controller.enter_phase(PhaseNumber::One),
        other.enter_phase(PhaseNumber::One)
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(controller.epoch(), 2);
    assert_eq!(controller.state().name(), "ready");
    assert_eq!(controller.progress().unwrap().total, 7);
}

#[tokio::test]
async fn missing_content_leaves_the_phase_unavailable() {
    let (api, controller) = session(Level::Advanced, PhaseOrdering::ReadingWriting, synth()).await;
    api.withhold_content(PhaseNumber::One);

    let err = controller.start().await.unwrap_err();
    assert!(matches!(
        err,
        PhaseError::ContentUnavailable {
            phase: PhaseNumber::One,
            ..
        }
    ));
    assert!(matches!(
        controller.state(),
        PhaseState::Unavailable {
            phase: PhaseNumber::One,
            ..
        }
    ));
    assert!(matches!(
        controller.submit().await,
        Err(PhaseError::NotReady("unavailable"))
    ));
    assert!(controller.progress().is_none());
}

#[tokio::test]
async fn results_are_final_and_analysis_attaches() {
    let (_api, controller) = session(Level::UpperIntermediate, PhaseOrdering::ReadingWriting, synth()).await;
    controller.start().await.unwrap();
    controller.submit().await.unwrap();
    controller.submit().await.unwrap();

    assert!(matches!(
        controller.enter_phase(PhaseNumber::One).await,
        Err(PhaseError::InvalidTransition(_))
    ));
    assert!(matches!(
        controller.record_answer(reading(1), "A"),
        Err(PhaseError::InputLocked("done"))
    ));

    let results = controller.request_analysis().await.unwrap();
    assert!(results.detailed_analysis.is_some());
    assert_eq!(controller.results(), Some(results));
}

#[tokio::test]
async fn accepted_answers_cannot_be_reopened() {
    let (api, controller) =
        session(Level::Intermediate, PhaseOrdering::ListeningSpeaking, synth()).await;
    controller.start().await.unwrap();
    controller.record_answer(listening(2, 1), "eight").unwrap();
    controller.submit().await.unwrap();

    assert!(matches!(
        controller.enter_phase(PhaseNumber::One).await,
        Err(PhaseError::InvalidTransition(_))
    ));

    controller.record_answer(reading(1), "A").unwrap();
    api.fail_next(ApiOperation::Aggregate, 1);
    assert!(controller.submit().await.is_err());

    assert!(matches!(
        controller.enter_phase(PhaseNumber::Two).await,
        Err(PhaseError::InvalidTransition(_))
    ));
    assert!(matches!(
        controller.submit().await.unwrap(),
        SubmitOutcome::Completed(_)
    ));

    let phase_two: Vec<usize> = api
        .submissions()
        .iter()
        .filter(|(_, phase, _)| *phase == PhaseNumber::Two)
        .map(|(_, _, answers)| answers.len())
        .collect();
    assert_eq!(phase_two, vec![1]);
    assert_eq!(api.calls(ApiOperation::Submit(PhaseNumber::Two)), 1);
}
