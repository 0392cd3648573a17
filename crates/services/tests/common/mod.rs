#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use exam_core::model::{Level, PhaseOrdering};
use exam_core::time::fixed_clock;
use remote::InMemoryExamApi;
use services::{PhaseController, PlaybackSlot, SpeechSynthesizer, Utterance, start_session};

/// Synthesizer that "speaks" for a fixed duration of tokio time.
pub struct TimedSynth {
    duration: Duration,
    spoken: Mutex<Vec<Utterance>>,
    cancels: AtomicUsize,
}

impl TimedSynth {
    pub fn new(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            duration,
            spoken: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        })
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl SpeechSynthesizer for TimedSynth {
    fn speak(&self, utterance: Utterance, slot: PlaybackSlot) {
        self.spoken.lock().unwrap().push(utterance);
        let duration = self.duration;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            slot.complete();
        });
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Synthesizer whose every utterance fails immediately.
pub struct BrokenSynth;

impl SpeechSynthesizer for BrokenSynth {
    fn speak(&self, _utterance: Utterance, slot: PlaybackSlot) {
        slot.fail("output device unavailable");
    }

    fn cancel(&self) {}
}

pub async fn session(
    level: Level,
    ordering: PhaseOrdering,
    synth: Arc<dyn SpeechSynthesizer>,
) -> (InMemoryExamApi, PhaseController) {
    let api = InMemoryExamApi::new().with_clock(fixed_clock());
    let record = start_session(&api, level, ordering).await.unwrap();
    let controller =
        PhaseController::new(Arc::new(api.clone()), record.id, synth).with_clock(fixed_clock());
    (api, controller)
}
