use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use exam_core::model::{AnswerKey, FinalResults, Level, PhaseOrdering, SessionId, Skill, WritingTask};
use remote::{ApiConfig, ExamApi, HttpExamApi, InMemoryExamApi};
use services::{
    PhaseController, PhaseError, PhaseState, PlaybackSlot, SpeechSynthesizer, SubmitOutcome,
    Utterance, start_session,
};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLevel { raw: String },
    InvalidOrdering { raw: String },
    InvalidSessionId { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLevel { raw } => write!(f, "invalid --level value: {raw}"),
            ArgsError::InvalidOrdering { raw } => write!(f, "invalid --ordering value: {raw}"),
            ArgsError::InvalidSessionId { raw } => write!(f, "invalid --session value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run     [--level <level>] [--ordering <pair>] [--answers <file>] [--session <id>]");
    eprintln!("  cargo run -p app -- offline [--level <level>] [--ordering <pair>] [--answers <file>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --level intermediate");
    eprintln!("  --ordering listening_speaking");
    eprintln!();
    eprintln!("The answers file is a JSON object of answer keys to raw responses,");
    eprintln!("e.g. {{\"reading_p1_q1\": \"B\", \"writing_task1\": \"...\"}}.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_API_URL, EXAM_API_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Offline,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

struct Args {
    level: Level,
    ordering: PhaseOrdering,
    answers: Option<PathBuf>,
    session: Option<SessionId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            level: Level::Intermediate,
            ordering: PhaseOrdering::ListeningSpeaking,
            answers: None,
            session: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--level" => {
                    let value = require_value(args, "--level")?;
                    parsed.level = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLevel { raw: value.clone() })?;
                }
                "--ordering" => {
                    let value = require_value(args, "--ordering")?;
                    parsed.ordering = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidOrdering { raw: value.clone() })?;
                }
                "--answers" => {
                    parsed.answers = Some(PathBuf::from(require_value(args, "--answers")?));
                }
                "--session" => {
                    let value = require_value(args, "--session")?;
                    let id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSessionId { raw: value.clone() })?;
                    parsed.session = Some(id);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

/// Prints transcripts instead of speaking them.
struct ConsoleNarrator;

impl SpeechSynthesizer for ConsoleNarrator {
    fn speak(&self, utterance: Utterance, slot: PlaybackSlot) {
        println!(
            "[section {} @ {:.2}x] {}",
            utterance.section_id, utterance.rate, utterance.text
        );
        slot.complete();
    }

    fn cancel(&self) {}
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_answers(
    path: Option<&PathBuf>,
) -> Result<IndexMap<AnswerKey, String>, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(IndexMap::new());
    };
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Fill in every answer the current phase has a slot for, and narrate its
/// listening sections.
async fn sit_phase(
    controller: &PhaseController,
    answers: &IndexMap<AnswerKey, String>,
) -> Result<(), PhaseError> {
    let PhaseState::Ready { phase, content, .. } = controller.state() else {
        return Err(PhaseError::NotReady(controller.state().name()));
    };
    info!(%phase, skills = ?controller.visible_skills(), "phase ready");

    if let Some(listening) = &content.listening {
        for section in &listening.sections {
            match controller.play_listening(section.id) {
                Ok(handle) => {
                    handle.finished().await;
                }
                Err(err) => warn!(section = section.id, error = %err, "narration skipped"),
            }
        }
    }

    for (key, raw) in answers {
        match controller.record_answer(key.clone(), raw) {
            Ok(()) | Err(PhaseError::UnknownQuestion(_)) => {}
            Err(err) => warn!(%key, error = %err, "answer rejected"),
        }
    }

    for task in [WritingTask::Task1, WritingTask::Task2] {
        if let Some(status) = controller.writing_status(task) {
            info!(?task, ?status, "writing length");
        }
    }
    if let Some(progress) = controller.progress() {
        info!(
            answered = progress.answered,
            total = progress.total,
            "submitting phase"
        );
    }
    Ok(())
}

fn print_results(results: &FinalResults) {
    println!("Overall band: {:.1}", results.overall);
    for skill in [Skill::Listening, Skill::Reading, Skill::Writing, Skill::Speaking] {
        println!("  {skill:?}: {:.1}", results.band(skill));
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    let answers = load_answers(parsed.answers.as_ref())?;

    let api: Arc<dyn ExamApi> = match cmd {
        Command::Run => {
            let config = ApiConfig::from_env();
            info!(base_url = %config.base_url, "using remote exam service");
            Arc::new(HttpExamApi::new(config)?)
        }
        Command::Offline => Arc::new(InMemoryExamApi::new()),
    };

    let session_id = match parsed.session {
        Some(id) => id,
        None => {
            start_session(api.as_ref(), parsed.level, parsed.ordering)
                .await?
                .id
        }
    };

    let controller = PhaseController::new(api, session_id, Arc::new(ConsoleNarrator));
    controller.start().await?;

    let results = loop {
        sit_phase(&controller, &answers).await?;
        match controller.submit().await {
            Ok(SubmitOutcome::Advanced(phase)) => info!(%phase, "advanced"),
            Ok(SubmitOutcome::Completed(results)) => break results,
            Ok(SubmitOutcome::Ignored) => {}
            Err(err) => {
                eprintln!("{}", err.user_message());
                controller.teardown();
                return Err(err.into());
            }
        }
    };

    print_results(&results);
    controller.teardown();
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
