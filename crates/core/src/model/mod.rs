mod answer;
mod content;
mod ids;
mod level;
mod ordering;
mod session;

pub use answer::{
    AnswerError, AnswerKey, AnswerSnapshot, AnswerValue, KeyParseError, TrueFalseNotGiven,
    WritingTask,
};
pub use content::{
    ChartTask, CueCard, EssayTask, ListeningContent, ListeningSection, PhaseContent, Question,
    QuestionKind, ReadingContent, ReadingPassage, SpeakingContent, SpeakingQuestion,
    WritingContent,
};
pub use ids::SessionId;
pub use level::{Level, LevelParseError};
pub use ordering::{OrderingParseError, PhaseNumber, PhaseOrdering, Skill};
pub use session::{FinalResults, SessionRecord, SessionStatus};
