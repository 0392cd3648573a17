use thiserror::Error;

use crate::model::{AnswerError, KeyParseError, LevelParseError, OrderingParseError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Key(#[from] KeyParseError),
    #[error(transparent)]
    Level(#[from] LevelParseError),
    #[error(transparent)]
    Ordering(#[from] OrderingParseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerKey, Level};

    fn parse_pair(key: &str, level: &str) -> Result<(AnswerKey, Level), Error> {
        Ok((key.parse()?, level.parse()?))
    }

    #[test]
    fn wraps_model_parse_errors() {
        assert!(parse_pair("reading_p1_q2", "advanced").is_ok());
        assert!(matches!(parse_pair("essay", "advanced"), Err(Error::Key(_))));
        assert!(matches!(parse_pair("writing_task1", "expert"), Err(Error::Level(_))));
    }
}
