#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod time;
pub mod word_count;

pub use error::Error;
pub use time::{Clock, PhaseTimer};
pub use word_count::{WordCountStatus, WordRange};
