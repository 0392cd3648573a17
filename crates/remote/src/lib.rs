#![forbid(unsafe_code)]

pub mod api;
pub mod http;
pub mod in_memory;

pub use api::{ApiError, ApiOperation, ExamApi};
pub use http::{ApiConfig, HttpExamApi};
pub use in_memory::{InMemoryExamApi, sample_content};
