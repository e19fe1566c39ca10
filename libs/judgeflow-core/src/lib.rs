//! Submission evaluation against a remote execution engine.
//!
//! Pipeline: language resolution, one batch submission, bounded result
//! polling, then verdict aggregation. See [`evaluator::Judge`].

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod language;
pub mod poller;

#[cfg(test)]
mod testing;

pub use engine::{ExecutionEngine, Judge0Client};
pub use error::{JudgeError, JudgeResult, Stage};
pub use evaluator::Judge;
pub use language::{resolve, LanguageTable};
pub use poller::ResultPoller;
