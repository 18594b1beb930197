//! Keyword tracking: occurrence counters, threshold evaluation and the
//! completion history.

pub mod engine;
pub mod history;

pub use engine::{crosses_threshold, derive_difficulty, Occurrence, QuizTrigger, TrackingEngine};
pub use history::QuizHistory;
