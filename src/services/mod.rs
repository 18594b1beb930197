//! Services layer for keyquiz
//!
//! Provides the quiz backend integration.

pub mod backend;

pub use backend::{HttpQuizBackend, QuizBackend};
