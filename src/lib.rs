//! Keyquiz - keyword-triggered learning quizzes
//!
//! Tracks how often user-registered keywords show up in the pages a user
//! reads and, each time a keyword's count reaches a multiple of its topic's
//! threshold, asks a quiz backend for a short quiz and shows it.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//! - **Types**: Core data structures (TopicState, ActiveQuiz, etc.)
//! - **Storage**: Key-value state stores (in-memory, SQLite)
//! - **Tracking**: Occurrence counting, threshold evaluation, quiz history
//! - **Quiz**: Session registry and the quiz request coordinator
//! - **Services**: Quiz backend client
//! - **Display**: Quiz views and their presentation
//! - **Actor / API**: Event intake and the HTTP surface
//!
//! # Example
//!
//! ```ignore
//! use keyquiz_core::{
//!     HttpQuizBackend, InMemoryStore, QuizCoordinator, QuizHistory, SessionRegistry,
//!     TrackerHandle, TrackingEngine, WebDisplay,
//! };
//!
//! let store = Arc::new(InMemoryStore::new());
//! let sessions = Arc::new(SessionRegistry::new());
//! let engine = Arc::new(TrackingEngine::new(store.clone(), sessions.clone()));
//! let history = Arc::new(QuizHistory::new(store.clone()));
//! let display = Arc::new(WebDisplay::new(history));
//! let backend = Arc::new(HttpQuizBackend::new(&config.backend)?);
//! let coordinator = Arc::new(QuizCoordinator::new(
//!     engine.clone(), sessions, backend, display, store,
//! ));
//! let (tracker, _) = TrackerHandle::spawn(engine, coordinator).await?;
//! tracker.keyword_found(event)?;
//! ```

pub mod actor;
pub mod api;
pub mod config;
pub mod display;
pub mod error;
pub mod quiz;
pub mod services;
pub mod storage;
pub mod tracking;
pub mod types;

// Re-export commonly used types
pub use actor::{TrackerActor, TrackerHandle, TrackerMessage};
pub use config::KeyquizConfig;
pub use display::{ActiveView, DisplaySurface, QuizPresentation, QuizView, WebDisplay};
pub use error::{KeyquizError, Result};
pub use quiz::{QuizCoordinator, QuizOutcome, SessionRegistry, SessionState};
pub use services::{HttpQuizBackend, QuizBackend};
pub use storage::{InMemoryStore, SqliteStateStore, StateStore};
pub use tracking::{Occurrence, QuizHistory, QuizTrigger, TrackingEngine};
pub use types::{
    ActiveQuiz, Difficulty, KeywordEvent, OriginContext, QuizPayload, QuizRecord, QuizRequest,
    Question, SessionKey, TopicRegistration, TopicState, TrackingStatus,
};
