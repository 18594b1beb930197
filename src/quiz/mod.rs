//! Quiz sessions and the coordinator that drives them from trigger to close.

pub mod coordinator;
pub mod sessions;

pub use coordinator::{PendingQuiz, QuizCoordinator, QuizOutcome};
pub use sessions::{SessionGuard, SessionRegistry, SessionState};
