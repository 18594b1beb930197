//! Display surface for generated quizzes
//!
//! A display opens a view for an [`ActiveQuiz`] and signals exactly once when
//! that view is dismissed, whether the user answered, closed it or it was
//! cancelled externally.

pub mod presentation;
pub mod web;

use crate::error::Result;
use crate::types::ActiveQuiz;
use async_trait::async_trait;
use tokio::sync::oneshot;
use uuid::Uuid;

pub use presentation::{QuizPresentation, LOAD_ERROR_MESSAGE};
pub use web::{ActiveView, WebDisplay};

/// Handle to an opened quiz view
#[derive(Debug)]
pub struct QuizView {
    pub view_id: Uuid,
    /// Resolves when the view is dismissed. A dropped sender counts as
    /// dismissed too.
    pub closed: oneshot::Receiver<()>,
}

impl QuizView {
    /// Create a view and the sender that closes it
    pub fn channel() -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                view_id: Uuid::new_v4(),
                closed: rx,
            },
            tx,
        )
    }

    /// Wait until the view is dismissed
    pub async fn wait_closed(self) {
        // Err means the sender was dropped, which is also a dismissal
        let _ = self.closed.await;
    }
}

#[async_trait]
pub trait DisplaySurface: Send + Sync {
    /// Show a quiz view for `quiz`
    async fn open(&self, quiz: ActiveQuiz) -> Result<QuizView>;
}
