//! Display surface driven over HTTP
//!
//! Opened quizzes wait here until a client fetches them, reveals the answer
//! (which logs a completion) and closes the view.
//!
//! With a store attached, the persisted active quiz is reopened on startup
//! and cleared once its view is closed.

use crate::display::{DisplaySurface, QuizPresentation, QuizView};
use crate::error::{KeyquizError, Result};
use crate::storage::{self, StateStore, ACTIVE_QUIZ_KEY};
use crate::tracking::QuizHistory;
use crate::types::{ActiveQuiz, Difficulty};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Snapshot of an open view as served to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveView {
    pub view_id: Uuid,
    pub difficulty: Difficulty,
    pub origin: String,
    pub presentation: QuizPresentation,
}

struct OpenView {
    quiz: ActiveQuiz,
    /// `None` for a view restored from the store, which no session waits on
    closer: Option<oneshot::Sender<()>>,
    answered: bool,
}

#[derive(Default)]
struct Views {
    open: HashMap<Uuid, OpenView>,
    /// Most recently opened first
    order: Vec<Uuid>,
}

pub struct WebDisplay {
    views: Mutex<Views>,
    history: Arc<QuizHistory>,
    store: Option<Arc<dyn StateStore>>,
}

impl WebDisplay {
    pub fn new(history: Arc<QuizHistory>) -> Self {
        Self {
            views: Mutex::new(Views::default()),
            history,
            store: None,
        }
    }

    /// Keep the persisted active quiz in step with the open views
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn views(&self) -> MutexGuard<'_, Views> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, view_id: Uuid, quiz: ActiveQuiz, closer: Option<oneshot::Sender<()>>) {
        let mut views = self.views();
        views.order.insert(0, view_id);
        views.open.insert(
            view_id,
            OpenView {
                quiz,
                closer,
                answered: false,
            },
        );
    }

    /// Reopen the quiz left in the store by an earlier run, if any
    pub async fn restore(&self) -> Result<Option<Uuid>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let Some(quiz) = storage::get_json::<ActiveQuiz>(store.as_ref(), ACTIVE_QUIZ_KEY).await?
        else {
            return Ok(None);
        };

        let view_id = Uuid::new_v4();
        info!(
            "Restoring quiz view {} for {:?}/{:?}",
            view_id, quiz.topic, quiz.keyword
        );
        self.insert(view_id, quiz, None);
        Ok(Some(view_id))
    }

    fn snapshot(view_id: Uuid, view: &OpenView) -> ActiveView {
        ActiveView {
            view_id,
            difficulty: view.quiz.difficulty,
            origin: view.quiz.origin.to_string(),
            presentation: QuizPresentation::for_quiz(&view.quiz, view.answered),
        }
    }

    /// The most recently opened view that is still open
    pub fn active(&self) -> Option<ActiveView> {
        let views = self.views();
        views
            .order
            .first()
            .and_then(|id| views.open.get(id).map(|view| Self::snapshot(*id, view)))
    }

    /// All open views, most recent first
    pub fn open_views(&self) -> Vec<ActiveView> {
        let views = self.views();
        views
            .order
            .iter()
            .filter_map(|id| views.open.get(id).map(|view| Self::snapshot(*id, view)))
            .collect()
    }

    pub fn get(&self, view_id: Uuid) -> Option<ActiveView> {
        self.views()
            .open
            .get(&view_id)
            .map(|view| Self::snapshot(view_id, view))
    }

    /// Reveal the answer of a view and log the completion once
    pub async fn reveal_answer(&self, view_id: Uuid) -> Result<ActiveView> {
        let (snapshot, newly_answered, topic, keyword) = {
            let mut views = self.views();
            let view = views
                .open
                .get_mut(&view_id)
                .ok_or_else(|| KeyquizError::Display(format!("no open quiz view {}", view_id)))?;
            let newly_answered = !view.answered;
            view.answered = true;
            (
                Self::snapshot(view_id, view),
                newly_answered,
                view.quiz.topic.clone(),
                view.quiz.keyword.clone(),
            )
        };

        if newly_answered && !snapshot.presentation.is_error() {
            self.history.log_completion(&topic, &keyword).await?;
            info!("Quiz completed for {:?}/{:?}", topic, keyword);
        }
        Ok(snapshot)
    }

    /// Dismiss a view; returns false if it was not open
    pub async fn close(&self, view_id: Uuid) -> Result<bool> {
        let closed = {
            let mut views = self.views();
            views.order.retain(|id| *id != view_id);
            views.open.remove(&view_id)
        };

        let Some(view) = closed else {
            return Ok(false);
        };
        if let Some(closer) = view.closer {
            // Receiver gone means the coordinator already stopped waiting
            if closer.send(()).is_err() {
                warn!("Quiz view {} closed with no observer", view_id);
            }
        }
        debug!("Quiz view {} closed", view_id);

        self.clear_persisted(&view.quiz).await?;
        Ok(true)
    }

    /// Drop the stored active quiz unless a newer one replaced it
    async fn clear_persisted(&self, quiz: &ActiveQuiz) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let stored: Option<ActiveQuiz> = storage::get_json(store.as_ref(), ACTIVE_QUIZ_KEY).await?;
        if stored.as_ref() == Some(quiz) {
            storage::set_json(store.as_ref(), ACTIVE_QUIZ_KEY, &Value::Null).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DisplaySurface for WebDisplay {
    async fn open(&self, quiz: ActiveQuiz) -> Result<QuizView> {
        let (view, closer) = QuizView::channel();
        info!(
            "Opening quiz view {} for {:?}/{:?}",
            view.view_id, quiz.topic, quiz.keyword
        );

        self.insert(view.view_id, quiz, Some(closer));
        Ok(view)
    }
}
