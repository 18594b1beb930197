//! Quiz session coordinator
//!
//! Drives one quiz from threshold trigger to closed view:
//!
//! 1. open the session for (topic, keyword), dropping the trigger if one is
//!    already open
//! 2. derive the difficulty from the count that crossed the threshold
//! 3. ask the backend for quiz content, bounded by a timeout
//! 4. persist the active quiz, take the triggering count off the counter,
//!    open the display
//! 5. release the session when the display reports the view closed
//!
//! Backend failures release the session and leave the counter untouched, so
//! the next multiple of the threshold retries. Store and display failures
//! abort the remaining steps with whatever was already persisted left in
//! place.

use crate::display::DisplaySurface;
use crate::error::{KeyquizError, Result};
use crate::quiz::sessions::{SessionGuard, SessionRegistry};
use crate::services::QuizBackend;
use crate::storage::{self, StateStore, ACTIVE_QUIZ_KEY};
use crate::tracking::{derive_difficulty, QuizTrigger, TrackingEngine};
use crate::types::{ActiveQuiz, Difficulty, OriginContext, QuizPayload, QuizRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default upper bound for one backend call
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// How a quiz request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizOutcome {
    /// A session was already open for this keyword
    Suppressed,
    /// Backend unreachable, timed out or answered with an error
    BackendFailed,
    /// Store or display failure stopped the request part-way
    Aborted,
    /// Quiz is on screen
    Displayed {
        view_id: Uuid,
        difficulty: Difficulty,
    },
}

/// A quiz request whose session is open but whose backend call has not run
#[derive(Debug)]
pub struct PendingQuiz {
    guard: SessionGuard,
    count: u64,
    origin: OriginContext,
}

impl PendingQuiz {
    pub fn topic(&self) -> &str {
        &self.guard.key().topic
    }

    pub fn keyword(&self) -> &str {
        &self.guard.key().keyword
    }

    /// Count that crossed the threshold
    pub fn count(&self) -> u64 {
        self.count
    }
}

pub struct QuizCoordinator {
    engine: Arc<TrackingEngine>,
    sessions: Arc<SessionRegistry>,
    backend: Arc<dyn QuizBackend>,
    display: Arc<dyn DisplaySurface>,
    store: Arc<dyn StateStore>,
    backend_timeout: Duration,
}

impl QuizCoordinator {
    pub fn new(
        engine: Arc<TrackingEngine>,
        sessions: Arc<SessionRegistry>,
        backend: Arc<dyn QuizBackend>,
        display: Arc<dyn DisplaySurface>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            engine,
            sessions,
            backend,
            display,
            store,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Step 1: open the session, or `None` if one is already open
    pub fn begin(&self, trigger: QuizTrigger) -> Option<PendingQuiz> {
        let QuizTrigger { key, count, origin } = trigger;
        match self.sessions.try_open(key.clone()) {
            Some(guard) => Some(PendingQuiz {
                guard,
                count,
                origin,
            }),
            None => {
                debug!("Dropping trigger for {}: session already open", key);
                None
            }
        }
    }

    /// Open a session and run the whole request
    pub async fn request_quiz(&self, trigger: QuizTrigger) -> QuizOutcome {
        match self.begin(trigger) {
            Some(pending) => self.fulfil(pending).await,
            None => QuizOutcome::Suppressed,
        }
    }

    /// Steps 2 to 5 for a session opened with [`begin`](Self::begin)
    pub async fn fulfil(&self, pending: PendingQuiz) -> QuizOutcome {
        let PendingQuiz {
            guard,
            count,
            origin,
        } = pending;
        let topic = guard.key().topic.clone();
        let keyword = guard.key().keyword.clone();
        let difficulty = derive_difficulty(count);

        let request = QuizRequest {
            topic: topic.clone(),
            keywords: vec![keyword.clone()],
            difficulty,
        };
        let payload = match self.call_backend(&request).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Quiz generation failed for {}: {}", guard.key(), e);
                return QuizOutcome::BackendFailed;
            }
        };

        let active = ActiveQuiz {
            topic: topic.clone(),
            keyword: keyword.clone(),
            origin,
            difficulty,
            quiz: payload,
        };
        if let Err(e) = storage::set_json(self.store.as_ref(), ACTIVE_QUIZ_KEY, &active).await {
            error!("Could not store active quiz for {}: {}", guard.key(), e);
            return QuizOutcome::Aborted;
        }
        if let Err(e) = self.engine.settle_counter(&topic, &keyword, count).await {
            error!("Could not reset counter for {}: {}", guard.key(), e);
            return QuizOutcome::Aborted;
        }

        let view = match self.display.open(active).await {
            Ok(view) => view,
            Err(e) => {
                error!("Could not open quiz view for {}: {}", guard.key(), e);
                return QuizOutcome::Aborted;
            }
        };
        guard.mark_displayed();

        let view_id = view.view_id;
        info!(
            "Quiz {} shown for {} (count {}, difficulty {})",
            view_id,
            guard.key(),
            count,
            difficulty
        );

        tokio::spawn(async move {
            view.wait_closed().await;
            debug!("Quiz view {} dismissed", view_id);
            drop(guard);
        });

        QuizOutcome::Displayed {
            view_id,
            difficulty,
        }
    }

    async fn call_backend(&self, request: &QuizRequest) -> Result<QuizPayload> {
        tokio::time::timeout(self.backend_timeout, self.backend.generate_quiz(request))
            .await
            .map_err(|_| KeyquizError::Timeout(self.backend_timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::QuizView;
    use crate::services::backend::MockQuizBackend;
    use crate::storage::InMemoryStore;
    use crate::types::{Question, SessionKey, TopicRegistration};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Display that keeps the close handles so tests decide when views close
    #[derive(Default)]
    struct HeldDisplay {
        opened: Mutex<Vec<(ActiveQuiz, oneshot::Sender<()>)>>,
    }

    impl HeldDisplay {
        fn opened(&self) -> Vec<ActiveQuiz> {
            self.opened
                .lock()
                .unwrap()
                .iter()
                .map(|(quiz, _)| quiz.clone())
                .collect()
        }

        fn close_all(&self) {
            for (_, closer) in self.opened.lock().unwrap().drain(..) {
                let _ = closer.send(());
            }
        }
    }

    #[async_trait]
    impl DisplaySurface for HeldDisplay {
        async fn open(&self, quiz: ActiveQuiz) -> Result<QuizView> {
            let (view, closer) = QuizView::channel();
            self.opened.lock().unwrap().push((quiz, closer));
            Ok(view)
        }
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        engine: Arc<TrackingEngine>,
        display: Arc<HeldDisplay>,
        coordinator: QuizCoordinator,
    }

    async fn fixture(backend: MockQuizBackend) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let sessions = Arc::new(SessionRegistry::new());
        let engine = Arc::new(TrackingEngine::new(store.clone(), sessions.clone()));
        engine
            .register_topic(TopicRegistration {
                name: "biology".to_string(),
                keywords: vec!["mitosis".to_string()],
                threshold: Some(5),
            })
            .await
            .unwrap();
        let display = Arc::new(HeldDisplay::default());
        let coordinator = QuizCoordinator::new(
            engine.clone(),
            sessions,
            Arc::new(backend),
            display.clone(),
            store.clone(),
        )
        .with_backend_timeout(Duration::from_millis(200));

        Fixture {
            store,
            engine,
            display,
            coordinator,
        }
    }

    fn payload() -> QuizPayload {
        QuizPayload {
            topic: "biology".to_string(),
            questions: vec![Question {
                question: "What is mitosis?".to_string(),
                answer: Some("Cell division".to_string()),
                ..Question::default()
            }],
            ..QuizPayload::default()
        }
    }

    async fn count_to(fixture: &Fixture, n: u32) -> QuizTrigger {
        let outcome = fixture
            .engine
            .record_occurrence("biology", "mitosis", n, OriginContext::new("tab-1"))
            .await
            .unwrap();
        match outcome {
            crate::tracking::Occurrence::Triggered(trigger) => trigger,
            other => panic!("expected trigger, got {:?}", other),
        }
    }

    fn key() -> SessionKey {
        SessionKey::new("biology", "mitosis")
    }

    #[tokio::test]
    async fn test_difficulty_from_pre_reset_count() {
        let mut backend = MockQuizBackend::new();
        backend
            .expect_generate_quiz()
            .withf(|req| req.difficulty == Difficulty::Medium && req.keywords == ["mitosis"])
            .times(1)
            .returning(|_| Ok(payload()));
        let fixture = fixture(backend).await;

        let trigger = count_to(&fixture, 10).await;
        let outcome = fixture.coordinator.request_quiz(trigger).await;

        assert!(matches!(
            outcome,
            QuizOutcome::Displayed {
                difficulty: Difficulty::Medium,
                ..
            }
        ));
        assert_eq!(fixture.engine.current_count("biology", "mitosis").await.unwrap(), 0);

        let stored: ActiveQuiz = storage::get_json(fixture.store.as_ref(), ACTIVE_QUIZ_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.origin, OriginContext::new("tab-1"));
        assert_eq!(stored.difficulty, Difficulty::Medium);
    }

    #[tokio::test]
    async fn test_difficulty_from_trigger_not_later_count() {
        let mut backend = MockQuizBackend::new();
        backend
            .expect_generate_quiz()
            .withf(|req| req.difficulty == Difficulty::Small)
            .times(1)
            .returning(|_| Ok(payload()));
        let fixture = fixture(backend).await;

        let trigger = count_to(&fixture, 5).await;
        let pending = fixture.coordinator.begin(trigger).unwrap();
        assert_eq!(pending.count(), 5);
        let late = fixture
            .engine
            .record_occurrence("biology", "mitosis", 1, OriginContext::new("tab-1"))
            .await
            .unwrap();
        assert!(matches!(late, crate::tracking::Occurrence::Counted { count: 6, .. }));

        let outcome = fixture.coordinator.fulfil(pending).await;
        assert!(matches!(
            outcome,
            QuizOutcome::Displayed {
                difficulty: Difficulty::Small,
                ..
            }
        ));
        assert_eq!(fixture.engine.current_count("biology", "mitosis").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_writes_happen_in_order() {
        let mut backend = MockQuizBackend::new();
        backend
            .expect_generate_quiz()
            .returning(|_| Ok(payload()));
        let fixture = fixture(backend).await;

        let trigger = count_to(&fixture, 5).await;
        let writes_before = fixture.store.write_log().len();
        fixture.coordinator.request_quiz(trigger).await;

        let writes: Vec<Vec<String>> = fixture.store.write_log()[writes_before..].to_vec();
        assert_eq!(
            writes,
            vec![
                vec![ACTIVE_QUIZ_KEY.to_string()],
                vec![crate::storage::TOPICS_KEY.to_string()],
            ]
        );
        assert_eq!(fixture.display.opened().len(), 1);
    }

    #[tokio::test]
    async fn test_open_session_blocks_second_request() {
        let mut backend = MockQuizBackend::new();
        backend
            .expect_generate_quiz()
            .times(1)
            .returning(|_| Ok(payload()));
        let fixture = fixture(backend).await;

        let trigger = count_to(&fixture, 5).await;
        fixture.coordinator.request_quiz(trigger.clone()).await;

        for _ in 0..3 {
            let again = fixture.coordinator.request_quiz(trigger.clone()).await;
            assert_eq!(again, QuizOutcome::Suppressed);
        }
        assert!(fixture.coordinator.sessions().is_open(&key()));
    }

    #[tokio::test]
    async fn test_close_releases_session() {
        let mut backend = MockQuizBackend::new();
        backend
            .expect_generate_quiz()
            .returning(|_| Ok(payload()));
        let fixture = fixture(backend).await;

        let trigger = count_to(&fixture, 5).await;
        fixture.coordinator.request_quiz(trigger).await;
        assert!(fixture.coordinator.sessions().is_open(&key()));

        fixture.display.close_all();
        for _ in 0..50 {
            if !fixture.coordinator.sessions().is_open(&key()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!fixture.coordinator.sessions().is_open(&key()));
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_count() {
        let mut backend = MockQuizBackend::new();
        backend.expect_generate_quiz().times(1).returning(|_| {
            Err(KeyquizError::BackendStatus {
                status: 503,
                body: "unavailable".to_string(),
            })
        });
        let fixture = fixture(backend).await;

        let trigger = count_to(&fixture, 10).await;
        let outcome = fixture.coordinator.request_quiz(trigger).await;

        assert_eq!(outcome, QuizOutcome::BackendFailed);
        assert_eq!(fixture.engine.current_count("biology", "mitosis").await.unwrap(), 10);
        assert!(fixture.coordinator.sessions().is_empty());
        assert!(fixture.display.opened().is_empty());
        assert!(fixture.store.raw(ACTIVE_QUIZ_KEY).is_none());
    }

    #[tokio::test]
    async fn test_store_failure_aborts_before_reset() {
        let mut backend = MockQuizBackend::new();
        backend
            .expect_generate_quiz()
            .returning(|_| Ok(payload()));
        let fixture = fixture(backend).await;

        let trigger = count_to(&fixture, 5).await;
        fixture.store.set_fail_writes(true);
        let outcome = fixture.coordinator.request_quiz(trigger).await;
        fixture.store.set_fail_writes(false);

        assert_eq!(outcome, QuizOutcome::Aborted);
        assert_eq!(fixture.engine.current_count("biology", "mitosis").await.unwrap(), 5);
        assert!(fixture.display.opened().is_empty());
        assert!(fixture.coordinator.sessions().is_empty());
    }
}
