//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use keyquiz_core::{
    api::ApiState,
    error::{KeyquizError, Result},
    storage::InMemoryStore,
    types::KeywordsResponse,
    ActiveQuiz, DisplaySurface, OriginContext, Occurrence, QuizBackend, QuizCoordinator,
    QuizHistory, QuizOutcome, QuizPayload, QuizRequest, QuizView, Question, SessionKey,
    SessionRegistry, TopicRegistration, TrackerHandle, TrackingEngine, WebDisplay,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// How the fake backend answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// One question per requested keyword
    Succeed,
    /// HTTP 500
    Fail,
    /// Never answers
    Hang,
    /// Success with an empty question list
    Empty,
}

/// Scriptable quiz backend that records every request
pub struct FakeBackend {
    mode: Mutex<BackendMode>,
    calls: AtomicUsize,
    requests: Mutex<Vec<QuizRequest>>,
}

impl FakeBackend {
    pub fn new(mode: BackendMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mode(&self, mode: BackendMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<QuizRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuizBackend for FakeBackend {
    async fn generate_quiz(&self, request: &QuizRequest) -> Result<QuizPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let mode = *self.mode.lock().unwrap();
        match mode {
            BackendMode::Succeed => Ok(QuizPayload {
                topic: request.topic.clone(),
                questions: request
                    .keywords
                    .iter()
                    .map(|keyword| Question {
                        question: format!("Explain {} in one sentence.", keyword),
                        answer: Some(format!("{} is ...", keyword)),
                        keyword: Some(keyword.clone()),
                        difficulty: Some(request.difficulty.to_string()),
                        options: Vec::new(),
                    })
                    .collect(),
                ..QuizPayload::default()
            }),
            BackendMode::Empty => Ok(QuizPayload {
                topic: request.topic.clone(),
                ..QuizPayload::default()
            }),
            BackendMode::Fail => Err(KeyquizError::BackendStatus {
                status: 500,
                body: "internal error".to_string(),
            }),
            BackendMode::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn generate_keywords(&self, topics: Vec<String>) -> Result<KeywordsResponse> {
        Ok(KeywordsResponse {
            keywords_by_topic: topics
                .into_iter()
                .map(|topic| (topic.clone(), vec![format!("{} basics", topic)]))
                .collect(),
        })
    }
}

/// Display that records opened quizzes and lets the test close them
#[derive(Default)]
pub struct RecordingDisplay {
    opened: Mutex<Vec<ActiveQuiz>>,
    closers: Mutex<Vec<oneshot::Sender<()>>>,
}

impl RecordingDisplay {
    pub fn opened(&self) -> Vec<ActiveQuiz> {
        self.opened.lock().unwrap().clone()
    }

    /// Dismiss every open view
    pub fn close_all(&self) {
        for closer in self.closers.lock().unwrap().drain(..) {
            let _ = closer.send(());
        }
    }
}

#[async_trait]
impl DisplaySurface for RecordingDisplay {
    async fn open(&self, quiz: ActiveQuiz) -> Result<QuizView> {
        let (view, closer) = QuizView::channel();
        self.opened.lock().unwrap().push(quiz);
        self.closers.lock().unwrap().push(closer);
        Ok(view)
    }
}

/// Engine, coordinator and fakes wired over an in-memory store
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub sessions: Arc<SessionRegistry>,
    pub engine: Arc<TrackingEngine>,
    pub history: Arc<QuizHistory>,
    pub backend: Arc<FakeBackend>,
    pub display: Arc<RecordingDisplay>,
    pub coordinator: Arc<QuizCoordinator>,
}

impl Harness {
    pub fn new(mode: BackendMode) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let sessions = Arc::new(SessionRegistry::new());
        let engine = Arc::new(TrackingEngine::new(store.clone(), sessions.clone()));
        let history = Arc::new(QuizHistory::new(store.clone()));
        let backend = Arc::new(FakeBackend::new(mode));
        let display = Arc::new(RecordingDisplay::default());
        let coordinator = Arc::new(
            QuizCoordinator::new(
                engine.clone(),
                sessions.clone(),
                backend.clone(),
                display.clone(),
                store.clone(),
            )
            .with_backend_timeout(Duration::from_millis(200)),
        );

        Self {
            store,
            sessions,
            engine,
            history,
            backend,
            display,
            coordinator,
        }
    }

    pub async fn track(&self, topic: &str, keywords: &[&str], threshold: u32) {
        self.engine
            .register_topic(TopicRegistration {
                name: topic.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                threshold: Some(threshold),
            })
            .await
            .unwrap();
    }

    /// Record one event and, if it triggers, run the quiz request to the end
    pub async fn hit(&self, topic: &str, keyword: &str, by: u32) -> Option<QuizOutcome> {
        let occurrence = self
            .engine
            .record_occurrence(topic, keyword, by, OriginContext::new("tab-1"))
            .await
            .unwrap();
        match occurrence {
            Occurrence::Triggered(trigger) => Some(self.coordinator.request_quiz(trigger).await),
            _ => None,
        }
    }

    pub async fn count(&self, topic: &str, keyword: &str) -> u64 {
        self.engine.current_count(topic, keyword).await.unwrap()
    }

    /// Wait until the session for (topic, keyword) is released
    pub async fn wait_released(&self, topic: &str, keyword: &str) {
        let key = SessionKey::new(topic, keyword);
        for _ in 0..100 {
            if !self.sessions.is_open(&key) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session {} was never released", key);
    }
}

/// API state over the in-memory store, a fake backend and the web display
pub async fn api_state(mode: BackendMode) -> (ApiState, Arc<FakeBackend>) {
    let store = Arc::new(InMemoryStore::new());
    let sessions = Arc::new(SessionRegistry::new());
    let engine = Arc::new(TrackingEngine::new(store.clone(), sessions.clone()));
    let history = Arc::new(QuizHistory::new(store.clone()));
    let display = Arc::new(WebDisplay::new(history.clone()).with_store(store.clone()));
    let backend = Arc::new(FakeBackend::new(mode));
    let coordinator = Arc::new(QuizCoordinator::new(
        engine.clone(),
        sessions,
        backend.clone(),
        display.clone(),
        store,
    ));
    let (tracker, _) = TrackerHandle::spawn(engine, coordinator).await.unwrap();

    (
        ApiState {
            tracker,
            display,
            history,
        },
        backend,
    )
}
