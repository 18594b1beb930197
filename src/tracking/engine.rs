//! Keyword tracking engine
//!
//! Owns every mutation of the tracked topics: occurrence counting, threshold
//! evaluation, counter resets and topic registration. All read-modify-write
//! cycles run under one writer lock, so concurrent events for the same
//! keyword never lose an increment.

use crate::error::{KeyquizError, Result};
use crate::quiz::sessions::SessionRegistry;
use crate::storage::{self, StateStore, TOPICS_KEY};
use crate::types::{
    Difficulty, OriginContext, SessionKey, TopicMap, TopicRegistration, TopicState, TopicSummary,
    TrackingStatus, DEFAULT_THRESHOLD,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// A threshold crossing that should produce a quiz
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizTrigger {
    pub key: SessionKey,
    /// Post-increment count that crossed the threshold
    pub count: u64,
    pub origin: OriginContext,
}

/// Result of recording one occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occurrence {
    /// Unregistered topic, untracked keyword or zero increment
    Ignored,
    /// Count persisted, no threshold crossing
    Counted { count: u64, threshold: u32 },
    /// Threshold crossed but a quiz is already open for this keyword
    Suppressed { count: u64 },
    /// Threshold crossed, quiz should be requested
    Triggered(QuizTrigger),
}

/// True when `count` is a positive multiple of `threshold`.
///
/// Increments larger than one can jump over a multiple; such events do not
/// trigger.
pub fn crosses_threshold(count: u64, threshold: u32) -> bool {
    let threshold = u64::from(threshold);
    threshold > 0 && count >= threshold && count % threshold == 0
}

/// Difficulty for a quiz triggered at `count`
pub fn derive_difficulty(count: u64) -> Difficulty {
    Difficulty::from_count(count)
}

pub struct TrackingEngine {
    store: Arc<dyn StateStore>,
    sessions: Arc<SessionRegistry>,
    default_threshold: u32,
    writer: Mutex<()>,
}

impl TrackingEngine {
    pub fn new(store: Arc<dyn StateStore>, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            store,
            sessions,
            default_threshold: DEFAULT_THRESHOLD,
            writer: Mutex::new(()),
        }
    }

    /// Threshold applied to topics without their own (zero is ignored)
    pub fn with_default_threshold(mut self, threshold: u32) -> Self {
        if threshold > 0 {
            self.default_threshold = threshold;
        }
        self
    }

    pub fn default_threshold(&self) -> u32 {
        self.default_threshold
    }

    async fn load_topics(&self) -> Result<TopicMap> {
        Ok(storage::get_json(self.store.as_ref(), TOPICS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save_topics(&self, topics: &TopicMap) -> Result<()> {
        storage::set_json(self.store.as_ref(), TOPICS_KEY, topics)
            .await
            .map_err(|e| {
                error!("Failed to persist topics: {}", e);
                e
            })
    }

    /// Count `increment_by` occurrences of `keyword` under `topic`.
    ///
    /// The new count is persisted before the threshold is evaluated. Events
    /// for unregistered topics or keywords outside the topic's set are
    /// dropped without error.
    pub async fn record_occurrence(
        &self,
        topic: &str,
        keyword: &str,
        increment_by: u32,
        origin: OriginContext,
    ) -> Result<Occurrence> {
        if increment_by == 0 {
            debug!("Ignoring zero increment for {}/{}", topic, keyword);
            return Ok(Occurrence::Ignored);
        }

        let _writer = self.writer.lock().await;
        let mut topics = self.load_topics().await?;

        let Some(state) = topics.get_mut(topic) else {
            debug!("Ignoring occurrence for unregistered topic {:?}", topic);
            return Ok(Occurrence::Ignored);
        };
        if !state.tracks(keyword) {
            debug!("Ignoring untracked keyword {:?} in topic {:?}", keyword, topic);
            return Ok(Occurrence::Ignored);
        }

        let count = {
            let slot = state.keyword_counts.entry(keyword.to_string()).or_insert(0);
            *slot = slot.saturating_add(u64::from(increment_by));
            *slot
        };
        let threshold = state.threshold_or(self.default_threshold);

        self.save_topics(&topics).await?;
        debug!(
            "Keyword {:?} in {:?} now at {} (threshold {})",
            keyword, topic, count, threshold
        );

        if !crosses_threshold(count, threshold) {
            return Ok(Occurrence::Counted { count, threshold });
        }

        let key = SessionKey::new(topic, keyword);
        if self.sessions.is_open(&key) {
            debug!("Quiz already open for {}, suppressing trigger", key);
            return Ok(Occurrence::Suppressed { count });
        }

        info!("Threshold reached for {} at count {}", key, count);
        Ok(Occurrence::Triggered(QuizTrigger { key, count, origin }))
    }

    /// Persisted count for a keyword (0 if unknown)
    pub async fn current_count(&self, topic: &str, keyword: &str) -> Result<u64> {
        let topics = self.load_topics().await?;
        Ok(topics.get(topic).map(|t| t.count(keyword)).unwrap_or(0))
    }

    /// Zero the counter for `keyword`; a removed topic is left alone
    pub async fn reset_counter(&self, topic: &str, keyword: &str) -> Result<()> {
        self.settle_counter(topic, keyword, u64::MAX).await
    }

    /// Take the `consumed` occurrences a shown quiz covered off the counter.
    ///
    /// Occurrences recorded after the trigger stay counted, so with no
    /// events in between this is the same as [`Self::reset_counter`].
    pub async fn settle_counter(&self, topic: &str, keyword: &str, consumed: u64) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut topics = self.load_topics().await?;

        let Some(state) = topics.get_mut(topic) else {
            debug!("Topic {:?} disappeared before reset", topic);
            return Ok(());
        };
        if !state.tracks(keyword) {
            return Ok(());
        }
        let remaining = state.count(keyword).saturating_sub(consumed);
        state.keyword_counts.insert(keyword.to_string(), remaining);

        self.save_topics(&topics).await?;
        debug!(
            "Counter for {:?}/{:?} reset to {}",
            topic, keyword, remaining
        );
        Ok(())
    }

    /// Snapshot of every tracked topic
    pub async fn query_tracking_status(&self) -> Result<TrackingStatus> {
        let topics = self.load_topics().await?;
        let summaries: Vec<TopicSummary> = topics
            .into_iter()
            .map(|(name, state)| TopicSummary {
                threshold: state.threshold_or(self.default_threshold),
                keywords: state.keywords.into_iter().collect(),
                keyword_counts: state.keyword_counts,
                name,
            })
            .collect();

        Ok(TrackingStatus {
            is_tracking: !summaries.is_empty(),
            topics: summaries,
        })
    }

    /// Create or replace a topic with zeroed counters
    pub async fn register_topic(&self, registration: TopicRegistration) -> Result<()> {
        let name = registration.name.trim();
        if name.is_empty() {
            return Err(KeyquizError::InvalidInput("topic name is empty".to_string()));
        }
        if registration.threshold == Some(0) {
            return Err(KeyquizError::InvalidInput(
                "threshold must be at least 1".to_string(),
            ));
        }
        let keywords: Vec<String> = registration
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        if keywords.is_empty() {
            return Err(KeyquizError::InvalidInput(format!(
                "topic {:?} has no keywords",
                name
            )));
        }

        let _writer = self.writer.lock().await;
        let mut topics = self.load_topics().await?;
        let state = TopicState::new(keywords, registration.threshold);
        info!(
            "Tracking topic {:?} with {} keyword(s)",
            name,
            state.keywords.len()
        );
        topics.insert(name.to_string(), state);
        self.save_topics(&topics).await
    }

    /// Stop tracking a topic; returns whether it existed
    pub async fn remove_topic(&self, name: &str) -> Result<bool> {
        let _writer = self.writer.lock().await;
        let mut topics = self.load_topics().await?;
        if topics.remove(name).is_none() {
            return Ok(false);
        }
        self.save_topics(&topics).await?;
        info!("Stopped tracking topic {:?}", name);
        Ok(true)
    }

    /// Change the quiz threshold of an existing topic
    pub async fn set_threshold(&self, name: &str, threshold: u32) -> Result<()> {
        if threshold == 0 {
            return Err(KeyquizError::InvalidInput(
                "threshold must be at least 1".to_string(),
            ));
        }

        let _writer = self.writer.lock().await;
        let mut topics = self.load_topics().await?;
        let state = topics
            .get_mut(name)
            .ok_or_else(|| KeyquizError::TopicNotFound(name.to_string()))?;
        state.threshold = Some(threshold);
        self.save_topics(&topics).await
    }
}
