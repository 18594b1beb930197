//! Quiz completion history
//!
//! Append-only log of completed quizzes, capped to the most recent entries
//! with the oldest evicted first.

use crate::error::Result;
use crate::storage::{self, StateStore, HISTORY_KEY};
use crate::types::{QuizRecord, DEFAULT_HISTORY_LIMIT};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub struct QuizHistory {
    store: Arc<dyn StateStore>,
    limit: usize,
    writer: Mutex<()>,
}

impl QuizHistory {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self::with_limit(store, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(store: Arc<dyn StateStore>, limit: usize) -> Self {
        Self {
            store,
            limit: limit.max(1),
            writer: Mutex::new(()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append a completion stamped with the current time
    pub async fn log_completion(&self, topic: &str, keyword: &str) -> Result<QuizRecord> {
        let record = QuizRecord {
            topic: topic.to_string(),
            keyword: keyword.to_string(),
            completed_at: Utc::now(),
        };
        self.append(record.clone()).await?;
        Ok(record)
    }

    /// Append a record, evicting the oldest beyond the limit
    pub async fn append(&self, record: QuizRecord) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut entries = self.entries().await?;
        entries.push(record);
        if entries.len() > self.limit {
            let excess = entries.len() - self.limit;
            entries.drain(..excess);
        }
        storage::set_json(self.store.as_ref(), HISTORY_KEY, &entries).await?;
        debug!("Quiz history now holds {} entries", entries.len());
        Ok(())
    }

    /// All retained records, oldest first
    pub async fn entries(&self) -> Result<Vec<QuizRecord>> {
        Ok(storage::get_json(self.store.as_ref(), HISTORY_KEY)
            .await?
            .unwrap_or_default())
    }
}
