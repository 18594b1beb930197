//! Storage layer for keyquiz
//!
//! Durable state is a flat mapping from string keys to JSON values. There
//! are no transactions across calls; callers order dependent writes
//! themselves.

pub mod memory;
pub mod sqlite;

use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStateStore;

/// Key holding the tracked topics
pub const TOPICS_KEY: &str = "learningTopics";

/// Key holding the most recently generated quiz until its view is closed
pub const ACTIVE_QUIZ_KEY: &str = "activeQuiz";

/// Key holding the completion history
pub const HISTORY_KEY: &str = "quizHistory";

/// Key-value state store
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the given keys; absent keys are missing from the result
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;

    /// Write all entries, replacing existing values
    async fn set(&self, entries: HashMap<String, Value>) -> Result<()>;
}

/// Read and deserialize a single key
pub async fn get_json<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Result<Option<T>> {
    let mut values = store.get(&[key]).await?;
    match values.remove(key) {
        Some(Value::Null) | None => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}

/// Serialize and write a single key
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let mut entries = HashMap::with_capacity(1);
    entries.insert(key.to_string(), serde_json::to_value(value)?);
    store.set(entries).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TopicMap;

    #[tokio::test]
    async fn test_json_helpers_round_trip_through_store() {
        let store = InMemoryStore::new();
        let missing: Option<TopicMap> = get_json(&store, TOPICS_KEY).await.unwrap();
        assert!(missing.is_none());

        let mut topics = TopicMap::new();
        topics.insert(
            "biology".to_string(),
            crate::types::TopicState::new(["mitosis"], Some(5)),
        );
        set_json(&store, TOPICS_KEY, &topics).await.unwrap();

        let loaded: TopicMap = get_json(&store, TOPICS_KEY).await.unwrap().unwrap();
        assert_eq!(loaded, topics);
    }

    #[tokio::test]
    async fn test_null_value_reads_as_missing() {
        let store = InMemoryStore::new();
        set_json(&store, ACTIVE_QUIZ_KEY, &Value::Null).await.unwrap();
        let value: Option<Value> = get_json(&store, ACTIVE_QUIZ_KEY).await.unwrap();
        assert!(value.is_none());
    }
}
