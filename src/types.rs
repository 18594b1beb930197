//! Core data types for keyword tracking and quizzes
//!
//! Persisted shapes use camelCase field names so state written by older
//! browser-side trackers stays readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Threshold used when a topic does not configure one
pub const DEFAULT_THRESHOLD: u32 = 5;

/// Number of completions kept in the quiz history
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Tracking state for one topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicState {
    /// Keywords the user wants tracked for this topic
    #[serde(default)]
    pub keywords: BTreeSet<String>,

    /// Occurrence count per keyword; every key is a member of `keywords`
    #[serde(default)]
    pub keyword_counts: BTreeMap<String, u64>,

    /// Quiz threshold; `None` means the default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
}

impl TopicState {
    pub fn new<I, S>(keywords: I, threshold: Option<u32>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            keyword_counts: BTreeMap::new(),
            threshold,
        }
    }

    /// Effective threshold, falling back to `default` when unset or zero
    pub fn threshold_or(&self, default: u32) -> u32 {
        self.threshold.filter(|t| *t > 0).unwrap_or(default)
    }

    pub fn tracks(&self, keyword: &str) -> bool {
        self.keywords.contains(keyword)
    }

    pub fn count(&self, keyword: &str) -> u64 {
        self.keyword_counts.get(keyword).copied().unwrap_or(0)
    }
}

/// All tracked topics keyed by name
pub type TopicMap = BTreeMap<String, TopicState>;

/// Request to register (or replace) a tracked topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRegistration {
    pub name: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub threshold: Option<u32>,
}

/// Coarse quiz hardness derived from the pre-reset occurrence count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Small,
    Medium,
    Big,
}

impl Difficulty {
    /// Map an occurrence count to a difficulty.
    ///
    /// The cutoffs are absolute (5 and 15) and do not scale with the topic's
    /// threshold.
    pub fn from_count(count: u64) -> Self {
        if count >= 15 {
            Difficulty::Big
        } else if count <= 5 {
            Difficulty::Small
        } else {
            Difficulty::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Small => "small",
            Difficulty::Medium => "medium",
            Difficulty::Big => "big",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of the page (or other context) that produced an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginContext(pub String);

impl OriginContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for OriginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keyword observation delivered by the event source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordEvent {
    pub topic: String,
    pub keyword: String,
    #[serde(default = "default_match_count")]
    pub count: u32,
    #[serde(default)]
    pub source_context: OriginContext,
}

fn default_match_count() -> u32 {
    1
}

/// Identity of a quiz session.
///
/// Topic and keyword are kept as separate fields, so no separator can make
/// two distinct pairs collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub topic: String,
    pub keyword: String,
}

impl SessionKey {
    pub fn new(topic: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            keyword: keyword.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.topic, self.keyword)
    }
}

/// One completed quiz in the history log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRecord {
    pub topic: String,
    pub keyword: String,
    pub completed_at: DateTime<Utc>,
}

/// Request body sent to the quiz backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizRequest {
    pub topic: String,
    pub keywords: Vec<String>,
    pub difficulty: Difficulty,
}

/// A single generated question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    /// Multiple-choice options, empty for open questions
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub options: Vec<String>,
}

/// Quiz content returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub topic: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    /// Any further fields the backend sends along
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Read an explicit `null` as the type's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Most recently generated quiz, handed off to the display surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveQuiz {
    pub topic: String,
    pub keyword: String,
    pub origin: OriginContext,
    pub difficulty: Difficulty,
    pub quiz: QuizPayload,
}

/// Request body for keyword generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordsRequest {
    pub topics: Vec<String>,
}

/// Generated keywords per topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordsResponse {
    pub keywords_by_topic: BTreeMap<String, Vec<String>>,
}

/// Read-only view of one tracked topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    pub name: String,
    pub keywords: Vec<String>,
    pub keyword_counts: BTreeMap<String, u64>,
    pub threshold: u32,
}

/// Snapshot returned by the tracking status query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStatus {
    pub is_tracking: bool,
    pub topics: Vec<TopicSummary>,
}
