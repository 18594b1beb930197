//! Quiz backend client
//!
//! The backend turns a topic, its keywords and a difficulty into quiz
//! questions, and can suggest keywords for new topics. Any non-success
//! status is returned as a recoverable error.

use crate::config::BackendSettings;
use crate::error::{KeyquizError, Result};
use crate::types::{KeywordsRequest, KeywordsResponse, QuizPayload, QuizRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// Quiz generation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizBackend: Send + Sync {
    /// Generate quiz content for one topic
    async fn generate_quiz(&self, request: &QuizRequest) -> Result<QuizPayload>;

    /// Suggest keywords for each topic
    async fn generate_keywords(&self, topics: Vec<String>) -> Result<KeywordsResponse>;
}

/// HTTP implementation talking JSON to the quiz service
pub struct HttpQuizBackend {
    client: Client,
    base_url: String,
    quiz_path: String,
    keywords_path: String,
}

impl HttpQuizBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        if settings.base_url.trim().is_empty() {
            return Err(KeyquizError::Config("backend base_url is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| KeyquizError::Backend(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            quiz_path: settings.quiz_path.clone(),
            keywords_path: settings.keywords_path.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Backend returned {} for {}", status, url);
            return Err(KeyquizError::BackendStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| KeyquizError::Backend(format!("Invalid response from {}: {}", url, e)))
    }
}

#[async_trait]
impl QuizBackend for HttpQuizBackend {
    async fn generate_quiz(&self, request: &QuizRequest) -> Result<QuizPayload> {
        self.post(&self.quiz_path, request).await
    }

    async fn generate_keywords(&self, topics: Vec<String>) -> Result<KeywordsResponse> {
        self.post(&self.keywords_path, &KeywordsRequest { topics })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joining() {
        let settings = BackendSettings {
            base_url: "http://localhost:8000/".to_string(),
            ..BackendSettings::default()
        };
        let backend = HttpQuizBackend::new(&settings).unwrap();
        assert_eq!(
            backend.endpoint("/generate-quiz"),
            "http://localhost:8000/generate-quiz"
        );
        assert_eq!(
            backend.endpoint("generate-keywords"),
            "http://localhost:8000/generate-keywords"
        );
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let settings = BackendSettings {
            base_url: " ".to_string(),
            ..BackendSettings::default()
        };
        assert!(matches!(
            HttpQuizBackend::new(&settings),
            Err(KeyquizError::Config(_))
        ));
    }
}
