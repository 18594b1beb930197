//! What a quiz view shows
//!
//! The first question of the payload is presented. A payload without
//! questions yields an error state instead of a question.

use crate::types::ActiveQuiz;
use serde::{Deserialize, Serialize};

/// Message shown when a quiz payload has no usable question
pub const LOAD_ERROR_MESSAGE: &str = "Error loading quiz. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum QuizPresentation {
    #[serde(rename_all = "camelCase")]
    Ready {
        topic: String,
        keyword: String,
        question: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        options: Vec<String>,
        /// Present once the answer has been revealed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
    },
    Error {
        message: String,
    },
}

impl QuizPresentation {
    /// Build the presentation for `quiz`, with the answer shown if `reveal`
    pub fn for_quiz(quiz: &ActiveQuiz, reveal: bool) -> Self {
        let Some(first) = quiz.quiz.questions.first() else {
            return QuizPresentation::Error {
                message: LOAD_ERROR_MESSAGE.to_string(),
            };
        };
        if first.question.trim().is_empty() {
            return QuizPresentation::Error {
                message: LOAD_ERROR_MESSAGE.to_string(),
            };
        }

        let keyword = if quiz.keyword.is_empty() {
            first.keyword.clone().unwrap_or_default()
        } else {
            quiz.keyword.clone()
        };
        let topic = if quiz.topic.is_empty() {
            quiz.quiz.topic.clone()
        } else {
            quiz.topic.clone()
        };

        QuizPresentation::Ready {
            topic,
            keyword,
            question: first.question.clone(),
            options: first.options.clone(),
            answer: if reveal { first.answer.clone() } else { None },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QuizPresentation::Error { .. })
    }
}
