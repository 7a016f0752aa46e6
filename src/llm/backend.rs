use std::future::Future;
use std::sync::Arc;

use crate::error::LlmError;

/// A prompt for the completion capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Combined size of both parts, for sizing logs
    pub fn char_len(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

/// Shape of answer requested from the completion capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

/// Text completion capability used for extraction and scoring
///
/// Implementations return the raw text of the answer; callers extract and
/// validate any JSON themselves.
pub trait CompletionBackend: Send + Sync {
    fn complete(
        &self,
        prompt: &Prompt,
        format: ResponseFormat,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}

/// Embedding capability used by the chunk indexing stage
pub trait EmbeddingBackend: Send + Sync {
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;
}

impl<T: CompletionBackend> CompletionBackend for Arc<T> {
    fn complete(
        &self,
        prompt: &Prompt,
        format: ResponseFormat,
    ) -> impl Future<Output = Result<String, LlmError>> + Send {
        (**self).complete(prompt, format)
    }
}

impl<T: EmbeddingBackend> EmbeddingBackend for Arc<T> {
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send {
        (**self).embed(text)
    }
}

impl<T: CompletionBackend> CompletionBackend for &T {
    fn complete(
        &self,
        prompt: &Prompt,
        format: ResponseFormat,
    ) -> impl Future<Output = Result<String, LlmError>> + Send {
        (**self).complete(prompt, format)
    }
}

impl<T: EmbeddingBackend> EmbeddingBackend for &T {
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send {
        (**self).embed(text)
    }
}
