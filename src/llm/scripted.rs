//! In-process stand-ins for the external capabilities, used by tests.

use std::sync::Mutex;

use super::backend::{CompletionBackend, EmbeddingBackend, Prompt, ResponseFormat};
use crate::error::LlmError;

type Responder = Box<dyn Fn(&Prompt, usize) -> Result<String, LlmError> + Send + Sync>;

/// Completion backend answering from a closure and recording every prompt
pub struct ScriptedBackend {
    responder: Responder,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedBackend {
    /// The closure receives the prompt and the 0-based call number
    pub fn new(
        responder: impl Fn(&Prompt, usize) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, prompt: &Prompt, _format: ResponseFormat) -> Result<String, LlmError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.clone());
            prompts.len() - 1
        };
        (self.responder)(prompt, call)
    }
}

/// Embedding backend returning `[chars, words]`; texts containing `FAIL` error
pub struct ScriptedEmbedder;

impl EmbeddingBackend for ScriptedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if text.contains("FAIL") {
            return Err(LlmError::Api {
                status: 400,
                body: "rejected".to_string(),
            });
        }
        Ok(vec![
            text.chars().count() as f32,
            text.split_whitespace().count() as f32,
        ])
    }
}
