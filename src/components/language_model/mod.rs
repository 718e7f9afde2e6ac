pub mod models;
mod openai;

pub use models::{ChatMessage, Completion, FunctionCall, FunctionDefinition, Role};
pub use openai::OpenAiClient;

use crate::error::AppResult;
use async_trait::async_trait;

/// Chat-completion backend
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a conversation. When `functions` is given the model may answer
    /// with a function call instead of text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        functions: Option<&[FunctionDefinition]>,
    ) -> AppResult<Completion>;
}
