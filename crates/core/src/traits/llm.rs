//! Language model trait

use crate::llm_types::{GenerateRequest, GenerateResponse};
use crate::Result;
use async_trait::async_trait;

/// Chat-style language model interface
///
/// The contradiction probe and reply synthesis both run through this trait;
/// tests supply scripted implementations.
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Generate a response for a chat-style request
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Check whether the backing model is reachable
    async fn is_available(&self) -> bool {
        true
    }

    /// Model name for logging
    fn model_name(&self) -> &str;

    /// Rough token estimate (~4 characters per token for Latin text)
    fn estimate_tokens(&self, text: &str) -> usize {
        use unicode_segmentation::UnicodeSegmentation;
        text.graphemes(true).count().max(1) / 4
    }
}
