//! Text embedding trait

use crate::Result;
use async_trait::async_trait;

/// Dense embedding interface
///
/// The embedding dimension is fixed per process and must match the vector
/// collections declared at init.
#[async_trait]
pub trait TextEmbedder: Send + Sync + 'static {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Embedding dimension produced by this embedder
    fn dimension(&self) -> usize;
}
