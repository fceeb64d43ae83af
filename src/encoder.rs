//! Text encoder collaborator
//!
//! Turns publication titles into fixed-length embedding vectors. The core
//! consumes this as an opaque, order-preserving batch function and never
//! looks inside: the encoder is the sole producer of embeddings. The
//! production backend is fastembed behind the `embeddings` feature; tests
//! use deterministic mocks.

use thiserror::Error;

/// Default embedding dimension (the sentence encoder produces 512-dim
/// vectors).
pub const DEFAULT_DIMENSIONS: usize = 512;

/// Errors from the text encoder
#[derive(Debug, Error)]
pub enum EncoderError {
    /// Model loading or inference failed; the batch can be retried.
    #[error("encoder unavailable: {0}")]
    Unavailable(String),

    /// The encoder returned no vectors for a non-empty batch.
    #[error("encoder returned no vectors")]
    EmptyResult,
}

/// Trait for encoding title text into vectors.
///
/// `encode` is batched and order-preserving: the i-th output vector belongs
/// to the i-th input title. Deterministic for identical input.
pub trait TextEncoder: Send + Sync {
    fn encode(&self, titles: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError>;
}

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use super::{EncoderError, TextEncoder};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Production encoder backed by fastembed (ONNX Runtime).
    ///
    /// Wraps `fastembed::TextEmbedding` in a `Mutex` because its `embed`
    /// method requires `&mut self`, while the `TextEncoder` trait uses
    /// `&self`.
    pub struct FastEmbedEncoder {
        model: Mutex<TextEmbedding>,
    }

    impl FastEmbedEncoder {
        /// Create an encoder with a specific model.
        pub fn new(model: EmbeddingModel) -> Result<Self, EncoderError> {
            let options = InitOptions::new(model).with_show_download_progress(false);
            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| EncoderError::Unavailable(e.to_string()))?;
            Ok(Self {
                model: Mutex::new(embedding),
            })
        }
    }

    impl TextEncoder for FastEmbedEncoder {
        fn encode(&self, titles: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError> {
            if titles.is_empty() {
                return Ok(Vec::new());
            }
            let mut model = self.model.lock().unwrap();
            let vectors = model
                .embed(titles.to_vec(), None)
                .map_err(|e| EncoderError::Unavailable(e.to_string()))?;
            if vectors.is_empty() {
                return Err(EncoderError::EmptyResult);
            }
            Ok(vectors)
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEncoder;
