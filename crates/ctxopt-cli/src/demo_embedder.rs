//! Toy deterministic embedding provider for the demo CLI.
//!
//! Real deployments plug in an actual embedding model behind
//! `EmbeddingProvider`; this hashes each text into a fixed-dimension
//! vector so the pipeline can be exercised end-to-end without one.

use ctxopt_core::error::OmniResult;
use ctxopt_core::EmbeddingProvider;
use sha2::{Digest, Sha256};

/// Embeds text by hashing it into `dimension` pseudo-random floats in
/// `[-1, 1]`. Two equal texts always produce the same vector;
/// unrelated texts are very unlikely to collide.
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    /// Build a provider producing vectors of `dimension` floats.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = Vec::with_capacity(self.dimension);
        let mut counter: u32 = 0;
        while vector.len() < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for chunk in digest.chunks(4) {
                if vector.len() >= self.dimension {
                    break;
                }
                let mut bytes = [0u8; 4];
                bytes[..chunk.len()].copy_from_slice(chunk);
                let raw = u32::from_le_bytes(bytes);
                let normalized = (raw as f64 / u32::MAX as f64) * 2.0 - 1.0;
                vector.push(normalized as f32);
            }
            counter += 1;
        }
        vector
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn embed(&self, texts: &[String]) -> OmniResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

/// Short content hash used as a chunk's opaque checksum, independent of
/// the embedding.
pub fn content_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_yields_identical_embedding() {
        let provider = HashEmbeddingProvider::new(16);
        let a = provider.embed_one("fn foo() {}");
        let b = provider.embed_one("fn foo() {}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn different_text_yields_different_embedding() {
        let provider = HashEmbeddingProvider::new(16);
        let a = provider.embed_one("fn foo() {}");
        let b = provider.embed_one("fn bar() {}");
        assert_ne!(a, b);
    }

    #[test]
    fn checksum_is_stable_and_short() {
        let a = content_checksum("hello");
        let b = content_checksum("hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
