//! External collaborator contracts.
//!
//! The core consumes these abstractions but never implements them: a
//! caller wires in a real embedding backend, a real clock, and a real
//! chunk source. Test doubles for each live alongside their trait so
//! unit tests don't need a network or a filesystem.

use crate::error::OmniResult;
use crate::types::CodeChunk;

/// Turns text into dense embedding vectors. The core calls this once
/// to embed a user query; the caller is responsible for having used the
/// same provider to embed every chunk already in the index.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts. All returned vectors share one dimension.
    fn embed(&self, texts: &[String]) -> OmniResult<Vec<Vec<f32>>>;

    /// The dimension this provider produces, when known ahead of call time.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

/// Supplies chunks to the orchestrator, either as a plain snapshot list
/// or as a handle to an index already populated in C3. The core
/// never parses source files itself.
pub enum Corpus<'a> {
    /// A caller-supplied snapshot of chunks, scored directly without a
    /// vector-index search pass.
    Snapshot(Vec<CodeChunk>),
    /// A reference to a live index; the orchestrator performs a C3
    /// search against it using the embedded query.
    Index(&'a crate::vector_index::VectorIndex),
}

/// Provides monotonic `now()`, for recency scoring and deterministic
/// tests.
pub trait Clock: Send + Sync {
    /// Current time as Unix milliseconds.
    fn now_millis(&self) -> i64;
}

/// A [`Clock`] backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// A [`Clock`] that always returns a fixed instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// Cooperative cancellation handle observed at chunk granularity by C3
/// search, C4 batch scoring, and C6 batch compression.
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoEmbeddingProvider;
    impl EmbeddingProvider for EchoEmbeddingProvider {
        fn embed(&self, texts: &[String]) -> OmniResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
        }
        fn dimension(&self) -> Option<usize> {
            Some(4)
        }
    }

    #[test]
    fn embedding_provider_trait_object_is_usable() {
        let provider: Box<dyn EmbeddingProvider> = Box::new(EchoEmbeddingProvider);
        let vectors = provider.embed(&["hello".to_string()]).unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(provider.dimension(), Some(4));
    }

    #[test]
    fn fixed_clock_is_stable() {
        let clock = FixedClock(42);
        assert_eq!(clock.now_millis(), 42);
        assert_eq!(clock.now_millis(), 42);
    }

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let first = clock.now_millis();
        assert!(first > 0);
    }
}
