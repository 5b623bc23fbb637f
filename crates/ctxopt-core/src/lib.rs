//! # ctxopt-core
//!
//! Core retrieval and token-optimization pipeline: given a natural-language
//! query and a corpus of code chunks, produce a token-budget-respecting
//! prompt ready to hand to a downstream language model.
//!
//! ## Architecture
//!
//! Each module is one pipeline component, wired together by
//! [`orchestrator::Orchestrator::reconstruct_prompt`]:
//!
//! - **`config`** -- immutable tunable defaults, no file/env I/O
//! - **`types`** -- shared data model (chunks, intents, scores, prompts)
//! - **`token_estimator`** -- code/prose-aware token counting (C1)
//! - **`intent`** -- query classification and entity extraction (C2)
//! - **`vector_index`** -- in-memory chunk store and cosine search (C3)
//! - **`scorer`** -- multi-factor relevance scoring (C4)
//! - **`selector`** -- budget-constrained greedy selection (C5)
//! - **`compressor`** -- adaptive textual compression (C6)
//! - **`assembler`** -- deterministic prompt assembly (C7)
//! - **`router`** -- model-tier routing (C8)
//! - **`orchestrator`** -- end-to-end sequencing (C9)
//! - **`metrics`** -- append-only optimization log (C10)
//! - **`collaborators`** -- external trait contracts (embeddings, clock, cancellation)
//! - **`error`** -- the shared error taxonomy

// Workspace lints are inherited from Cargo.toml

pub mod assembler;
pub mod collaborators;
pub mod compressor;
pub mod config;
pub mod error;
pub mod intent;
pub mod metrics;
pub mod orchestrator;
pub mod router;
pub mod scorer;
pub mod selector;
pub mod token_estimator;
pub mod types;
pub mod vector_index;

pub use collaborators::{CancellationToken, Clock, Corpus, EmbeddingProvider, FixedClock, SystemClock};
pub use config::PipelineConfig;
pub use error::{OmniError, OmniResult};
pub use metrics::{MetricsRecorder, MetricsSummary};
pub use orchestrator::Orchestrator;
pub use vector_index::VectorIndex;
