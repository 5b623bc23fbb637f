//! Core domain types shared across all ctxopt-core subsystems.
//!
//! These types form the API contract between modules. Changing them
//! requires updating all consumers, so they should be stable and minimal.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Chunk types
// ---------------------------------------------------------------------------

/// The kind of code construct a chunk represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Function definition.
    Function,
    /// Class, struct, or record definition.
    Class,
    /// Method definition (function bound to a class/impl).
    Method,
    /// A standalone statement or statement group.
    Statement,
    /// An entire file treated as a single chunk.
    File,
}

impl ChunkKind {
    /// Convert to a stable string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Statement => "statement",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A semantically meaningful fragment of source code with a precomputed
/// embedding, as supplied by the external `ChunkSource` collaborator.
///
/// Immutable once inserted into a [`crate::vector_index::VectorIndex`]
/// : reinserting the same `id` replaces the prior entry wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    /// Stable id, unique within a live index.
    pub id: String,
    /// Canonicalized relative path.
    pub file_path: String,
    /// Name of the construct (function/class name, or a synthetic label
    /// for statement/file chunks).
    pub name: String,
    /// What kind of code construct this is.
    pub kind: ChunkKind,
    /// Language identifier (e.g. `"rust"`, `"python"`); empty if unknown.
    pub language: String,
    /// Starting line number (1-indexed, inclusive).
    pub start_line: u32,
    /// Ending line number (1-indexed, inclusive).
    pub end_line: u32,
    /// Raw source text.
    pub content: String,
    /// Dense embedding vector. Every chunk in one index shares dimension D.
    pub embedding: Vec<f32>,
    /// Opaque content hash, meaningful only to the collaborator that set it.
    pub checksum: String,
    /// Monotonic timestamp (Unix millis) when the chunk entered the index.
    pub created_at: i64,
    /// Identifiers extracted by the collaborator, used by the symbol
    /// relevance factor (C4).
    #[serde(default)]
    pub symbols: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Query intent (C2)
// ---------------------------------------------------------------------------

/// Classification of what the user is trying to accomplish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    /// Diagnosing or correcting broken behavior.
    BugFix,
    /// Adding new functionality.
    FeatureAdd,
    /// Understanding existing code.
    Explain,
    /// Restructuring code without changing behavior.
    Refactor,
    /// Writing or modifying tests.
    Test,
    /// A broad lookup query with no clearer classification.
    Search,
    /// No signal for any more specific type.
    General,
}

impl IntentType {
    /// Stable string identifier, used as a metrics key and in tie-break
    /// comparisons (lexicographic order of these names).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BugFix => "bug_fix",
            Self::FeatureAdd => "feature_add",
            Self::Explain => "explain",
            Self::Refactor => "refactor",
            Self::Test => "test",
            Self::Search => "search",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for IntentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far retrieval may range when looking for relevant chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Restricted to the file the user is currently looking at.
    CurrentFile,
    /// Restricted to the current working directory.
    CurrentDir,
    /// The whole project.
    Project,
    /// No restriction at all.
    Global,
}

impl Scope {
    /// Token-budget multiplier applied in `estimated_budget`.
    pub fn budget_multiplier(&self) -> f64 {
        match self {
            Self::CurrentFile => 0.5,
            Self::CurrentDir => 0.75,
            Self::Project => 1.0,
            Self::Global => 1.5,
        }
    }
}

/// The kind of thing an extracted query entity refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A quoted identifier, most likely a function/variable/symbol name.
    Symbol,
    /// A filename-with-extension pattern.
    File,
    /// A PascalCase token, most likely a type name.
    Type,
    /// A recognized programming-domain keyword.
    Keyword,
}

/// A single entity extracted from a query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEntity {
    /// What kind of entity this is.
    pub entity_type: EntityType,
    /// The extracted text.
    pub value: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Byte offset into the original query, if known.
    pub position: Option<usize>,
}

/// Compression aggressiveness knob derived from query complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Strip only comments and blank lines.
    Light,
    /// Collapse whitespace/imports, keep body edges.
    Medium,
    /// Keep signature and docstring only.
    Aggressive,
}

/// Selection/compression knobs derived from intent and scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentOptions {
    /// Maximum number of chunks the selector may include.
    pub max_chunks: usize,
    /// Minimum relevance score a candidate must clear to be considered.
    pub min_relevance: f64,
    /// Whether the selector should force cross-file diversity.
    pub prefer_diversity: bool,
    /// How aggressively the compressor should shrink chunk content.
    pub compression_level: CompressionLevel,
}

/// The result of classifying a raw query string (C2), read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntent {
    /// Classified intent type.
    pub intent_type: IntentType,
    /// Classified retrieval scope.
    pub scope: Scope,
    /// Entities extracted from the query, in extraction order.
    pub entities: Vec<QueryEntity>,
    /// Estimated query complexity in [0, 1].
    pub complexity: f64,
    /// Whether resolving this query requires prior conversation history.
    pub requires_history: bool,
    /// Suggested token budget for this query.
    pub estimated_budget: u32,
    /// Derived selection/compression knobs.
    pub options: IntentOptions,
}

// ---------------------------------------------------------------------------
// Scoring (C4)
// ---------------------------------------------------------------------------

/// Per-factor contributions to a chunk's relevance score , each
/// already clamped to `[0, 1]` before weighting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Cosine similarity from the vector index, already normalized.
    pub semantic: f64,
    /// Proximity of the chunk's file to the context's current file.
    pub proximity: f64,
    /// Symbol/entity match strength.
    pub symbol: f64,
    /// Recency of the chunk relative to now.
    pub recency: f64,
    /// Usage frequency (access count), saturating.
    pub frequency: f64,
}

/// A candidate chunk with its computed relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The underlying chunk.
    pub chunk: CodeChunk,
    /// Combined relevance score in `[0, 1]`.
    pub relevance_score: f64,
    /// How that score was computed.
    pub breakdown: ScoreBreakdown,
}

// ---------------------------------------------------------------------------
// Compression (C6)
// ---------------------------------------------------------------------------

/// A chunk after adaptive compression (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedChunk {
    /// Id of the chunk this was derived from.
    pub source_id: String,
    /// File path of the source chunk (carried through for C7 grouping).
    pub file_path: String,
    /// Starting line of the source chunk (carried through for C7 sorting).
    pub start_line: u32,
    /// Language identifier of the source chunk.
    pub language: String,
    /// Kind/name of the source chunk, for header rendering.
    pub kind: ChunkKind,
    /// Name of the source chunk, for header rendering.
    pub name: String,
    /// Relevance score of the source chunk, for C7 group ordering.
    pub relevance_score: f64,
    /// Compressed text, including the header line. Never longer than
    /// `original_tokens`.
    pub content: String,
    /// Token estimate of the original content.
    pub original_tokens: u32,
    /// Token estimate of `content`.
    pub compressed_tokens: u32,
    /// `original_tokens / compressed_tokens`, always `>= 1.0`.
    pub compression_ratio: f64,
}

// ---------------------------------------------------------------------------
// Model routing (C8)
// ---------------------------------------------------------------------------

/// An abstract downstream-model tier label chosen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelTier {
    /// A locally hosted model with no per-token cost.
    LocalFree,
    /// A free-tier cloud model.
    CloudFree,
    /// A low-cost cloud model.
    CheapCloud,
    /// A mid-range cloud model.
    BalancedCloud,
    /// The highest-capability cloud model.
    PremiumCloud,
}

impl ModelTier {
    /// Stable string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalFree => "local-free",
            Self::CloudFree => "cloud-free",
            Self::CheapCloud => "cheap-cloud",
            Self::BalancedCloud => "balanced-cloud",
            Self::PremiumCloud => "premium-cloud",
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing decision returned by the model router (C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Chosen model tier.
    pub model: ModelTier,
    /// Upstream provider label (e.g. `"local"`, `"cloud"`).
    pub provider: String,
    /// Human-readable reason for this choice.
    pub reason: String,
    /// Estimated cost in abstract cost units (0 for free tiers).
    pub estimated_cost: f64,
}

// ---------------------------------------------------------------------------
// Optimized prompt (orchestrator result)
// ---------------------------------------------------------------------------

/// Token savings achieved by the optimization pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Savings {
    /// Tokens saved versus sending all scored candidates verbatim. Never negative.
    pub tokens_saved: u32,
    /// `tokens_saved` as a percentage of the unoptimized token count, in `[0, 100]`.
    pub percentage: f64,
    /// Abstract cost saved, derived from `tokens_saved` and the chosen tier.
    pub cost_saved: f64,
}

/// The final result of `Orchestrator::reconstruct_prompt` (C9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedPrompt {
    /// The assembled prompt text.
    pub prompt: String,
    /// Estimated token count of `prompt`.
    pub tokens_used: u32,
    /// Chunks actually included, in the order they appear in `prompt`.
    pub chunks: Vec<CompressedChunk>,
    /// The routed model tier identifier.
    pub model: ModelTier,
    /// Computed savings relative to sending all scored candidates.
    pub savings: Savings,
    /// The full routing decision (includes `model` redundantly for convenience).
    pub routing: RoutingDecision,
}

// ---------------------------------------------------------------------------
// Vector index search (C3)
// ---------------------------------------------------------------------------

/// Filter options accepted by [`crate::vector_index::VectorIndex::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Maximum number of results to return (default 10).
    pub limit: Option<usize>,
    /// Optional glob over `CodeChunk::file_path` (`*` and `**` supported).
    pub path_glob: Option<String>,
    /// Optional exact-match language filter.
    pub language: Option<String>,
    /// Minimum semantic similarity a candidate must clear to be scored at all.
    pub min_relevance: Option<f64>,
}

/// One entry in a [`SearchResults`] response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// The matched chunk.
    pub chunk: CodeChunk,
    /// Combined relevance score (C4).
    pub score: f64,
    /// How that score was computed.
    pub breakdown: ScoreBreakdown,
}

/// Result of [`crate::vector_index::VectorIndex::search`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// Top `limit` hits, sorted by descending score with ascending id as
    /// a deterministic tie-break.
    pub hits: Vec<SearchHit>,
    /// Total entries that survived filtering before truncation to `limit`.
    pub total_evaluated: usize,
    /// Wall-clock time spent in the search call, in microseconds.
    pub search_time_micros: u64,
}

/// Snapshot of index-wide counters, returned by
/// [`crate::vector_index::VectorIndex::stats`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Total chunks currently stored.
    pub total: usize,
    /// Per-language chunk counts.
    pub by_language: std::collections::BTreeMap<String, usize>,
    /// Rough estimated memory footprint in bytes.
    pub index_size_bytes: usize,
    /// Monotonic timestamp of the most recent insert/delete, if any.
    pub last_updated: Option<i64>,
}

// ---------------------------------------------------------------------------
// Scoring context (C4 input)
// ---------------------------------------------------------------------------

/// Caller-supplied context the relevance scorer (C4) uses for the
/// proximity, recency, and frequency factors.
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    /// Path of the file the user currently has open, if any.
    pub current_file: Option<String>,
    /// Current working directory, used for directory-hop proximity.
    pub current_dir: Option<String>,
    /// Now, as Unix millis (supplied by the `Clock` collaborator).
    pub now: i64,
    /// Preferred language, currently unused by the scoring formula but
    /// threaded through for forward compatibility with per-language boosts.
    pub preferred_language: Option<String>,
}
