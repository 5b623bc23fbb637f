//! In-memory vector index: chunk storage plus filtered brute-force
//! cosine-similarity search (C3).
//!
//! The public operation set (`insert`/`insert_batch`/`get`/`delete`/
//! `clear`/`search`/`stats`) is a deliberate migration seam: a future
//! approximate-nearest-neighbor backend can implement the same surface
//! without callers noticing.

use std::collections::BTreeMap;
use std::time::Instant;

use globset::GlobBuilder;
use parking_lot::RwLock;

use crate::collaborators::CancellationToken;
use crate::error::{OmniError, OmniResult};
use crate::scorer::RelevanceScorer;
use crate::types::{
    CodeChunk, IndexStats, QueryIntent, ScoreBreakdown, ScoringContext, SearchHit, SearchOptions,
    SearchResults,
};

/// A stored chunk plus the mutable usage counters the frequency and
/// recency scoring factors read from (C3-internal `VectorEntry`).
#[derive(Debug, Clone)]
struct VectorEntry {
    chunk: CodeChunk,
    access_count: u64,
    last_accessed: Option<i64>,
}

struct IndexState {
    entries: BTreeMap<String, VectorEntry>,
    by_language: BTreeMap<String, usize>,
    last_updated: Option<i64>,
}

impl IndexState {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_language: BTreeMap::new(),
            last_updated: None,
        }
    }
}

/// In-memory chunk store with brute-force cosine similarity search.
///
/// Insertion, deletion, and search are serialized against each other
/// through a single `RwLock`; independent `VectorIndex` instances never
/// contend with one another.
pub struct VectorIndex {
    dimension: usize,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    /// Create an empty index expecting embeddings of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            state: RwLock::new(IndexState::new()),
        }
    }

    /// Dimension every embedding in this index must match.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert or replace `chunk`. Fails validation if `id`,
    /// `file_path`, or `content` is empty, or the embedding is absent
    /// or of the wrong dimension.
    pub fn insert(&self, chunk: CodeChunk, now: i64) -> OmniResult<()> {
        self.validate(&chunk)?;
        let mut state = self.state.write();
        if let Some(prior) = state.entries.get(&chunk.id) {
            Self::decrement_language(&mut state.by_language, &prior.chunk.language);
        }
        Self::increment_language(&mut state.by_language, &chunk.language);
        state.entries.insert(
            chunk.id.clone(),
            VectorEntry {
                chunk,
                access_count: 0,
                last_accessed: None,
            },
        );
        state.last_updated = Some(now);
        Ok(())
    }

    /// Insert a batch. Fails the whole batch (no partial mutation) if
    /// any id is duplicated within the batch itself, or any single
    /// chunk fails validation.
    pub fn insert_batch(&self, chunks: Vec<CodeChunk>, now: i64) -> OmniResult<()> {
        let mut seen = std::collections::HashSet::with_capacity(chunks.len());
        for chunk in &chunks {
            self.validate(chunk)?;
            if !seen.insert(chunk.id.clone()) {
                return Err(OmniError::Index {
                    details: format!("duplicate id '{}' within insert_batch", chunk.id),
                });
            }
        }
        let mut state = self.state.write();
        for chunk in chunks {
            if let Some(prior) = state.entries.get(&chunk.id) {
                Self::decrement_language(&mut state.by_language, &prior.chunk.language);
            }
            Self::increment_language(&mut state.by_language, &chunk.language);
            state.entries.insert(
                chunk.id.clone(),
                VectorEntry {
                    chunk,
                    access_count: 0,
                    last_accessed: None,
                },
            );
        }
        state.last_updated = Some(now);
        Ok(())
    }

    /// Fetch a chunk by id without affecting usage counters.
    pub fn get(&self, id: &str) -> Option<CodeChunk> {
        self.state.read().entries.get(id).map(|e| e.chunk.clone())
    }

    /// Remove a chunk by id. No-op if absent.
    pub fn delete(&self, id: &str, now: i64) {
        let mut state = self.state.write();
        if let Some(entry) = state.entries.remove(id) {
            Self::decrement_language(&mut state.by_language, &entry.chunk.language);
            state.last_updated = Some(now);
        }
    }

    /// Remove every entry.
    pub fn clear(&self, now: i64) {
        let mut state = self.state.write();
        state.entries.clear();
        state.by_language.clear();
        state.last_updated = Some(now);
    }

    /// Filtered brute-force cosine similarity search.
    ///
    /// An empty `query_embedding` returns empty results rather than an
    /// error. Every entry that passes all filters has its usage
    /// counters bumped, regardless of whether it makes the final
    /// top-`limit` cut. `cancellation` is checked before the scan starts
    /// and again at each entry boundary; once observed cancelled, no
    /// further entry is read or mutated and the call returns
    /// `OmniError::Cancelled` with whatever mutations happened strictly
    /// before cancellation was noticed.
    pub fn search(
        &self,
        query_embedding: &[f32],
        options: &SearchOptions,
        intent: &QueryIntent,
        scoring_context: &ScoringContext,
        cancellation: &CancellationToken,
    ) -> OmniResult<SearchResults> {
        let started = Instant::now();
        if cancellation.is_cancelled() {
            return Err(OmniError::Cancelled);
        }
        if query_embedding.is_empty() {
            return Ok(SearchResults {
                hits: Vec::new(),
                total_evaluated: 0,
                search_time_micros: started.elapsed().as_micros() as u64,
            });
        }

        let glob = options
            .path_glob
            .as_deref()
            .and_then(|pattern| GlobBuilder::new(pattern).literal_separator(false).build().ok())
            .map(|g| g.compile_matcher());
        let min_relevance = options.min_relevance.unwrap_or(0.0);
        let scorer = RelevanceScorer::default();

        let mut state = self.state.write();
        let now = scoring_context.now;
        let mut hits = Vec::new();
        let mut total_evaluated = 0usize;

        let ids: Vec<String> = state.entries.keys().cloned().collect();
        for id in ids {
            if cancellation.is_cancelled() {
                drop(state);
                return Err(OmniError::Cancelled);
            }

            let (semantic, passes_filters) = {
                let entry = state.entries.get(&id).expect("id from snapshot exists");
                let passes = glob
                    .as_ref()
                    .map_or(true, |g| g.is_match(&entry.chunk.file_path))
                    && options
                        .language
                        .as_deref()
                        .map_or(true, |lang| entry.chunk.language == lang);
                let semantic = if passes {
                    Self::cosine_similarity(query_embedding, &entry.chunk.embedding)
                } else {
                    0.0
                };
                (semantic, passes && semantic >= min_relevance)
            };
            if !passes_filters {
                continue;
            }
            total_evaluated += 1;

            let entry = state.entries.get_mut(&id).expect("id from snapshot exists");
            entry.access_count = entry.access_count.saturating_add(1);
            entry.last_accessed = Some(now);

            let breakdown = scorer.score_breakdown(
                &entry.chunk,
                semantic,
                intent,
                scoring_context,
                entry.access_count,
            );
            let score = scorer.combine(&breakdown);
            hits.push((entry.chunk.clone(), score, breakdown));
        }
        drop(state);

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });

        let limit = options.limit.unwrap_or(10);
        let hits: Vec<SearchHit> = hits
            .into_iter()
            .take(limit)
            .map(|(chunk, score, breakdown)| SearchHit { chunk, score, breakdown })
            .collect();

        Ok(SearchResults {
            hits,
            total_evaluated,
            search_time_micros: started.elapsed().as_micros() as u64,
        })
    }

    /// Snapshot of index-wide counters.
    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        let embedding_bytes: usize = state
            .entries
            .values()
            .map(|e| e.chunk.embedding.len() * std::mem::size_of::<f32>() + e.chunk.content.len())
            .sum();
        IndexStats {
            total: state.entries.len(),
            by_language: state.by_language.clone(),
            index_size_bytes: embedding_bytes,
            last_updated: state.last_updated,
        }
    }

    fn validate(&self, chunk: &CodeChunk) -> OmniResult<()> {
        if chunk.id.is_empty() {
            return Err(OmniError::Validation { details: "chunk id must not be empty".into() });
        }
        if chunk.file_path.is_empty() {
            return Err(OmniError::Validation { details: "chunk file_path must not be empty".into() });
        }
        if chunk.content.is_empty() {
            return Err(OmniError::Validation { details: "chunk content must not be empty".into() });
        }
        if chunk.embedding.is_empty() {
            return Err(OmniError::Validation {
                details: format!("chunk '{}' has an empty embedding", chunk.id),
            });
        }
        if chunk.embedding.len() != self.dimension {
            return Err(OmniError::Validation {
                details: format!(
                    "chunk '{}' embedding has dimension {}, expected {}",
                    chunk.id,
                    chunk.embedding.len(),
                    self.dimension
                ),
            });
        }
        Ok(())
    }

    fn increment_language(by_language: &mut BTreeMap<String, usize>, language: &str) {
        *by_language.entry(language.to_string()).or_insert(0) += 1;
    }

    fn decrement_language(by_language: &mut BTreeMap<String, usize>, language: &str) {
        if let Some(count) = by_language.get_mut(language) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                by_language.remove(language);
            }
        }
    }

    /// Cosine similarity clamped to `[0, 1]`; zero-norm vectors define
    /// similarity as 0 rather than dividing by zero.
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let mut dot = 0f64;
        let mut norm_a = 0f64;
        let mut norm_b = 0f64;
        for (x, y) in a.iter().zip(b.iter()) {
            let x = *x as f64;
            let y = *y as f64;
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        let cosine = dot / (norm_a.sqrt() * norm_b.sqrt());
        cosine.max(0.0).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkKind;

    fn chunk(id: &str, embedding: Vec<f32>) -> CodeChunk {
        CodeChunk {
            id: id.to_string(),
            file_path: format!("src/{id}.rs"),
            name: id.to_string(),
            kind: ChunkKind::Function,
            language: "rust".to_string(),
            start_line: 1,
            end_line: 10,
            content: format!("fn {id}() {{}}"),
            embedding,
            checksum: "deadbeef".to_string(),
            created_at: 0,
            symbols: Default::default(),
        }
    }

    fn default_intent() -> QueryIntent {
        IntentAnalyzerStub::general()
    }

    struct IntentAnalyzerStub;
    impl IntentAnalyzerStub {
        fn general() -> QueryIntent {
            crate::intent::IntentAnalyzer::new().analyze("find something", &[])
        }
    }

    #[test]
    fn empty_index_search_returns_empty() {
        let index = VectorIndex::new(4);
        let options = SearchOptions { limit: Some(5), ..Default::default() };
        let ctx = ScoringContext { now: 0, ..Default::default() };
        let result = index
            .search(&[0.1, 0.1, 0.1, 0.1], &options, &default_intent(), &ctx, &CancellationToken::new())
            .unwrap();
        assert!(result.hits.is_empty());
        assert_eq!(result.total_evaluated, 0);
    }

    #[test]
    fn min_relevance_filters_out_orthogonal_chunk() {
        let index = VectorIndex::new(4);
        index.insert(chunk("a", vec![1.0, 0.0, 0.0, 0.0]), 0).unwrap();
        index.insert(chunk("b", vec![0.0, 1.0, 0.0, 0.0]), 0).unwrap();
        let options = SearchOptions { min_relevance: Some(0.5), ..Default::default() };
        let ctx = ScoringContext { now: 0, ..Default::default() };
        let result = index
            .search(&[1.0, 0.0, 0.0, 0.0], &options, &default_intent(), &ctx, &CancellationToken::new())
            .unwrap();
        let ids: Vec<&str> = result.hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn insert_then_delete_restores_empty_state() {
        let index = VectorIndex::new(4);
        let c = chunk("a", vec![1.0, 0.0, 0.0, 0.0]);
        index.insert(c.clone(), 0).unwrap();
        index.delete(&c.id, 1);
        assert!(index.get(&c.id).is_none());
        assert_eq!(index.stats().total, 0);
    }

    #[test]
    fn reinsert_replaces_prior_entry_and_adjusts_language_counts() {
        let index = VectorIndex::new(4);
        let mut c = chunk("a", vec![1.0, 0.0, 0.0, 0.0]);
        index.insert(c.clone(), 0).unwrap();
        c.language = "python".to_string();
        index.insert(c, 1).unwrap();
        let stats = index.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_language.get("python"), Some(&1));
        assert_eq!(stats.by_language.get("rust"), None);
    }

    #[test]
    fn insert_rejects_wrong_dimension() {
        let index = VectorIndex::new(4);
        let err = index.insert(chunk("a", vec![1.0, 0.0]), 0).unwrap_err();
        assert!(matches!(err, OmniError::Validation { .. }));
    }

    #[test]
    fn insert_batch_rejects_duplicate_id_in_batch() {
        let index = VectorIndex::new(4);
        let chunks = vec![
            chunk("a", vec![1.0, 0.0, 0.0, 0.0]),
            chunk("a", vec![0.0, 1.0, 0.0, 0.0]),
        ];
        let err = index.insert_batch(chunks, 0).unwrap_err();
        assert!(matches!(err, OmniError::Index { .. }));
        assert_eq!(index.stats().total, 0);
    }

    #[test]
    fn cosine_similarity_self_is_one_orthogonal_is_zero() {
        let v = vec![0.5f32, 0.5, 0.5, 0.5];
        assert!((VectorIndex::cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        let orth = vec![1.0f32, -1.0, 0.0, 0.0];
        let other = vec![1.0f32, 1.0, 0.0, 0.0];
        assert!(VectorIndex::cosine_similarity(&orth, &other).abs() < 1e-6);
    }

    #[test]
    fn search_respects_limit_and_is_sorted_non_increasing() {
        let index = VectorIndex::new(4);
        for i in 0..5 {
            index
                .insert(chunk(&format!("c{i}"), vec![1.0, 0.0, 0.0, 0.0]), 0)
                .unwrap();
        }
        let options = SearchOptions { limit: Some(3), ..Default::default() };
        let ctx = ScoringContext { now: 0, ..Default::default() };
        let result = index
            .search(&[1.0, 0.0, 0.0, 0.0], &options, &default_intent(), &ctx, &CancellationToken::new())
            .unwrap();
        assert!(result.hits.len() <= 3);
        for pair in result.hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn cancelled_token_aborts_search_without_mutating_access_counts() {
        let index = VectorIndex::new(4);
        for i in 0..5 {
            index
                .insert(chunk(&format!("c{i}"), vec![1.0, 0.0, 0.0, 0.0]), 0)
                .unwrap();
        }
        let options = SearchOptions { limit: Some(3), ..Default::default() };
        let ctx = ScoringContext { now: 0, ..Default::default() };
        let token = CancellationToken::new();
        token.cancel();
        let result = index.search(&[1.0, 0.0, 0.0, 0.0], &options, &default_intent(), &ctx, &token);
        assert!(matches!(result, Err(OmniError::Cancelled)));
        assert_eq!(index.stats().total, 5);
    }
}
