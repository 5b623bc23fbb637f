//! Multi-factor relevance scoring (C4).
//!
//! Combines five independently-clamped factors into a single score in
//! `[0, 1]`. The weight table is the single authoritative source;
//! changing it here is the only place that matters.

use rayon::prelude::*;

use crate::collaborators::CancellationToken;
use crate::config::ScoringWeights;
use crate::error::{OmniError, OmniResult};
use crate::types::{CodeChunk, EntityType, QueryIntent, ScoreBreakdown, ScoredChunk, ScoringContext};

/// Combines semantic/symbol/proximity/recency/frequency into relevance
/// scores (C4).
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    weights: ScoringWeights,
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self { weights: ScoringWeights::default() }
    }
}

impl RelevanceScorer {
    /// Build a scorer with a specific weight table (tests and callers
    /// that override the defaults).
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Combine a breakdown's factors using this scorer's weights.
    pub fn combine(&self, breakdown: &ScoreBreakdown) -> f64 {
        let w = &self.weights;
        (w.semantic * breakdown.semantic.clamp(0.0, 1.0)
            + w.symbol * breakdown.symbol.clamp(0.0, 1.0)
            + w.proximity * breakdown.proximity.clamp(0.0, 1.0)
            + w.recency * breakdown.recency.clamp(0.0, 1.0)
            + w.frequency * breakdown.frequency.clamp(0.0, 1.0))
        .clamp(0.0, 1.0)
    }

    /// Build a [`ScoreBreakdown`] for `chunk`, given a precomputed
    /// `semantic` similarity (from C3) and query context.
    pub fn score_breakdown(
        &self,
        chunk: &CodeChunk,
        semantic: f64,
        intent: &QueryIntent,
        context: &ScoringContext,
        access_count: u64,
    ) -> ScoreBreakdown {
        ScoreBreakdown {
            semantic: semantic.clamp(0.0, 1.0),
            proximity: Self::proximity(chunk, context).clamp(0.0, 1.0),
            symbol: Self::symbol_match(chunk, intent).clamp(0.0, 1.0),
            recency: Self::recency(chunk, context).clamp(0.0, 1.0),
            frequency: Self::frequency(access_count).clamp(0.0, 1.0),
        }
    }

    /// Score a candidate that already carries a breakdown missing only
    /// the combined figure (used outside the index's own search path,
    /// e.g. when the orchestrator is given a `Vec<CodeChunk>` directly).
    pub fn score(
        &self,
        chunk: CodeChunk,
        semantic: f64,
        intent: &QueryIntent,
        context: &ScoringContext,
        access_count: u64,
    ) -> ScoredChunk {
        let breakdown = self.score_breakdown(&chunk, semantic, intent, context, access_count);
        let relevance_score = self.combine(&breakdown);
        ScoredChunk { chunk, relevance_score, breakdown }
    }

    /// Score a batch of candidates in parallel (batch scoring may
    /// run across worker threads; per-candidate results are independent).
    ///
    /// `cancellation` is checked once per candidate before it is scored;
    /// once observed cancelled, candidates at or after that point are
    /// never scored and the whole call returns `OmniError::Cancelled`.
    pub fn score_batch(
        &self,
        chunks: Vec<CodeChunk>,
        semantics: &[f64],
        intent: &QueryIntent,
        context: &ScoringContext,
        access_counts: &[u64],
        cancellation: &CancellationToken,
    ) -> OmniResult<Vec<ScoredChunk>> {
        let scored: Vec<Option<ScoredChunk>> = chunks
            .into_par_iter()
            .enumerate()
            .map(|(i, chunk)| {
                if cancellation.is_cancelled() {
                    return None;
                }
                let semantic = semantics.get(i).copied().unwrap_or(0.0);
                let access_count = access_counts.get(i).copied().unwrap_or(0);
                Some(self.score(chunk, semantic, intent, context, access_count))
            })
            .collect();

        if scored.iter().any(Option::is_none) {
            return Err(OmniError::Cancelled);
        }
        Ok(scored.into_iter().flatten().collect())
    }

    fn proximity(chunk: &CodeChunk, context: &ScoringContext) -> f64 {
        if let Some(current_file) = &context.current_file {
            if &chunk.file_path == current_file {
                return 1.0;
            }
        }
        let chunk_dir = Self::dirname(&chunk.file_path);
        if let Some(current_dir) = &context.current_dir {
            if chunk_dir == *current_dir {
                return 0.8;
            }
            let hop_distance = Self::directory_hop_distance(current_dir, &chunk_dir);
            return (0.5 * (1.0 - (hop_distance as f64 / 5.0).min(1.0))).max(0.1);
        }
        0.1
    }

    fn dirname(path: &str) -> String {
        match path.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => String::new(),
        }
    }

    /// Count of non-shared path segments between two directories, a
    /// simple proxy for "how many directory hops apart".
    fn directory_hop_distance(a: &str, b: &str) -> usize {
        let a_segs: Vec<&str> = a.split('/').filter(|s| !s.is_empty()).collect();
        let b_segs: Vec<&str> = b.split('/').filter(|s| !s.is_empty()).collect();
        let shared = a_segs.iter().zip(b_segs.iter()).take_while(|(x, y)| x == y).count();
        (a_segs.len() - shared) + (b_segs.len() - shared)
    }

    fn symbol_match(chunk: &CodeChunk, intent: &QueryIntent) -> f64 {
        let relevant_entities = intent
            .entities
            .iter()
            .filter(|e| matches!(e.entity_type, EntityType::Symbol | EntityType::Type));

        let mut best = 0.0f64;
        for entity in relevant_entities {
            let value_lower = entity.value.to_lowercase();
            let name_lower = chunk.name.to_lowercase();

            if name_lower == value_lower || chunk.symbols.iter().any(|s| s.to_lowercase() == value_lower) {
                return 1.0;
            }
            if name_lower.starts_with(&value_lower)
                || chunk.symbols.iter().any(|s| s.to_lowercase().starts_with(&value_lower))
            {
                best = best.max(0.7);
                continue;
            }
            let ratio = Self::levenshtein_ratio(&name_lower, &value_lower);
            if ratio >= 0.8 {
                best = best.max(0.5);
            }
        }
        best
    }

    /// `1 - levenshtein_distance / max(len_a, len_b)`, in `[0, 1]`.
    fn levenshtein_ratio(a: &str, b: &str) -> f64 {
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        let max_len = a.chars().count().max(b.chars().count());
        if max_len == 0 {
            return 1.0;
        }
        let distance = Self::levenshtein_distance(a, b);
        1.0 - (distance as f64 / max_len as f64)
    }

    fn levenshtein_distance(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let (m, n) = (a.len(), b.len());
        let mut row: Vec<usize> = (0..=n).collect();
        for i in 1..=m {
            let mut prev_diag = row[0];
            row[0] = i;
            for j in 1..=n {
                let temp = row[j];
                row[j] = if a[i - 1] == b[j - 1] {
                    prev_diag
                } else {
                    1 + prev_diag.min(row[j]).min(row[j - 1])
                };
                prev_diag = temp;
            }
        }
        row[n]
    }

    fn recency(chunk: &CodeChunk, context: &ScoringContext) -> f64 {
        let elapsed_ms = (context.now - chunk.created_at).max(0) as f64;
        let days_since = elapsed_ms / (1000.0 * 60.0 * 60.0 * 24.0);
        (-0.1 * days_since).exp().clamp(0.0, 1.0)
    }

    fn frequency(access_count: u64) -> f64 {
        (access_count as f64 / 100.0).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkKind;

    fn chunk(name: &str, path: &str, created_at: i64) -> CodeChunk {
        CodeChunk {
            id: name.to_string(),
            file_path: path.to_string(),
            name: name.to_string(),
            kind: ChunkKind::Function,
            language: "rust".to_string(),
            start_line: 1,
            end_line: 5,
            content: "fn x() {}".to_string(),
            embedding: vec![1.0, 0.0],
            checksum: "abc".to_string(),
            created_at,
            symbols: Default::default(),
        }
    }

    #[test]
    fn combine_matches_weighted_sum() {
        let scorer = RelevanceScorer::default();
        let breakdown = ScoreBreakdown {
            semantic: 1.0,
            symbol: 1.0,
            proximity: 1.0,
            recency: 1.0,
            frequency: 1.0,
        };
        assert!((scorer.combine(&breakdown) - 1.0).abs() < 1e-9);

        let breakdown2 = ScoreBreakdown { semantic: 0.5, symbol: 0.0, proximity: 0.0, recency: 0.0, frequency: 0.0 };
        assert!((scorer.combine(&breakdown2) - 0.20).abs() < 1e-9);
    }

    #[test]
    fn proximity_same_file_is_one() {
        let c = chunk("f", "src/a.rs", 0);
        let ctx = ScoringContext { current_file: Some("src/a.rs".to_string()), now: 0, ..Default::default() };
        assert_eq!(RelevanceScorer::proximity(&c, &ctx), 1.0);
    }

    #[test]
    fn proximity_same_dir_is_point_eight() {
        let c = chunk("f", "src/a.rs", 0);
        let ctx = ScoringContext {
            current_file: Some("src/b.rs".to_string()),
            current_dir: Some("src".to_string()),
            now: 0,
            ..Default::default()
        };
        assert_eq!(RelevanceScorer::proximity(&c, &ctx), 0.8);
    }

    #[test]
    fn symbol_exact_match_is_one() {
        let c = chunk("parse_token", "src/a.rs", 0);
        let intent = crate::intent::IntentAnalyzer::new().analyze("what does `parse_token` do", &[]);
        assert_eq!(RelevanceScorer::symbol_match(&c, &intent), 1.0);
    }

    #[test]
    fn recency_decays_with_age() {
        let fresh = chunk("f", "src/a.rs", 0);
        let one_day_ms = 1000 * 60 * 60 * 24;
        let ctx_now = ScoringContext { now: 0, ..Default::default() };
        let ctx_later = ScoringContext { now: one_day_ms, ..Default::default() };
        let r_now = RelevanceScorer::recency(&fresh, &ctx_now);
        let r_later = RelevanceScorer::recency(&fresh, &ctx_later);
        assert!(r_now > r_later);
        assert!((r_now - 1.0).abs() < 1e-9);
    }

    #[test]
    fn frequency_saturates_at_one() {
        assert_eq!(RelevanceScorer::frequency(200), 1.0);
        assert!((RelevanceScorer::frequency(50) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn levenshtein_ratio_identical_strings_is_one() {
        assert!((RelevanceScorer::levenshtein_ratio("parse", "parse") - 1.0).abs() < 1e-9);
    }
}
