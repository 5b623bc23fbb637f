//! Budget-constrained greedy chunk selection (C5).
//!
//! A fractional-knapsack-style greedy pass over chunks ranked by score
//! density (relevance per token), with a small overage allowance for
//! very-high-score chunks and an optional diversity rebuild.

use crate::config::SelectionDefaults;
use crate::token_estimator::TokenEstimator;
use crate::types::ScoredChunk;

/// Picks a budget-respecting subset of scored candidates (C5).
#[derive(Debug, Clone)]
pub struct ChunkSelector {
    defaults: SelectionDefaults,
    max_chunks: usize,
    prefer_diversity: bool,
    min_relevance: f64,
}

impl ChunkSelector {
    /// Build a selector from intent-derived options. `max_chunks = 0`
    /// means unbounded. `min_relevance` is the intent-derived floor
    /// (`QueryIntent.options.min_relevance`), not `defaults.min_relevance`
    /// — the latter only supplies the selector's other static knobs.
    pub fn new(defaults: SelectionDefaults, max_chunks: usize, prefer_diversity: bool, min_relevance: f64) -> Self {
        Self { defaults, max_chunks, prefer_diversity, min_relevance }
    }

    /// Select chunks from `candidates` subject to token budget `budget`.
    pub fn select(&self, candidates: Vec<ScoredChunk>, budget: i64) -> Vec<ScoredChunk> {
        if candidates.is_empty() || budget <= 0 {
            return Vec::new();
        }
        let budget = budget as f64;
        let estimator = TokenEstimator::new();

        let min_relevance = self.min_relevance;
        let mut filtered: Vec<ScoredChunk> = candidates
            .iter()
            .filter(|c| c.relevance_score >= min_relevance)
            .cloned()
            .collect();
        if filtered.is_empty() {
            if let Some(best) = Self::highest_density(&candidates, &estimator) {
                filtered.push(best);
            } else {
                return Vec::new();
            }
        }

        let mut densities: Vec<(ScoredChunk, u32, f64)> = filtered
            .into_iter()
            .map(|c| {
                let tokens = estimator.estimate(&c.chunk.content);
                let density = Self::density(c.relevance_score, tokens);
                (c, tokens, density)
            })
            .collect();

        densities.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });

        let overage_budget = budget * (1.0 + self.defaults.overage_allowance);
        let early_stop = budget * self.defaults.early_stop_fraction;
        let max_chunks = if self.max_chunks == 0 { usize::MAX } else { self.max_chunks };

        let mut selected: Vec<(ScoredChunk, u32)> = Vec::new();
        let mut spent = 0f64;
        for (chunk, tokens, _density) in &densities {
            if selected.len() >= max_chunks || spent >= early_stop {
                break;
            }
            let cost = *tokens as f64;
            if spent + cost <= budget {
                spent += cost;
                selected.push((chunk.clone(), *tokens));
            } else if spent + cost <= overage_budget && chunk.relevance_score > self.defaults.overage_score_threshold {
                spent += cost;
                selected.push((chunk.clone(), *tokens));
            }
        }

        if selected.is_empty() {
            if let Some((chunk, tokens, _)) = densities.first() {
                selected.push((chunk.clone(), *tokens));
            }
        }

        let mut selected: Vec<ScoredChunk> = if self.prefer_diversity && selected.len() >= 2 {
            self.maybe_rebuild_for_diversity(selected, &densities, budget, early_stop)
        } else {
            selected.into_iter().map(|(c, _)| c).collect()
        };

        selected.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        selected
    }

    fn highest_density(candidates: &[ScoredChunk], estimator: &TokenEstimator) -> Option<ScoredChunk> {
        candidates
            .iter()
            .max_by(|a, b| {
                let da = Self::density(a.relevance_score, estimator.estimate(&a.chunk.content));
                let db = Self::density(b.relevance_score, estimator.estimate(&b.chunk.content));
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
    }

    fn density(relevance_score: f64, tokens: u32) -> f64 {
        if tokens == 0 {
            relevance_score * 1000.0
        } else {
            relevance_score / (tokens as f64).max(1.0)
        }
    }

    /// Rebuild for cross-file diversity when the current selection is
    /// dominated by too few distinct files.
    fn maybe_rebuild_for_diversity(
        &self,
        selected: Vec<(ScoredChunk, u32)>,
        ranked: &[(ScoredChunk, u32, f64)],
        budget: f64,
        early_stop: f64,
    ) -> Vec<ScoredChunk> {
        let distinct_files: std::collections::HashSet<&str> =
            selected.iter().map(|(c, _)| c.chunk.file_path.as_str()).collect();
        let diversity_floor = selected.len().min(5);
        if distinct_files.len() >= diversity_floor {
            return selected.into_iter().map(|(c, _)| c).collect();
        }

        let mut best_per_file: Vec<(ScoredChunk, u32)> = Vec::new();
        let mut seen_files = std::collections::HashSet::new();
        for (chunk, tokens, _) in ranked {
            if seen_files.insert(chunk.chunk.file_path.clone()) {
                best_per_file.push((chunk.clone(), *tokens));
            }
        }
        best_per_file.sort_by(|a, b| {
            b.0.relevance_score
                .partial_cmp(&a.0.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut rebuilt: Vec<(ScoredChunk, u32)> = Vec::new();
        let mut spent = 0f64;
        let mut taken_ids = std::collections::HashSet::new();
        for (chunk, tokens) in best_per_file {
            if spent >= early_stop {
                break;
            }
            let cost = tokens as f64;
            if spent + cost <= budget {
                spent += cost;
                taken_ids.insert(chunk.chunk.id.clone());
                rebuilt.push((chunk, tokens));
            }
        }

        for (chunk, tokens, _) in ranked {
            if spent >= early_stop {
                break;
            }
            if taken_ids.contains(&chunk.chunk.id) {
                continue;
            }
            let cost = *tokens as f64;
            if spent + cost <= budget {
                spent += cost;
                taken_ids.insert(chunk.chunk.id.clone());
                rebuilt.push((chunk.clone(), *tokens));
            }
        }

        rebuilt.into_iter().map(|(c, _)| c).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkKind, ScoreBreakdown};

    /// `target_tokens` is exact under the prose estimator's `ceil(chars/4)`
    /// rule as long as `target_tokens * 4` divides evenly (it does here).
    fn scored(id: &str, file: &str, score: f64, target_tokens: usize) -> ScoredChunk {
        ScoredChunk {
            chunk: crate::types::CodeChunk {
                id: id.to_string(),
                file_path: file.to_string(),
                name: id.to_string(),
                kind: ChunkKind::Function,
                language: "rust".to_string(),
                start_line: 1,
                end_line: 2,
                content: "x ".repeat(target_tokens * 2),
                embedding: vec![1.0],
                checksum: "c".to_string(),
                created_at: 0,
                symbols: Default::default(),
            },
            relevance_score: score,
            breakdown: ScoreBreakdown::default(),
        }
    }

    #[test]
    fn empty_candidates_yields_empty_selection() {
        let selector = ChunkSelector::new(SelectionDefaults::default(), 0, false, 0.0);
        assert!(selector.select(Vec::new(), 1000).is_empty());
    }

    #[test]
    fn nonpositive_budget_yields_empty_selection() {
        let selector = ChunkSelector::new(SelectionDefaults::default(), 0, false, 0.0);
        let candidates = vec![scored("a", "f.rs", 0.9, 100)];
        assert!(selector.select(candidates, 0).is_empty());
    }

    #[test]
    fn budget_cap_rejects_second_candidate_under_overage() {
        // (tokens, score): (300, 0.9), (400, 0.85), (400, 0.4); budget 500.
        let candidates = vec![
            scored("chunk1", "a.rs", 0.9, 300),
            scored("chunk2", "b.rs", 0.85, 400),
            scored("chunk3", "c.rs", 0.4, 400),
        ];
        let selector = ChunkSelector::new(SelectionDefaults::default(), 0, false, 0.0);
        let selected = selector.select(candidates, 500);
        let ids: Vec<&str> = selected.iter().map(|c| c.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["chunk1"]);
    }

    #[test]
    fn nonempty_when_any_candidate_exceeds_min_relevance() {
        let candidates = vec![scored("a", "f.rs", 0.5, 10)];
        let selector = ChunkSelector::new(SelectionDefaults::default(), 0, false, 0.3);
        assert!(!selector.select(candidates, 1000).is_empty());
    }

    #[test]
    fn selection_is_deterministic() {
        let candidates = vec![
            scored("a", "f.rs", 0.9, 50),
            scored("b", "g.rs", 0.9, 50),
            scored("c", "h.rs", 0.5, 20),
        ];
        let selector = ChunkSelector::new(SelectionDefaults::default(), 0, false, 0.0);
        let first = selector.select(candidates.clone(), 1000);
        let second = selector.select(candidates, 1000);
        let first_ids: Vec<&str> = first.iter().map(|c| c.chunk.id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|c| c.chunk.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn diversity_rebuild_includes_both_files() {
        let mut candidates = Vec::new();
        for i in 0..4 {
            candidates.push(scored(&format!("a{i}"), "fileA.rs", 0.9 - (i as f64 * 0.05), 100));
        }
        candidates.push(scored("b0", "fileB.rs", 0.6, 100));
        let selector = ChunkSelector::new(SelectionDefaults::default(), 0, true, 0.0);
        let selected = selector.select(candidates, 10_000);
        let files: std::collections::HashSet<&str> =
            selected.iter().map(|c| c.chunk.file_path.as_str()).collect();
        assert!(files.contains("fileA.rs"));
        assert!(files.contains("fileB.rs"));
    }
}
