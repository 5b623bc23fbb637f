//! Pipeline orchestration: query in, assembled prompt out (C9).
//!
//! Sequences intent analysis, retrieval, scoring, selection,
//! compression, assembly, token accounting, and routing into one call.
//! Holds no state of its own beyond its config and collaborators; the
//! index (if any) and the metrics recorder are owned by the caller and
//! passed in or referenced.

use crate::assembler::PromptAssembler;
use crate::collaborators::{CancellationToken, Clock, Corpus, EmbeddingProvider};
use crate::compressor::AdaptiveCompressor;
use crate::config::{IntentDefaults, PipelineConfig};
use crate::error::{OmniError, OmniResult};
use crate::intent::IntentAnalyzer;
use crate::metrics::{build_record, MetricsRecorder};
use crate::router::ModelRouter;
use crate::scorer::RelevanceScorer;
use crate::selector::ChunkSelector;
use crate::token_estimator::TokenEstimator;
use crate::types::{
    CodeChunk, CompressedChunk, CompressionLevel, IntentOptions, ModelTier, OptimizedPrompt, QueryIntent,
    SearchOptions, ScoredChunk, ScoringContext, Savings,
};
use crate::vector_index::VectorIndex;

/// Wires every component into one `reconstruct_prompt` call (C9).
pub struct Orchestrator<'a> {
    config: PipelineConfig,
    embedding_provider: &'a dyn EmbeddingProvider,
    clock: &'a dyn Clock,
    metrics: &'a MetricsRecorder,
    local_tier_available: bool,
}

impl<'a> Orchestrator<'a> {
    /// Build an orchestrator. `local_tier_available` is the per-request
    /// probe result for the router's local-free tier, computed once
    /// and reused for the lifetime of this orchestrator instance.
    pub fn new(
        config: PipelineConfig,
        embedding_provider: &'a dyn EmbeddingProvider,
        clock: &'a dyn Clock,
        metrics: &'a MetricsRecorder,
        local_tier_available: bool,
    ) -> Self {
        Self { config, embedding_provider, clock, metrics, local_tier_available }
    }

    /// Run the full pipeline for `query` against `corpus`, respecting
    /// `budget` tokens and `cancellation`.
    ///
    /// On `Cancelled`, the index (if any) is left untouched and no
    /// metrics record is emitted. `ValidationError`/`IndexError` abort
    /// immediately; a per-chunk `CompressionError` never happens here
    /// because the compressor always falls back to an unchanged chunk
    /// rather than failing.
    pub fn reconstruct_prompt(
        &self,
        query: &str,
        corpus: Corpus<'_>,
        budget: u32,
        context: ScoringContext,
        cancellation: &CancellationToken,
    ) -> OmniResult<OptimizedPrompt> {
        if query.trim().is_empty() {
            return Err(OmniError::Validation { details: "query must not be empty".into() });
        }
        if budget == 0 {
            return Err(OmniError::Validation { details: "budget must be positive".into() });
        }

        let intent = self.analyze_intent(query);

        let candidates = self.gather_candidates(query, corpus, &intent, &context, cancellation)?;
        if cancellation.is_cancelled() {
            return Err(OmniError::Cancelled);
        }

        let estimator = TokenEstimator::new();
        let unoptimized_tokens: u32 =
            candidates.iter().map(|c| estimator.estimate(&c.chunk.content)).sum();

        let selector = ChunkSelector::new(
            self.config.selection,
            intent.options.max_chunks,
            intent.options.prefer_diversity,
            intent.options.min_relevance,
        );
        let selected = selector.select(candidates, i64::from(budget));
        if selected.is_empty() {
            return self.finish_empty(query, &intent, unoptimized_tokens);
        }

        if cancellation.is_cancelled() {
            return Err(OmniError::Cancelled);
        }

        let compressor = AdaptiveCompressor::new(self.config.compression);
        let per_chunk_budget = (budget / selected.len() as u32).max(1);
        let compressed = self.compress_with_cancellation(
            &compressor,
            &selected,
            per_chunk_budget,
            intent.options.compression_level,
            cancellation,
        )?;

        let assembled = PromptAssembler::new().assemble(query, &compressed);

        let router = ModelRouter::new(self.config.router_policy.clone());
        let routing = router.route(assembled.tokens_used, intent.complexity, self.local_tier_available);

        let savings = Self::compute_savings(unoptimized_tokens, assembled.tokens_used, routing.model);

        let record = build_record(
            unoptimized_tokens,
            assembled.tokens_used,
            intent.intent_type,
            self.clock.now_millis(),
        );
        self.metrics.record(record);
        tracing::info!(
            intent = intent.intent_type.as_str(),
            tokens_used = assembled.tokens_used,
            model = routing.model.as_str(),
            "reconstructed prompt"
        );

        Ok(OptimizedPrompt {
            prompt: assembled.prompt,
            tokens_used: assembled.tokens_used,
            chunks: compressed,
            model: routing.model,
            savings,
            routing,
        })
    }

    fn analyze_intent(&self, query: &str) -> QueryIntent {
        let mut intent = IntentAnalyzer::new().analyze(query, &[]);
        if intent.options.min_relevance < self.config.intent_defaults.min_relevance {
            intent.options.min_relevance = self.config.intent_defaults.min_relevance;
        }
        intent
    }

    fn gather_candidates(
        &self,
        query: &str,
        corpus: Corpus<'_>,
        intent: &QueryIntent,
        context: &ScoringContext,
        cancellation: &CancellationToken,
    ) -> OmniResult<Vec<ScoredChunk>> {
        match corpus {
            Corpus::Index(index) => self.search_index(query, index, intent, context, cancellation),
            Corpus::Snapshot(chunks) => self.score_snapshot(&chunks, intent, context, cancellation),
        }
    }

    fn search_index(
        &self,
        query: &str,
        index: &VectorIndex,
        intent: &QueryIntent,
        context: &ScoringContext,
        cancellation: &CancellationToken,
    ) -> OmniResult<Vec<ScoredChunk>> {
        let vectors = self
            .embedding_provider
            .embed(&[query.to_string()])
            .map_err(|e| OmniError::Embedding { details: e.to_string() })?;
        let query_embedding = vectors.into_iter().next().unwrap_or_default();

        if cancellation.is_cancelled() {
            return Err(OmniError::Cancelled);
        }

        let options = SearchOptions {
            limit: Some(10_000),
            min_relevance: Some(intent.options.min_relevance),
            ..Default::default()
        };
        let results = index.search(&query_embedding, &options, intent, context, cancellation)?;
        Ok(results
            .hits
            .into_iter()
            .map(|hit| ScoredChunk { chunk: hit.chunk, relevance_score: hit.score, breakdown: hit.breakdown })
            .collect())
    }

    fn score_snapshot(
        &self,
        chunks: &[CodeChunk],
        intent: &QueryIntent,
        context: &ScoringContext,
        cancellation: &CancellationToken,
    ) -> OmniResult<Vec<ScoredChunk>> {
        if cancellation.is_cancelled() {
            return Err(OmniError::Cancelled);
        }
        let scorer = RelevanceScorer::new(self.config.scoring_weights);
        let semantics = vec![0.0; chunks.len()];
        let access_counts = vec![0u64; chunks.len()];
        scorer.score_batch(chunks.to_vec(), &semantics, intent, context, &access_counts, cancellation)
    }

    fn compress_with_cancellation(
        &self,
        compressor: &AdaptiveCompressor,
        selected: &[ScoredChunk],
        per_chunk_budget: u32,
        ceiling: CompressionLevel,
        cancellation: &CancellationToken,
    ) -> OmniResult<Vec<CompressedChunk>> {
        if cancellation.is_cancelled() {
            return Err(OmniError::Cancelled);
        }
        compressor.compress_batch(selected, per_chunk_budget, ceiling, cancellation)
    }

    fn finish_empty(
        &self,
        query: &str,
        intent: &QueryIntent,
        unoptimized_tokens: u32,
    ) -> OmniResult<OptimizedPrompt> {
        let assembled = PromptAssembler::new().assemble(query, &[]);
        let router = ModelRouter::new(self.config.router_policy.clone());
        let routing = router.route(assembled.tokens_used, intent.complexity, self.local_tier_available);
        let savings = Self::compute_savings(unoptimized_tokens, assembled.tokens_used, routing.model);
        self.metrics.record(build_record(
            unoptimized_tokens,
            assembled.tokens_used,
            intent.intent_type,
            self.clock.now_millis(),
        ));
        Ok(OptimizedPrompt {
            prompt: assembled.prompt,
            tokens_used: assembled.tokens_used,
            chunks: Vec::new(),
            model: routing.model,
            savings,
            routing,
        })
    }

    /// Savings relative to sending every scored candidate verbatim,
    /// clamped so a pathological expansion never reports negative
    /// savings.
    fn compute_savings(unoptimized_tokens: u32, optimized_tokens: u32, model: ModelTier) -> Savings {
        let tokens_saved = unoptimized_tokens.saturating_sub(optimized_tokens);
        let percentage = if unoptimized_tokens == 0 {
            0.0
        } else {
            (f64::from(tokens_saved) / f64::from(unoptimized_tokens) * 100.0).clamp(0.0, 100.0)
        };
        let per_thousand = match model {
            ModelTier::LocalFree | ModelTier::CloudFree => 0.0,
            ModelTier::CheapCloud => 0.001,
            ModelTier::BalancedCloud => 0.01,
            ModelTier::PremiumCloud => 0.03,
        };
        let cost_saved = (f64::from(tokens_saved) / 1000.0) * per_thousand;
        Savings { tokens_saved, percentage, cost_saved }
    }

    /// Default intent-derived options for a raw intent type, exposed for
    /// callers that want to preview the knobs before running the full
    /// pipeline (e.g. a CLI `--explain-intent` flag).
    pub fn default_options_for(intent_type: crate::types::IntentType, scope: crate::types::Scope) -> IntentOptions {
        let table = IntentDefaults::for_type(intent_type);
        IntentOptions {
            max_chunks: table.max_chunks,
            min_relevance: IntentDefaults::default().min_relevance,
            prefer_diversity: IntentDefaults::prefer_diversity_for_scope(scope),
            compression_level: IntentDefaults::compression_level_for_complexity(0.0),
        }
    }
}
