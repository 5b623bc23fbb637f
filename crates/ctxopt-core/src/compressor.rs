//! Adaptive textual compression of selected chunks (C6).
//!
//! Three passes — light, medium, aggressive — applied in order and
//! stopped as soon as the per-chunk token budget is met. Each pass is a
//! public method (there is no private fallback helper the orchestrating
//! `compress` reaches into) so callers can pick a specific aggressiveness
//! directly instead of only the auto-escalating default.

use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;

use crate::collaborators::CancellationToken;
use crate::config::CompressionDefaults;
use crate::error::{OmniError, OmniResult};
use crate::token_estimator::TokenEstimator;
use crate::types::{CompressedChunk, CompressionLevel, ScoredChunk};

static LINE_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(//|#)[^\n]*$").expect("static regex"));
static BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("static regex"));
static IMPORT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(use|import|from .* import|require)\b[^\n]*$").expect("static regex"));
static WHITESPACE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("static regex"));
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// Applies light/medium/aggressive compression passes to selected
/// chunks, never producing output longer than the input.
#[derive(Debug, Clone)]
pub struct AdaptiveCompressor {
    defaults: CompressionDefaults,
}

impl Default for AdaptiveCompressor {
    fn default() -> Self {
        Self { defaults: CompressionDefaults::default() }
    }
}

impl AdaptiveCompressor {
    /// Build a compressor with specific knobs.
    pub fn new(defaults: CompressionDefaults) -> Self {
        Self { defaults }
    }

    /// Compress `chunk` to fit within `budget` tokens, trying light then
    /// medium then aggressive, stopping as soon as a pass meets budget or
    /// `ceiling` is reached, whichever comes first. A query classified
    /// as wanting only light compression never escalates to medium or
    /// aggressive even if the chunk still overruns its budget.
    pub fn compress(&self, chunk: &ScoredChunk, budget: u32, ceiling: CompressionLevel) -> CompressedChunk {
        let estimator = TokenEstimator::new();
        let original_tokens = estimator.estimate(&chunk.chunk.content);
        let header = Self::header_line(chunk);

        if original_tokens <= budget {
            let content = format!("{header}\n{}", chunk.chunk.content);
            let compressed_tokens = estimator.estimate(&content);
            return Self::finish(chunk, content, original_tokens, compressed_tokens.min(original_tokens));
        }

        let light = self.compress_light(chunk);
        if light.compressed_tokens <= budget || ceiling == CompressionLevel::Light {
            return light;
        }
        let medium = self.compress_medium(chunk);
        if medium.compressed_tokens <= budget || ceiling == CompressionLevel::Medium {
            return Self::keep_better(light, medium);
        }
        let aggressive = self.compress_aggressive(chunk);
        Self::keep_better(medium, aggressive)
    }

    /// Compress a batch in parallel (batch compression may run across
    /// worker threads), each chunk capped at `ceiling`.
    ///
    /// `cancellation` is checked once per chunk before it is compressed;
    /// once observed cancelled, chunks at or after that point are never
    /// compressed and the whole call returns `OmniError::Cancelled`.
    pub fn compress_batch(
        &self,
        chunks: &[ScoredChunk],
        per_chunk_budget: u32,
        ceiling: CompressionLevel,
        cancellation: &CancellationToken,
    ) -> OmniResult<Vec<CompressedChunk>> {
        let compressed: Vec<Option<CompressedChunk>> = chunks
            .par_iter()
            .map(|c| {
                if cancellation.is_cancelled() {
                    return None;
                }
                Some(self.compress(c, per_chunk_budget, ceiling))
            })
            .collect();

        if compressed.iter().any(Option::is_none) {
            return Err(OmniError::Cancelled);
        }
        Ok(compressed.into_iter().flatten().collect())
    }

    /// Strip line/block comments and collapse blank lines; preserve
    /// signatures and string literals. Typical ratio 1.1-1.5x.
    pub fn compress_light(&self, chunk: &ScoredChunk) -> CompressedChunk {
        let estimator = TokenEstimator::new();
        let original_tokens = estimator.estimate(&chunk.chunk.content);
        let header = Self::header_line(chunk);

        let without_block_comments = BLOCK_COMMENT_RE.replace_all(&chunk.chunk.content, "");
        let without_line_comments = LINE_COMMENT_RE.replace_all(&without_block_comments, "");
        let collapsed = BLANK_LINES_RE.replace_all(&without_line_comments, "\n\n");
        let body = collapsed.trim().to_string();

        let content = if body.is_empty() {
            header.clone()
        } else {
            format!("{header}\n{body}")
        };
        let compressed_tokens = estimator.estimate(&content);
        Self::finish_or_fallback(chunk, content, original_tokens, compressed_tokens)
    }

    /// Collapse whitespace runs, inline imports (unless
    /// `preserve_imports`), and keep only the first/last few body
    /// statements. Typical ratio 1.5-3x.
    pub fn compress_medium(&self, chunk: &ScoredChunk) -> CompressedChunk {
        let estimator = TokenEstimator::new();
        let original_tokens = estimator.estimate(&chunk.chunk.content);
        let header = Self::header_line(chunk);

        let mut text = BLOCK_COMMENT_RE.replace_all(&chunk.chunk.content, "").into_owned();
        text = LINE_COMMENT_RE.replace_all(&text, "").into_owned();
        if !self.defaults.preserve_imports {
            text = IMPORT_LINE_RE.replace_all(&text, "").into_owned();
        }
        text = WHITESPACE_RUN_RE.replace_all(&text, " ").into_owned();

        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let body = if lines.len() > 6 {
            let head = lines[..3].join("\n");
            let tail = lines[lines.len() - 3..].join("\n");
            format!("{head}\n// ...\n{tail}")
        } else {
            lines.join("\n")
        };

        let content = if body.is_empty() {
            header.clone()
        } else {
            format!("{header}\n{body}")
        };
        let compressed_tokens = estimator.estimate(&content);
        Self::finish_or_fallback(chunk, content, original_tokens, compressed_tokens)
    }

    /// Keep only the signature and docstring (or first/last three body
    /// lines when there is no docstring), annotated with a compression
    /// ratio header. Typical ratio 3-10x.
    pub fn compress_aggressive(&self, chunk: &ScoredChunk) -> CompressedChunk {
        let estimator = TokenEstimator::new();
        let original_tokens = estimator.estimate(&chunk.chunk.content);
        let header = Self::header_line(chunk);

        let lines: Vec<&str> = chunk.chunk.content.lines().collect();
        let signature = lines.first().copied().unwrap_or("").to_string();
        let docstring = Self::leading_docstring(&lines);

        let body = if let Some(doc) = docstring {
            format!("{signature}\n{doc}")
        } else if lines.len() > 6 {
            let head = lines[..3].join("\n");
            let tail = lines[lines.len() - 3..].join("\n");
            format!("{head}\n// ...\n{tail}")
        } else {
            signature.clone()
        };

        let ratio_pct = if original_tokens > 0 {
            100.0 - (estimator.estimate(&body) as f64 / original_tokens as f64 * 100.0)
        } else {
            0.0
        };
        let annotation = format!(
            "/* compressed: {ratio_pct:.0}% ({}:{}-{}) */",
            chunk.chunk.file_path, chunk.chunk.start_line, chunk.chunk.end_line
        );

        let content = format!("{header}\n{annotation}\n{body}");
        let compressed_tokens = estimator.estimate(&content);
        Self::finish_or_fallback(chunk, content, original_tokens, compressed_tokens)
    }

    fn leading_docstring(lines: &[&str]) -> Option<String> {
        let doc_lines: Vec<&str> = lines
            .iter()
            .skip(1)
            .take_while(|l| {
                let t = l.trim_start();
                t.starts_with("///") || t.starts_with("//!") || t.starts_with('#') || t.starts_with("\"\"\"")
            })
            .copied()
            .collect();
        if doc_lines.is_empty() {
            None
        } else {
            Some(doc_lines.join("\n"))
        }
    }

    fn header_line(chunk: &ScoredChunk) -> String {
        format!(
            "// {}:{}-{} ({}: {})",
            chunk.chunk.file_path,
            chunk.chunk.start_line,
            chunk.chunk.end_line,
            chunk.chunk.kind,
            chunk.chunk.name
        )
    }

    /// If the candidate pass didn't actually shrink the content relative
    /// to the original, fall back to the chunk unchanged with
    /// `compression_ratio = 1.0`.
    fn finish_or_fallback(
        chunk: &ScoredChunk,
        content: String,
        original_tokens: u32,
        compressed_tokens: u32,
    ) -> CompressedChunk {
        if compressed_tokens >= original_tokens {
            let header = Self::header_line(chunk);
            let unchanged = format!("{header}\n{}", chunk.chunk.content);
            return CompressedChunk {
                source_id: chunk.chunk.id.clone(),
                file_path: chunk.chunk.file_path.clone(),
                start_line: chunk.chunk.start_line,
                language: chunk.chunk.language.clone(),
                kind: chunk.chunk.kind,
                name: chunk.chunk.name.clone(),
                relevance_score: chunk.relevance_score,
                content: unchanged,
                original_tokens,
                compressed_tokens: original_tokens,
                compression_ratio: 1.0,
            };
        }
        Self::finish(chunk, content, original_tokens, compressed_tokens)
    }

    fn finish(chunk: &ScoredChunk, content: String, original_tokens: u32, compressed_tokens: u32) -> CompressedChunk {
        let compressed_tokens = compressed_tokens.max(1).min(original_tokens.max(1));
        let compression_ratio = if compressed_tokens == 0 {
            1.0
        } else {
            original_tokens.max(1) as f64 / compressed_tokens as f64
        };
        CompressedChunk {
            source_id: chunk.chunk.id.clone(),
            file_path: chunk.chunk.file_path.clone(),
            start_line: chunk.chunk.start_line,
            language: chunk.chunk.language.clone(),
            kind: chunk.chunk.kind,
            name: chunk.chunk.name.clone(),
            relevance_score: chunk.relevance_score,
            content,
            original_tokens,
            compressed_tokens,
            compression_ratio,
        }
    }

    /// Pick whichever of two candidate compressions has fewer tokens
    /// (ties favor the earlier, less-aggressive pass).
    fn keep_better(earlier: CompressedChunk, later: CompressedChunk) -> CompressedChunk {
        if later.compressed_tokens < earlier.compressed_tokens {
            later
        } else {
            earlier
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkKind, ScoreBreakdown};

    fn scored_chunk(content: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: crate::types::CodeChunk {
                id: "c1".to_string(),
                file_path: "src/lib.rs".to_string(),
                name: "do_work".to_string(),
                kind: ChunkKind::Function,
                language: "rust".to_string(),
                start_line: 10,
                end_line: 40,
                content: content.to_string(),
                embedding: vec![1.0],
                checksum: "x".to_string(),
                created_at: 0,
                symbols: Default::default(),
            },
            relevance_score: 0.8,
            breakdown: ScoreBreakdown::default(),
        }
    }

    #[test]
    fn compressed_never_exceeds_original() {
        let chunk = scored_chunk("fn do_work() {\n    // a comment\n    let x = 1;\n    x\n}");
        let compressor = AdaptiveCompressor::default();
        for result in [
            compressor.compress_light(&chunk),
            compressor.compress_medium(&chunk),
            compressor.compress_aggressive(&chunk),
        ] {
            assert!(result.compressed_tokens <= result.original_tokens);
        }
    }

    #[test]
    fn short_content_under_budget_is_returned_with_header() {
        let chunk = scored_chunk("fn a() {}");
        let compressor = AdaptiveCompressor::default();
        let result = compressor.compress(&chunk, 1000, CompressionLevel::Aggressive);
        assert!(result.content.contains("do_work"));
        assert_eq!(result.compression_ratio, result.compression_ratio.max(1.0));
    }

    #[test]
    fn aggressive_keeps_signature() {
        let content = "fn big_function() {\n".to_string()
            + &"    let x = 1;\n".repeat(30)
            + "}\n";
        let chunk = scored_chunk(&content);
        let compressor = AdaptiveCompressor::default();
        let result = compressor.compress_aggressive(&chunk);
        assert!(result.content.contains("big_function"));
        assert!(result.compressed_tokens <= result.original_tokens);
    }

    #[test]
    fn compress_picks_smallest_pass_meeting_budget() {
        let content = "fn big_function() {\n".to_string()
            + &"    let x = 1;\n".repeat(50)
            + "}\n";
        let chunk = scored_chunk(&content);
        let compressor = AdaptiveCompressor::default();
        let result = compressor.compress(&chunk, 20, CompressionLevel::Aggressive);
        assert!(result.compressed_tokens <= result.original_tokens);
    }

    #[test]
    fn ceiling_stops_escalation_before_budget_is_met() {
        let content = "fn big_function() {\n".to_string()
            + &"    let x = 1;\n".repeat(50)
            + "}\n";
        let chunk = scored_chunk(&content);
        let compressor = AdaptiveCompressor::default();
        let light_only = compressor.compress(&chunk, 20, CompressionLevel::Light);
        let light_direct = compressor.compress_light(&chunk);
        assert_eq!(light_only.compressed_tokens, light_direct.compressed_tokens);
    }

    #[test]
    fn cancelled_token_aborts_batch_compression() {
        let chunks = vec![scored_chunk("fn a() {}"), scored_chunk("fn b() {}")];
        let compressor = AdaptiveCompressor::default();
        let token = CancellationToken::new();
        token.cancel();
        let result = compressor.compress_batch(&chunks, 1000, CompressionLevel::Aggressive, &token);
        assert!(matches!(result, Err(OmniError::Cancelled)));
    }

    #[test]
    fn whitespace_only_content_collapses_to_header() {
        let chunk = scored_chunk("   \n\n\t  \n");
        let compressor = AdaptiveCompressor::default();
        let result = compressor.compress_light(&chunk);
        assert!(result.content.contains("src/lib.rs"));
    }
}
