//! Deterministic prompt assembly (C7).
//!
//! Groups compressed chunks by file, sorts groups and within-group
//! entries deterministically, and formats the final prompt text. Given
//! identical inputs the output is byte-identical.

use std::collections::BTreeMap;

use crate::token_estimator::TokenEstimator;
use crate::types::CompressedChunk;

/// Formats a query plus its selected/compressed chunks into one prompt
/// string (C7).
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptAssembler;

/// The assembled prompt text plus its estimated token count.
pub struct AssembledPrompt {
    /// The final prompt text.
    pub prompt: String,
    /// Token estimate of `prompt`, computed via C1.
    pub tokens_used: u32,
}

impl PromptAssembler {
    /// Create a new assembler. Stateless.
    pub fn new() -> Self {
        Self
    }

    /// Assemble `query` and `chunks` into a deterministic prompt.
    pub fn assemble(&self, query: &str, chunks: &[CompressedChunk]) -> AssembledPrompt {
        let mut groups: BTreeMap<String, Vec<&CompressedChunk>> = BTreeMap::new();
        for chunk in chunks {
            groups.entry(chunk.file_path.clone()).or_default().push(chunk);
        }
        for group in groups.values_mut() {
            group.sort_by(|a, b| a.start_line.cmp(&b.start_line).then_with(|| a.source_id.cmp(&b.source_id)));
        }

        let mut ordered: Vec<(String, Vec<&CompressedChunk>)> = groups.into_iter().collect();
        ordered.sort_by(|(path_a, group_a), (path_b, group_b)| {
            let max_a = group_a.iter().map(|c| c.relevance_score).fold(f64::MIN, f64::max);
            let max_b = group_b.iter().map(|c| c.relevance_score).fold(f64::MIN, f64::max);
            max_b
                .partial_cmp(&max_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| path_a.cmp(path_b))
        });

        let mut out = String::new();
        out.push_str(query.trim());
        out.push_str("\n\n");
        out.push_str(&format!("# Context ({} section{})\n\n", ordered.len(), if ordered.len() == 1 { "" } else { "s" }));

        for (file_path, group) in &ordered {
            out.push_str(&format!("## {file_path}\n\n"));
            for chunk in group {
                let lang_tag = chunk.language.as_str();
                out.push_str(&format!("```{lang_tag}\n{}\n```\n\n", chunk.content));
            }
        }

        let prompt = out.trim_end().to_string();
        let tokens_used = TokenEstimator::new().estimate(&prompt);
        AssembledPrompt { prompt, tokens_used }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkKind;

    fn chunk(id: &str, file: &str, start: u32, score: f64, content: &str) -> CompressedChunk {
        CompressedChunk {
            source_id: id.to_string(),
            file_path: file.to_string(),
            start_line: start,
            language: "rust".to_string(),
            kind: ChunkKind::Function,
            name: id.to_string(),
            relevance_score: score,
            content: content.to_string(),
            original_tokens: 10,
            compressed_tokens: 10,
            compression_ratio: 1.0,
        }
    }

    #[test]
    fn identical_inputs_produce_byte_identical_prompt() {
        let chunks = vec![
            chunk("a", "a.rs", 10, 0.9, "fn a() {}"),
            chunk("b", "b.rs", 5, 0.7, "fn b() {}"),
        ];
        let assembler = PromptAssembler::new();
        let first = assembler.assemble("explain a", &chunks);
        let second = assembler.assemble("explain a", &chunks);
        assert_eq!(first.prompt, second.prompt);
    }

    #[test]
    fn groups_are_sorted_by_max_relevance_descending() {
        let chunks = vec![
            chunk("a", "low.rs", 1, 0.2, "fn a() {}"),
            chunk("b", "high.rs", 1, 0.95, "fn b() {}"),
        ];
        let assembler = PromptAssembler::new();
        let result = assembler.assemble("q", &chunks);
        let high_pos = result.prompt.find("high.rs").unwrap();
        let low_pos = result.prompt.find("low.rs").unwrap();
        assert!(high_pos < low_pos);
    }

    #[test]
    fn within_group_entries_sorted_by_start_line() {
        let chunks = vec![
            chunk("a", "f.rs", 50, 0.9, "fn a() {}"),
            chunk("b", "f.rs", 5, 0.9, "fn b() {}"),
        ];
        let assembler = PromptAssembler::new();
        let result = assembler.assemble("q", &chunks);
        let first = result.prompt.find("fn b()").unwrap();
        let second = result.prompt.find("fn a()").unwrap();
        assert!(first < second);
    }

    #[test]
    fn query_appears_verbatim_before_context_header() {
        let assembler = PromptAssembler::new();
        let result = assembler.assemble("how does X work?", &[]);
        assert!(result.prompt.starts_with("how does X work?"));
        assert!(result.prompt.contains("# Context (0 sections)"));
    }
}
