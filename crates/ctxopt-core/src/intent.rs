//! Query intent classification and entity extraction (C2).
//!
//! Classification is weighted-keyword substring matching rather than a
//! learned model: every intent type carries a list of (keyword, weight)
//! pairs, the lower-cased query is scored against each list, and the
//! highest-scoring type wins (lexicographic order of type names breaks
//! ties, so the result is deterministic even on a zero-score query).

use std::sync::LazyLock;

use regex::Regex;

use crate::config::IntentDefaults;
use crate::types::{EntityType, IntentOptions, IntentType, QueryEntity, QueryIntent, Scope};

struct WeightedKeyword {
    keyword: &'static str,
    weight: f64,
}

macro_rules! kw {
    ($($k:expr => $w:expr),* $(,)?) => {
        &[$(WeightedKeyword { keyword: $k, weight: $w }),*]
    };
}

static BUG_FIX_KEYWORDS: &[WeightedKeyword] = kw!(
    "bug" => 1.0, "error" => 1.0, "fail" => 0.9, "crash" => 1.0, "broken" => 0.9,
    "debug" => 0.8, "exception" => 0.9, "traceback" => 0.8, "fix" => 0.7, "issue" => 0.6,
);
static FEATURE_ADD_KEYWORDS: &[WeightedKeyword] = kw!(
    "add" => 0.8, "implement" => 0.9, "create" => 0.8, "new feature" => 1.0,
    "support for" => 0.8, "build" => 0.6, "introduce" => 0.7,
);
static EXPLAIN_KEYWORDS: &[WeightedKeyword] = kw!(
    "explain" => 1.0, "how does" => 0.9, "how do" => 0.8, "what is" => 0.8,
    "why" => 0.7, "understand" => 0.8, "overview" => 0.7, "works" => 0.6, "describe" => 0.7,
);
static REFACTOR_KEYWORDS: &[WeightedKeyword] = kw!(
    "refactor" => 1.0, "rename" => 0.8, "restructure" => 0.9, "reorganize" => 0.8,
    "extract" => 0.7, "clean up" => 0.7, "simplify" => 0.6,
);
static TEST_KEYWORDS: &[WeightedKeyword] = kw!(
    "test" => 0.9, "unit test" => 1.0, "integration test" => 1.0, "coverage" => 0.7,
    "assert" => 0.6, "mock" => 0.6,
);
static SEARCH_KEYWORDS: &[WeightedKeyword] = kw!(
    "find" => 0.8, "where is" => 0.9, "locate" => 0.8, "search" => 0.9, "look up" => 0.6,
);

static DEEP_TECHNICAL_KEYWORDS: &[&str] = &[
    "concurrency", "race condition", "deadlock", "memory leak", "algorithm",
    "complexity", "architecture", "distributed", "consistency", "throughput",
];
static MULTISTEP_CONNECTIVES: &[&str] = &[
    "and then", "after that", "followed by", "in order to", "so that", "as well as",
];
static ANAPHORIC_CUES: &[&str] = &[
    "it", "that", "this", "again", "also", "too", "previous", "earlier", "the same",
];

static QUOTED_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"`([^`]+)`|"([^"]+)"|'([^']+)'"#).expect("static regex"));
static FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[\w\-/]+\.[A-Za-z]{1,5}\b").expect("static regex"));
static PASCAL_CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][a-z0-9]+){2,}\b").expect("static regex"));

static KEYWORD_VOCABULARY: &[&str] = &[
    "function", "class", "struct", "method", "api", "endpoint", "database",
    "query", "index", "cache", "thread", "async", "trait", "module", "handler",
];

/// Stateless query classifier and entity extractor (C2).
#[derive(Debug, Default, Clone, Copy)]
pub struct IntentAnalyzer;

impl IntentAnalyzer {
    /// Create a new analyzer. Stateless.
    pub fn new() -> Self {
        Self
    }

    /// Classify `query` (with optional prior conversation turns) into a
    /// [`QueryIntent`]. Pure: no network, no embedding call.
    pub fn analyze(&self, query: &str, history: &[String]) -> QueryIntent {
        let lower = query.to_lowercase();
        let intent_type = Self::classify_type(&lower);
        let entities = Self::extract_entities(query);
        let scope = Self::derive_scope(&lower, &entities);
        let complexity = Self::derive_complexity(query, &entities, history);
        let defaults = IntentDefaults::default();
        let type_defaults = IntentDefaults::for_type(intent_type);
        let estimated_budget = (type_defaults.base_budget as f64
            * scope.budget_multiplier()
            * (1.0 + complexity))
            .round() as u32;
        let options = IntentOptions {
            max_chunks: type_defaults.max_chunks,
            min_relevance: defaults.min_relevance,
            prefer_diversity: IntentDefaults::prefer_diversity_for_scope(scope),
            compression_level: IntentDefaults::compression_level_for_complexity(complexity),
        };
        let requires_history = !history.is_empty() && Self::has_anaphoric_cue(&lower);

        QueryIntent {
            intent_type,
            scope,
            entities,
            complexity,
            requires_history,
            estimated_budget,
            options,
        }
    }

    fn classify_type(lower: &str) -> IntentType {
        let tables: [(IntentType, &[WeightedKeyword]); 6] = [
            (IntentType::BugFix, BUG_FIX_KEYWORDS),
            (IntentType::FeatureAdd, FEATURE_ADD_KEYWORDS),
            (IntentType::Explain, EXPLAIN_KEYWORDS),
            (IntentType::Refactor, REFACTOR_KEYWORDS),
            (IntentType::Test, TEST_KEYWORDS),
            (IntentType::Search, SEARCH_KEYWORDS),
        ];

        let mut scored: Vec<(IntentType, f64)> = tables
            .iter()
            .map(|(t, keywords)| {
                let score: f64 = keywords
                    .iter()
                    .filter(|k| lower.contains(k.keyword))
                    .map(|k| k.weight)
                    .sum();
                (*t, score)
            })
            .collect();

        // Lexicographic tie-break: sort by (descending score, ascending name).
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.as_str().cmp(b.0.as_str()))
        });

        match scored.first() {
            Some((t, score)) if *score > 0.0 => *t,
            _ => IntentType::General,
        }
    }

    fn extract_entities(query: &str) -> Vec<QueryEntity> {
        let mut entities = Vec::new();
        let mut seen_values: Vec<String> = Vec::new();

        for caps in QUOTED_SPAN_RE.captures_iter(query) {
            let (value, position) = Self::first_capture(&caps);
            seen_values.push(value.to_lowercase());
            entities.push(QueryEntity {
                entity_type: EntityType::Symbol,
                value: value.to_string(),
                confidence: 0.9,
                position: Some(position),
            });
        }

        for m in FILENAME_RE.find_iter(query) {
            let value = m.as_str();
            if seen_values.iter().any(|s| s == &value.to_lowercase()) {
                continue;
            }
            seen_values.push(value.to_lowercase());
            entities.push(QueryEntity {
                entity_type: EntityType::File,
                value: value.to_string(),
                confidence: 0.7,
                position: Some(m.start()),
            });
        }

        for m in PASCAL_CASE_RE.find_iter(query) {
            let value = m.as_str();
            if seen_values.iter().any(|s| s == &value.to_lowercase()) {
                continue;
            }
            seen_values.push(value.to_lowercase());
            entities.push(QueryEntity {
                entity_type: EntityType::Type,
                value: value.to_string(),
                confidence: 0.5,
                position: Some(m.start()),
            });
        }

        let lower = query.to_lowercase();
        for kw in KEYWORD_VOCABULARY {
            if let Some(pos) = lower.find(kw) {
                if seen_values.iter().any(|s| s == kw) {
                    continue;
                }
                seen_values.push((*kw).to_string());
                entities.push(QueryEntity {
                    entity_type: EntityType::Keyword,
                    value: (*kw).to_string(),
                    confidence: 0.6,
                    position: Some(pos),
                });
            }
        }

        entities
    }

    fn first_capture<'a>(caps: &regex::Captures<'a>) -> (&'a str, usize) {
        for i in 1..=3 {
            if let Some(m) = caps.get(i) {
                return (m.as_str(), m.start());
            }
        }
        ("", 0)
    }

    fn derive_scope(lower: &str, entities: &[QueryEntity]) -> Scope {
        if lower.contains("this file") || lower.contains("current file") {
            return Scope::CurrentFile;
        }
        if lower.contains("current directory") || lower.contains("this directory") {
            return Scope::CurrentDir;
        }
        if lower.contains("project-wide") || lower.contains("whole project") || lower.contains("entire codebase") {
            return Scope::Project;
        }
        let has_file = entities.iter().any(|e| e.entity_type == EntityType::File);
        let has_symbol = entities.iter().any(|e| e.entity_type == EntityType::Symbol);
        if has_file {
            Scope::Project
        } else if has_symbol {
            Scope::CurrentDir
        } else {
            Scope::Project
        }
    }

    fn derive_complexity(query: &str, entities: &[QueryEntity], history: &[String]) -> f64 {
        let word_count = query.split_whitespace().count();
        let mut complexity = (word_count as f64 / 50.0).min(0.3);
        complexity += (entities.len() as f64 * 0.1).min(0.3);

        let lower = query.to_lowercase();
        if DEEP_TECHNICAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
            complexity += 0.2;
        }
        if MULTISTEP_CONNECTIVES.iter().any(|k| lower.contains(k)) {
            complexity += 0.2;
        }
        if history.len() > 3 {
            complexity += 0.1;
        }

        complexity.clamp(0.0, 1.0)
    }

    fn has_anaphoric_cue(lower: &str) -> bool {
        let words: Vec<&str> = lower.split_whitespace().collect();
        ANAPHORIC_CUES.iter().any(|cue| {
            if cue.contains(' ') {
                lower.contains(cue)
            } else {
                words.iter().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *cue)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bug_fix_keywords_classify_as_bug_fix() {
        let intent = IntentAnalyzer::new().analyze("there's a bug causing a crash", &[]);
        assert_eq!(intent.intent_type, IntentType::BugFix);
    }

    #[test]
    fn no_keyword_hits_falls_back_to_general() {
        let intent = IntentAnalyzer::new().analyze("zzz qqq", &[]);
        assert_eq!(intent.intent_type, IntentType::General);
    }

    #[test]
    fn quoted_span_extracts_as_symbol_entity() {
        let intent = IntentAnalyzer::new().analyze("what does `parse_token` do", &[]);
        assert!(intent
            .entities
            .iter()
            .any(|e| e.entity_type == EntityType::Symbol && e.value == "parse_token"));
    }

    #[test]
    fn filename_extracts_as_file_entity() {
        let intent = IntentAnalyzer::new().analyze("look at config.rs for settings", &[]);
        assert!(intent.entities.iter().any(|e| e.entity_type == EntityType::File));
    }

    #[test]
    fn pascal_case_extracts_as_type_entity() {
        let intent = IntentAnalyzer::new().analyze("how does QueryIntent get built", &[]);
        assert!(intent.entities.iter().any(|e| e.entity_type == EntityType::Type));
    }

    #[test]
    fn explain_query_scopes_to_project_when_no_file_entity() {
        // scope defaults to project when no scope cue or file entity is present
        let intent = IntentAnalyzer::new().analyze("explain how the login flow works", &[]);
        assert_eq!(intent.intent_type, IntentType::Explain);
        assert_eq!(intent.scope, Scope::Project);
        assert_eq!(intent.options.max_chunks, 10);
        assert_eq!(intent.options.compression_level, crate::types::CompressionLevel::Light);
        assert!(intent.options.prefer_diversity);
        assert!(intent.complexity < 0.5);
    }

    #[test]
    fn requires_history_needs_both_cue_and_history() {
        let with_history = IntentAnalyzer::new().analyze("what about it", &["earlier turn".to_string()]);
        assert!(with_history.requires_history);
        let without_history = IntentAnalyzer::new().analyze("what about it", &[]);
        assert!(!without_history.requires_history);
    }

    #[test]
    fn estimated_budget_uses_scope_multiplier() {
        let intent = IntentAnalyzer::new().analyze("explain how the login flow works", &[]);
        let expected_min = 5_000.0 * 1.0;
        assert!(intent.estimated_budget as f64 >= expected_min);
    }
}
