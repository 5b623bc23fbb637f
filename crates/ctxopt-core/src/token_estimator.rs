//! Deterministic heuristic token counting (C1).
//!
//! No dependency on any real tokenizer vocabulary: this produces a
//! bounded approximation, good enough to drive budget arithmetic
//! elsewhere in the pipeline without calling out to a real model.

use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("static regex"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[[:alnum:]._%+-]+@[[:alnum:].-]+\.[[:alpha:]]{2,}").expect("static regex"));
static BRACE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("static regex"));
static BRACKET_LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\]{}]").expect("static regex"));
static MULTICHAR_OP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(==|!=|<=|>=|&&|\|\||->|=>|::|\+=|-=)").expect("static regex"));
static IMPORT_EXPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(import|export|use|require|include)\b").expect("static regex"));
static DEFINITION_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(fn|function|def|class|struct|enum|interface|impl|trait|const|let|var)\b")
        .expect("static regex")
});
static STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#).expect("static regex"));
static LINE_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(//|#)[^\n]*$").expect("static regex"));
static BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("static regex"));
static SINGLE_CHAR_OP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+\-*/%=<>!&|^~]").expect("static regex"));
static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(fn|function|def|class|struct|enum|interface|impl|trait|const|let|var|return|if|else|for|while|match|pub|async|await)\b")
        .expect("static regex")
});

/// Deterministic heuristic token estimator (C1).
///
/// `estimate` is pure, O(n) in the length of `text`, and produces the
/// same result for identical input on any IEEE-754 platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenEstimator;

impl TokenEstimator {
    /// Create a new estimator. Stateless; exists for call-site symmetry
    /// with the other pipeline components.
    pub fn new() -> Self {
        Self
    }

    /// Estimate the token count of `text`.
    pub fn estimate(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        if Self::looks_like_code(text) {
            Self::estimate_code(text)
        } else {
            Self::estimate_prose(text)
        }
    }

    fn looks_like_code(text: &str) -> bool {
        let hits = [
            DEFINITION_KEYWORD_RE.is_match(text),
            IMPORT_EXPORT_RE.is_match(text),
            BRACE_BLOCK_RE.is_match(text),
            BRACKET_LITERAL_RE.is_match(text),
            MULTICHAR_OP_RE.is_match(text),
        ]
        .into_iter()
        .filter(|hit| *hit)
        .count();
        hits >= 2
    }

    fn estimate_prose(text: &str) -> u32 {
        let mut remainder = text.to_string();
        let mut tokens = 0f64;

        for m in URL_RE.find_iter(text) {
            tokens += (m.as_str().chars().count() as f64 / 20.0).ceil();
        }
        remainder = URL_RE.replace_all(&remainder, "").into_owned();

        for _ in EMAIL_RE.find_iter(&remainder) {
            tokens += 2.0;
        }
        remainder = EMAIL_RE.replace_all(&remainder, "").into_owned();

        tokens += (remainder.chars().count() as f64 / 4.0).ceil();
        tokens.max(1.0) as u32
    }

    fn estimate_code(text: &str) -> u32 {
        let base = (text.chars().count() as f64 / 3.0).ceil();
        let mut adjustment = 0f64;

        adjustment += Self::recost(text, &KEYWORD_RE, 3.0, 1.0);
        adjustment += Self::recost(text, &SINGLE_CHAR_OP_RE, 3.0, 1.0);
        adjustment += Self::recost_by_len(text, &STRING_RE, 3.0, 4.0);
        adjustment += Self::recost_by_len(text, &LINE_COMMENT_RE, 3.0, 4.0);
        adjustment += Self::recost_by_len(text, &BLOCK_COMMENT_RE, 3.0, 4.0);

        ((base + adjustment).max(1.0)) as u32
    }

    /// Subtract each match's `chars/divisor` base share and add back a
    /// flat `flat_cost` per match.
    fn recost(text: &str, re: &Regex, divisor: f64, flat_cost: f64) -> f64 {
        let mut delta = 0f64;
        for m in re.find_iter(text) {
            let matched_len = m.as_str().chars().count() as f64;
            delta += flat_cost - (matched_len / divisor);
        }
        delta
    }

    /// Subtract each match's `chars/divisor` base share and add back
    /// `chars/recost_divisor` per match.
    fn recost_by_len(text: &str, re: &Regex, divisor: f64, recost_divisor: f64) -> f64 {
        let mut delta = 0f64;
        for m in re.find_iter(text) {
            let matched_len = m.as_str().chars().count() as f64;
            delta += (matched_len / recost_divisor).ceil() - (matched_len / divisor);
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_tokens() {
        assert_eq!(TokenEstimator::new().estimate(""), 0);
    }

    #[test]
    fn prose_floors_at_one_token() {
        assert_eq!(TokenEstimator::new().estimate("a"), 1);
    }

    #[test]
    fn prose_uses_chars_over_four() {
        let text = "the quick brown fox jumps over the lazy dog";
        let expected = (text.chars().count() as f64 / 4.0).ceil() as u32;
        assert_eq!(TokenEstimator::new().estimate(text), expected);
    }

    #[test]
    fn url_collapses_to_len_over_twenty() {
        let text = "see https://example.com/some/very/long/path/segment for details";
        let tokens = TokenEstimator::new().estimate(text);
        assert!(tokens > 0);
    }

    #[test]
    fn email_collapses_to_two_tokens() {
        let short = "contact a@b.co";
        let long = "contact averylongaddress@averylongdomainname.co";
        let t_short = TokenEstimator::new().estimate(short);
        let t_long = TokenEstimator::new().estimate(long);
        // Both emails collapse to the same fixed 2-token cost, so the
        // remaining prose share dominates the difference.
        assert!(t_long >= t_short);
    }

    #[test]
    fn code_is_classified_when_two_patterns_hit() {
        let code = "fn add(a: i32, b: i32) -> i32 { a + b }";
        let prose_estimate = (code.chars().count() as f64 / 4.0).ceil() as u32;
        let actual = TokenEstimator::new().estimate(code);
        // Code path applies different corrections; just assert it runs
        // and returns a sane positive value distinct from naive prose math
        // isn't guaranteed, so only assert positivity and monotonicity.
        assert!(actual >= 1);
        let _ = prose_estimate;
    }

    #[test]
    fn monotone_in_length() {
        let short = "fn a() { let x = 1; }";
        let long = "fn a() { let x = 1; let y = 2; let z = 3; }";
        let est = TokenEstimator::new();
        assert!(est.estimate(long) >= est.estimate(short));
    }

    #[test]
    fn deterministic_for_identical_input() {
        let text = "class Foo { fn bar() -> Bar { Bar::new() } }";
        let est = TokenEstimator::new();
        assert_eq!(est.estimate(text), est.estimate(text));
    }

    #[test]
    fn never_returns_negative_via_u32() {
        // u32 makes negative unrepresentable; this asserts no panic/underflow
        // on pathological input instead.
        let text = "{}{}{}{}[[[[]]]]";
        let _ = TokenEstimator::new().estimate(text);
    }
}
