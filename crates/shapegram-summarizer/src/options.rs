//! Summarizer configuration.

use serde::Deserialize;

/// A way of combining two steps, tried in the configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pattern {
    /// Structurally equal steps collapse into one, adding their weights.
    Identical,
    /// Same-typed steps with at least one matching child merge piecewise.
    Merge,
    /// Anything else becomes a weighted `random` over both.
    Alternatives,
}

/// Summarizer options.
///
/// ```json
/// { "matchThreshold": 0.5, "patterns": ["identical", "merge", "alternatives"] }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SummarizerOptions {
    /// Fraction of the larger child list that must match before two
    /// parents are merged piecewise rather than wrapped whole.
    pub match_threshold: f64,
    pub patterns: Vec<Pattern>,
}

impl Default for SummarizerOptions {
    fn default() -> Self {
        Self {
            match_threshold: 0.5,
            patterns: vec![Pattern::Identical, Pattern::Merge, Pattern::Alternatives],
        }
    }
}

impl SummarizerOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_match_threshold(mut self, threshold: f64) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn with_patterns(mut self, patterns: Vec<Pattern>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn allows(&self, pattern: Pattern) -> bool {
        self.patterns.contains(&pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_pattern() {
        let options = SummarizerOptions::default();
        assert_eq!(options.match_threshold, 0.5);
        assert!(options.allows(Pattern::Identical));
        assert!(options.allows(Pattern::Merge));
        assert!(options.allows(Pattern::Alternatives));
    }

    #[test]
    fn from_json() {
        let options = SummarizerOptions::from_json(r#"{ "patterns": ["identical"] }"#).unwrap();
        assert_eq!(options.patterns, vec![Pattern::Identical]);
        assert_eq!(options.match_threshold, 0.5);
        assert!(SummarizerOptions::from_json(r#"{ "patterns": ["unknown"] }"#).is_err());
    }
}
