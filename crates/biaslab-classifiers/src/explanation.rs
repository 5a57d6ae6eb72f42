//! Explanation rendering from word attributions

use crate::attribution::{Attribution, TokenAttribution};
use crate::config::ExplanationConfig;
use serde::{Deserialize, Serialize};

/// Returned by the directional style when no word crosses the threshold
pub const NO_STRONG_BIAS: &str = "No strong bias detected.";

/// Returned when every attributed token is a special or punctuation token
pub const UNMAPPED: &str = "Bias contribution could not be mapped to words.";

const SPECIAL_TOKENS: &[&str] = &[
    "[CLS]", "[SEP]", "[PAD]", "[UNK]", "[MASK]", "<s>", "</s>", "<pad>", "<unk>",
];

/// How explanations are phrased
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationStyle {
    /// Top K words by |attribution|, joined by "; "
    #[default]
    TopTokens,

    /// Words above the threshold with the direction of their effect
    Directional,
}

/// Turns an [`Attribution`] into a short human-readable string
#[derive(Debug, Clone)]
pub struct ExplanationFormatter {
    top_k: usize,
    threshold: f64,
    style: ExplanationStyle,
}

impl ExplanationFormatter {
    /// Create a formatter
    pub fn new(top_k: usize, threshold: f64, style: ExplanationStyle) -> Self {
        Self {
            top_k: top_k.max(1),
            threshold,
            style,
        }
    }

    /// Create a formatter from configuration
    pub fn from_config(config: &ExplanationConfig) -> Self {
        Self::new(config.top_k, config.threshold, config.style)
    }

    /// Render an explanation.
    ///
    /// Always returns a non-empty string.
    pub fn format(&self, attribution: &Attribution) -> String {
        let mut ranked: Vec<(&TokenAttribution, String)> = attribution
            .tokens
            .iter()
            .filter(|t| is_content_token(&t.token))
            .map(|t| (t, display_form(&t.token)))
            .filter(|(_, word)| !word.is_empty())
            .collect();

        if ranked.is_empty() {
            return UNMAPPED.to_string();
        }

        // Stable: equal magnitudes keep sentence order
        ranked.sort_by(|(a, _), (b, _)| {
            b.value
                .abs()
                .total_cmp(&a.value.abs())
                .then(a.position.cmp(&b.position))
        });

        match self.style {
            ExplanationStyle::TopTokens => ranked
                .iter()
                .take(self.top_k)
                .map(|(_, word)| word.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            ExplanationStyle::Directional => {
                let parts: Vec<String> = ranked
                    .iter()
                    .filter(|(t, _)| t.value.abs() > self.threshold)
                    .take(self.top_k)
                    .map(|(t, word)| {
                        if t.value > 0.0 {
                            format!("'{word}' increases bias")
                        } else {
                            format!("'{word}' reduces bias")
                        }
                    })
                    .collect();

                if parts.is_empty() {
                    NO_STRONG_BIAS.to_string()
                } else {
                    parts.join("; ")
                }
            }
        }
    }
}

impl Default for ExplanationFormatter {
    fn default() -> Self {
        Self::from_config(&ExplanationConfig::default())
    }
}

fn is_content_token(token: &str) -> bool {
    !SPECIAL_TOKENS.contains(&token) && token.chars().any(char::is_alphanumeric)
}

fn display_form(token: &str) -> String {
    token
        .trim_start_matches("##")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attribution(tokens: &[(&str, f64)]) -> Attribution {
        Attribution {
            base_value: 0.1,
            full_value: 0.1 + tokens.iter().map(|(_, v)| v).sum::<f64>(),
            tokens: tokens
                .iter()
                .enumerate()
                .map(|(position, (token, value))| TokenAttribution {
                    token: token.to_string(),
                    position,
                    value: *value,
                })
                .collect(),
        }
    }

    #[test]
    fn test_top_tokens_ranked_by_magnitude() {
        let formatter = ExplanationFormatter::new(2, 0.05, ExplanationStyle::TopTokens);
        let a = attribution(&[("Critics", 0.05), ("are", 0.01), ("clueless", -0.3), ("idiots.", 0.4)]);
        assert_eq!(formatter.format(&a), "idiots; clueless");
    }

    #[test]
    fn test_ties_keep_sentence_order() {
        let formatter = ExplanationFormatter::new(3, 0.0, ExplanationStyle::TopTokens);
        let a = attribution(&[("first", 0.2), ("second", -0.2), ("third", 0.2)]);
        assert_eq!(formatter.format(&a), "first; second; third");
    }

    #[test]
    fn test_special_and_punctuation_tokens_excluded() {
        let formatter = ExplanationFormatter::new(5, 0.0, ExplanationStyle::TopTokens);
        let a = attribution(&[("[CLS]", 0.9), ("--", 0.8), ("##ish", 0.1), ("[SEP]", 0.7)]);
        assert_eq!(formatter.format(&a), "ish");
    }

    #[test]
    fn test_unmapped_when_no_content_tokens() {
        let formatter = ExplanationFormatter::default();
        assert_eq!(formatter.format(&attribution(&[("[CLS]", 0.5), ("!", 0.2)])), UNMAPPED);
        assert_eq!(formatter.format(&attribution(&[])), UNMAPPED);
    }

    #[test]
    fn test_directional_style() {
        let formatter = ExplanationFormatter::new(5, 0.05, ExplanationStyle::Directional);
        let a = attribution(&[("policy", -0.1), ("is", 0.01), ("clueless", 0.3)]);
        assert_eq!(
            formatter.format(&a),
            "'clueless' increases bias; 'policy' reduces bias"
        );
    }

    #[test]
    fn test_directional_below_threshold() {
        let formatter = ExplanationFormatter::new(5, 0.05, ExplanationStyle::Directional);
        let a = attribution(&[("calm", 0.01), ("words", -0.02)]);
        assert_eq!(formatter.format(&a), NO_STRONG_BIAS);
    }
}
