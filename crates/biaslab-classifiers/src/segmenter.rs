//! Sentence segmentation
//!
//! Splits text on Unicode sentence boundaries (UAX #29), then re-joins
//! boundaries that were produced by a trailing abbreviation such as "Mr." or
//! "U.S.". A lone capital initial only continues a sentence when it follows a
//! capitalised word ("John F. Kennedy"), so "plan B." still ends one. Every
//! emitted sentence is a trimmed substring of the input.

use biaslab_core::{Error, Result};
use regex::Regex;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Abbreviations that end in a period without ending the sentence
const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "mt.", "ft.", "vs.", "e.g.",
    "i.e.", "inc.", "ltd.", "co.", "corp.", "dept.", "gov.", "sen.", "rep.", "gen.", "col.",
    "lt.", "sgt.", "capt.", "adm.", "pres.", "rev.", "hon.", "no.", "fig.", "approx.", "est.",
    "jan.", "feb.", "mar.", "apr.", "jun.", "jul.", "aug.", "sep.", "sept.", "oct.", "nov.",
    "dec.",
];

/// Abbreviation-aware sentence splitter
#[derive(Debug, Clone)]
pub struct SentenceSegmenter {
    abbreviations: HashSet<String>,
    acronym: Regex,
    initial: Regex,
}

impl SentenceSegmenter {
    /// Create a segmenter with the default abbreviation list
    pub fn new() -> Result<Self> {
        Self::with_abbreviations(&[])
    }

    /// Create a segmenter with additional abbreviations (e.g. "approx.")
    pub fn with_abbreviations(extra: &[String]) -> Result<Self> {
        let mut abbreviations: HashSet<String> =
            DEFAULT_ABBREVIATIONS.iter().map(|a| a.to_string()).collect();

        for abbreviation in extra {
            let normalized = abbreviation.trim().to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            if normalized.ends_with('.') {
                abbreviations.insert(normalized);
            } else {
                abbreviations.insert(format!("{normalized}."));
            }
        }

        // Dotted acronyms: "U.S.", "U.K."
        let acronym = Regex::new(r"^(?:\p{L}\.){2,}$")
            .map_err(|e| Error::config(format!("Failed to build acronym pattern: {e}")))?;
        let initial = Regex::new(r"^\p{Lu}\.$")
            .map_err(|e| Error::config(format!("Failed to build initial pattern: {e}")))?;

        Ok(Self {
            abbreviations,
            acronym,
            initial,
        })
    }

    /// Split text into non-empty sentences in document order.
    ///
    /// Empty or whitespace-only input yields an empty vector.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut pending_start: Option<usize> = None;

        for (offset, bound) in text.split_sentence_bound_indices() {
            let start = *pending_start.get_or_insert(offset);
            let end = offset + bound.len();
            let candidate = text[start..end].trim();

            if candidate.is_empty() {
                pending_start = None;
                continue;
            }

            // The boundary was caused by an abbreviation, keep accumulating
            if self.ends_with_abbreviation(candidate) && end < text.len() {
                continue;
            }

            sentences.push(candidate.to_string());
            pending_start = None;
        }

        if let Some(start) = pending_start {
            let rest = text[start..].trim();
            if !rest.is_empty() {
                sentences.push(rest.to_string());
            }
        }

        sentences
    }

    fn ends_with_abbreviation(&self, candidate: &str) -> bool {
        let mut words = candidate.split_whitespace().rev();
        let Some(last_word) = words.next() else {
            return false;
        };

        let word = last_word
            .trim_start_matches(|c: char| matches!(c, '"' | '\'' | '(' | '[' | '\u{201c}'));

        if self.abbreviations.contains(&word.to_lowercase()) || self.acronym.is_match(word) {
            return true;
        }

        if self.initial.is_match(word) {
            return match words.next() {
                None => true,
                Some(previous) => previous.chars().next().is_some_and(char::is_uppercase),
            };
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str) -> Vec<String> {
        SentenceSegmenter::new().unwrap().segment(text)
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(segment("").is_empty());
        assert!(segment("   \n\t  ").is_empty());
    }

    #[test]
    fn test_basic_split() {
        let sentences = segment("The policy is great. Critics are clueless idiots.");
        assert_eq!(
            sentences,
            vec!["The policy is great.", "Critics are clueless idiots."]
        );
    }

    #[test]
    fn test_question_and_exclamation() {
        let sentences = segment("Is this fair? Absolutely not! We disagree.");
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[1], "Absolutely not!");
    }

    #[test]
    fn test_title_abbreviation_does_not_split() {
        let sentences = segment("Mr. Smith went to Washington. He said hello.");
        assert_eq!(
            sentences,
            vec!["Mr. Smith went to Washington.", "He said hello."]
        );
    }

    #[test]
    fn test_dotted_acronym_does_not_split() {
        let sentences = segment("The U.S. Senate voted today. It passed narrowly.");
        assert_eq!(
            sentences,
            vec!["The U.S. Senate voted today.", "It passed narrowly."]
        );
    }

    #[test]
    fn test_middle_initial_does_not_split() {
        let sentences = segment("John F. Kennedy spoke. Crowds cheered.");
        assert_eq!(sentences, vec!["John F. Kennedy spoke.", "Crowds cheered."]);
    }

    #[test]
    fn test_single_letter_can_end_a_sentence() {
        let sentences = segment("We chose plan B. It works.");
        assert_eq!(sentences, vec!["We chose plan B.", "It works."]);
    }

    #[test]
    fn test_extra_abbreviations() {
        let segmenter =
            SentenceSegmenter::with_abbreviations(&["Approx".to_string()]).unwrap();
        let sentences = segmenter.segment("It costs approx. Ten dollars. Fine.");
        assert_eq!(sentences, vec!["It costs approx. Ten dollars.", "Fine."]);
    }

    #[test]
    fn test_sentences_are_substrings_of_input() {
        let text = "  First line without stop\nSecond one.  Third!  ";
        for sentence in segment(text) {
            assert!(text.contains(&sentence), "{sentence:?} not in input");
            assert_eq!(sentence, sentence.trim());
        }
    }

    #[test]
    fn test_trailing_fragment_without_punctuation() {
        let sentences = segment("Complete sentence. trailing fragment");
        assert_eq!(sentences.last().unwrap(), "trailing fragment");
    }
}
