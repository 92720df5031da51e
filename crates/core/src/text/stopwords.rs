//! Stopword sets for the anchor preprocessor (spec §4.3) and the windowed
//! aligner's filler-insertion discount (spec §4.6).

use std::collections::HashSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopwordMode {
    #[default]
    None,
    Domain,
}

fn domain_stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        [
            "a", "an", "the", "and", "or", "but", "of", "to", "in", "on", "at", "by", "for",
            "with", "as", "is", "was", "were", "be", "been", "being", "it", "its", "this",
            "that", "these", "those", "he", "she", "they", "we", "you", "i",
            // audiobook-specific fillers/interjections
            "um", "uh", "uhh", "umm", "er", "erm", "ah", "oh", "hmm", "mm",
        ]
        .into_iter()
        .collect()
    })
}

/// Words whose insertion the windowed aligner discounts (spec §4.6's
/// `ins(a) = 0.3` filler case).
pub fn is_filler(normalized_word: &str) -> bool {
    matches!(normalized_word, "um" | "uh" | "uhh" | "umm" | "er" | "erm" | "ah" | "oh" | "hmm" | "mm")
}

pub fn is_stopword(normalized_word: &str, mode: StopwordMode) -> bool {
    match mode {
        StopwordMode::None => false,
        StopwordMode::Domain => domain_stopwords().contains(normalized_word),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_mode_never_filters() {
        assert!(!is_stopword("the", StopwordMode::None));
    }

    #[test]
    fn domain_mode_filters_function_words_and_fillers() {
        assert!(is_stopword("the", StopwordMode::Domain));
        assert!(is_stopword("um", StopwordMode::Domain));
        assert!(!is_stopword("chapter", StopwordMode::Domain));
    }

    #[test]
    fn filler_detection_is_independent_of_mode() {
        assert!(is_filler("um"));
        assert!(!is_filler("chapter"));
    }
}
