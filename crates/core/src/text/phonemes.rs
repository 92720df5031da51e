//! Phoneme comparer backing the windowed aligner's soft-phoneme substitution
//! cost (spec §4.2, §4.6).
//!
//! Grounded on the teacher's ARPABET feature matrix and rule-based
//! grapheme-to-phoneme fallback (`speak/phonetic_distance.rs`,
//! `language/g2p.rs`), trimmed to what the alignment core actually needs: a
//! distance between two phoneme strings and a best-effort phoneme spelling
//! for a word that has no dictionary entry. The full CMU dictionary lookup
//! is an optional collaborator the core does not depend on directly.

use std::collections::HashMap;
use std::sync::OnceLock;

fn features() -> &'static HashMap<&'static str, &'static [&'static str]> {
    static MAP: OnceLock<HashMap<&'static str, &'static [&'static str]>> = OnceLock::new();
    MAP.get_or_init(|| {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert("P", &["consonant", "stop", "bilabial", "voiceless"]);
        m.insert("B", &["consonant", "stop", "bilabial", "voiced"]);
        m.insert("T", &["consonant", "stop", "alveolar", "voiceless"]);
        m.insert("D", &["consonant", "stop", "alveolar", "voiced"]);
        m.insert("K", &["consonant", "stop", "velar", "voiceless"]);
        m.insert("G", &["consonant", "stop", "velar", "voiced"]);
        m.insert("F", &["consonant", "fricative", "labiodental", "voiceless"]);
        m.insert("V", &["consonant", "fricative", "labiodental", "voiced"]);
        m.insert("TH", &["consonant", "fricative", "dental", "voiceless"]);
        m.insert("DH", &["consonant", "fricative", "dental", "voiced"]);
        m.insert("S", &["consonant", "fricative", "alveolar", "voiceless"]);
        m.insert("Z", &["consonant", "fricative", "alveolar", "voiced"]);
        m.insert("SH", &["consonant", "fricative", "postalveolar", "voiceless"]);
        m.insert("ZH", &["consonant", "fricative", "postalveolar", "voiced"]);
        m.insert("HH", &["consonant", "fricative", "glottal", "voiceless"]);
        m.insert("CH", &["consonant", "affricate", "postalveolar", "voiceless"]);
        m.insert("JH", &["consonant", "affricate", "postalveolar", "voiced"]);
        m.insert("M", &["consonant", "nasal", "bilabial", "voiced"]);
        m.insert("N", &["consonant", "nasal", "alveolar", "voiced"]);
        m.insert("NG", &["consonant", "nasal", "velar", "voiced"]);
        m.insert("L", &["consonant", "liquid", "alveolar", "voiced"]);
        m.insert("R", &["consonant", "liquid", "postalveolar", "voiced"]);
        m.insert("W", &["consonant", "glide", "bilabial", "voiced"]);
        m.insert("Y", &["consonant", "glide", "palatal", "voiced"]);
        m.insert("IY", &["vowel", "high", "front", "unrounded", "tense"]);
        m.insert("IH", &["vowel", "high", "front", "unrounded", "lax"]);
        m.insert("EY", &["vowel", "mid", "front", "unrounded", "tense"]);
        m.insert("EH", &["vowel", "mid", "front", "unrounded", "lax"]);
        m.insert("AE", &["vowel", "low", "front", "unrounded", "lax"]);
        m.insert("AA", &["vowel", "low", "back", "unrounded", "tense"]);
        m.insert("AH", &["vowel", "mid", "central", "unrounded", "lax"]);
        m.insert("AO", &["vowel", "mid", "back", "rounded", "tense"]);
        m.insert("OW", &["vowel", "mid", "back", "rounded", "tense"]);
        m.insert("UH", &["vowel", "high", "back", "rounded", "lax"]);
        m.insert("UW", &["vowel", "high", "back", "rounded", "tense"]);
        m.insert("ER", &["vowel", "mid", "central", "rounded", "tense"]);
        m
    })
}

const CROSS_TYPE_DISTANCE: i32 = 5;

/// Strip a trailing ARPABET stress digit (0/1/2).
pub fn strip_stress(phoneme: &str) -> &str {
    phoneme.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// Articulatory feature distance between two ARPABET phonemes, ignoring
/// stress. 0 for identical phonemes (after stress-stripping).
pub fn phoneme_distance(a: &str, b: &str) -> i32 {
    let a_base = strip_stress(a);
    let b_base = strip_stress(b);
    if a_base == b_base {
        return 0;
    }
    match (features().get(a_base), features().get(b_base)) {
        (Some(fa), Some(fb)) => {
            if fa[0] != fb[0] {
                return CROSS_TYPE_DISTANCE;
            }
            fa[1..].iter().zip(fb[1..].iter()).filter(|(x, y)| x != y).count() as i32
        }
        _ => CROSS_TYPE_DISTANCE,
    }
}

/// Normalize a phoneme-distance score into the `[0, 1]` similarity space used
/// by the windowed aligner's `phonemeSoftThreshold` comparison.
pub fn phoneme_similarity(a: &str, b: &str) -> f64 {
    let d = phoneme_distance(a, b) as f64;
    (1.0 - d / CROSS_TYPE_DISTANCE as f64).max(0.0)
}

/// Per-position soft similarity between two phoneme sequences, averaged over
/// the longer sequence.
pub fn sequence_similarity(a: &[String], b: &[String]) -> f64 {
    let len = a.len().max(b.len());
    if len == 0 {
        return 1.0;
    }
    let total: f64 = (0..len)
        .map(|i| match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => phoneme_similarity(x, y),
            _ => 0.0,
        })
        .sum();
    total / len as f64
}

/// Best-effort rule-based grapheme-to-phoneme fallback for words with no
/// dictionary entry. Not a substitute for a real G2P model; the windowed
/// aligner derives both sides' phonemes through this on demand.
pub fn rule_based_phonemes(word: &str) -> Vec<String> {
    let word = word.to_lowercase();
    let chars: Vec<char> = word.chars().collect();
    let mut phonemes = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let remaining: String = chars[i..].iter().collect();
        if remaining.len() >= 2 {
            let digraph = &remaining[..2];
            let mapped = match digraph {
                "th" => Some("TH"),
                "sh" => Some("SH"),
                "ch" => Some("CH"),
                "ng" => Some("NG"),
                "ph" => Some("F"),
                "wh" => Some("W"),
                "ck" => Some("K"),
                _ => None,
            };
            if let Some(p) = mapped {
                phonemes.push(p.to_string());
                i += 2;
                continue;
            }
        }
        match chars[i] {
            'a' => phonemes.push("AE".into()),
            'b' => phonemes.push("B".into()),
            'c' => phonemes.push(
                if i + 1 < chars.len() && matches!(chars[i + 1], 'e' | 'i' | 'y') { "S" } else { "K" }
                    .into(),
            ),
            'd' => phonemes.push("D".into()),
            'e' => phonemes.push("EH".into()),
            'f' => phonemes.push("F".into()),
            'g' => phonemes.push("G".into()),
            'h' => phonemes.push("HH".into()),
            'i' => phonemes.push("IH".into()),
            'j' => phonemes.push("JH".into()),
            'k' => phonemes.push("K".into()),
            'l' => phonemes.push("L".into()),
            'm' => phonemes.push("M".into()),
            'n' => phonemes.push("N".into()),
            'o' => phonemes.push("AA".into()),
            'p' => phonemes.push("P".into()),
            'q' => phonemes.push("K".into()),
            'r' => phonemes.push("R".into()),
            's' => phonemes.push("S".into()),
            't' => phonemes.push("T".into()),
            'u' => phonemes.push("AH".into()),
            'v' => phonemes.push("V".into()),
            'w' => phonemes.push("W".into()),
            'x' => {
                phonemes.push("K".into());
                phonemes.push("S".into());
            }
            'y' => phonemes.push(if phonemes.is_empty() { "Y" } else { "IH" }.into()),
            'z' => phonemes.push("Z".into()),
            _ => {}
        }
        i += 1;
    }

    if phonemes.is_empty() {
        phonemes.push("AH".into());
    }
    phonemes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phoneme_distance_identical_ignores_stress() {
        assert_eq!(phoneme_distance("K", "K"), 0);
        assert_eq!(phoneme_distance("AE1", "AE0"), 0);
    }

    #[test]
    fn phoneme_distance_same_type_differs_by_feature_count() {
        assert_eq!(phoneme_distance("P", "B"), 1); // voicing only
        assert_eq!(phoneme_distance("P", "K"), 1); // place only
    }

    #[test]
    fn phoneme_distance_cross_type_is_max() {
        assert_eq!(phoneme_distance("K", "AE1"), CROSS_TYPE_DISTANCE);
    }

    #[test]
    fn phoneme_similarity_identical_is_one() {
        assert_eq!(phoneme_similarity("T", "T"), 1.0);
    }

    #[test]
    fn phoneme_similarity_cross_type_is_zero() {
        assert_eq!(phoneme_similarity("K", "AE"), 0.0);
    }

    #[test]
    fn sequence_similarity_matches_on_shared_variant() {
        let a = vec!["K".to_string(), "AE1".to_string()];
        let b = vec!["K".to_string(), "AE0".to_string()];
        assert!(sequence_similarity(&a, &b) >= 0.99);
    }

    #[test]
    fn rule_based_phonemes_never_empty() {
        assert!(!rule_based_phonemes("cat").is_empty());
        assert!(!rule_based_phonemes("").is_empty());
    }

    #[test]
    fn rule_based_phonemes_handles_digraphs() {
        let ph = rule_based_phonemes("ship");
        assert_eq!(ph[0], "SH");
    }
}
