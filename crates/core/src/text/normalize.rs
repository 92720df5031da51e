//! Text normalization (spec §4.1, C1).
//!
//! Two levels: typography normalization (smart punctuation to ASCII,
//! idempotent) and canonical normalization (casefold, contraction expansion,
//! whitespace collapse) used for token comparison throughout the anchor and
//! alignment stages.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Map smart quotes, dashes and ellipsis to their ASCII equivalents.
/// Idempotent: normalizing already-ASCII text is a no-op.
pub fn normalize_typography(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{02BC}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201F}' => '"',
            '\u{2013}' | '\u{2014}' | '\u{2012}' => '-',
            '\u{2026}' => '.', // caller sees one char; good enough for comparison purposes
            other => other,
        })
        .collect()
}

fn contractions() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert("don't", "do not");
        m.insert("doesn't", "does not");
        m.insert("didn't", "did not");
        m.insert("won't", "will not");
        m.insert("wouldn't", "would not");
        m.insert("can't", "cannot");
        m.insert("couldn't", "could not");
        m.insert("shouldn't", "should not");
        m.insert("isn't", "is not");
        m.insert("aren't", "are not");
        m.insert("wasn't", "was not");
        m.insert("weren't", "were not");
        m.insert("haven't", "have not");
        m.insert("hasn't", "has not");
        m.insert("hadn't", "had not");
        m.insert("it's", "it is");
        m.insert("that's", "that is");
        m.insert("there's", "there is");
        m.insert("here's", "here is");
        m.insert("what's", "what is");
        m.insert("who's", "who is");
        m.insert("i'm", "i am");
        m.insert("you're", "you are");
        m.insert("we're", "we are");
        m.insert("they're", "they are");
        m.insert("i've", "i have");
        m.insert("you've", "you have");
        m.insert("we've", "we have");
        m.insert("they've", "they have");
        m.insert("i'll", "i will");
        m.insert("you'll", "you will");
        m.insert("he'll", "he will");
        m.insert("she'll", "she will");
        m.insert("we'll", "we will");
        m.insert("they'll", "they will");
        m.insert("i'd", "i would");
        m.insert("you'd", "you would");
        m.insert("he'd", "he would");
        m.insert("she'd", "she would");
        m.insert("let's", "let us");
        m
    })
}

const ONES: [&str; 10] =
    ["zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine"];
const TEENS: [&str; 10] = [
    "ten", "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen",
    "eighteen", "nineteen",
];
const TENS: [&str; 10] =
    ["", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety"];

/// Spell out a non-negative integer below one million in compact English.
fn spell_int(n: u64) -> String {
    if n == 0 {
        return ONES[0].to_string();
    }
    if n < 10 {
        return ONES[n as usize].to_string();
    }
    if n < 20 {
        return TEENS[(n - 10) as usize].to_string();
    }
    if n < 100 {
        let tens = TENS[(n / 10) as usize];
        let rem = n % 10;
        return if rem == 0 { tens.to_string() } else { format!("{} {}", tens, ONES[rem as usize]) };
    }
    if n < 1000 {
        let rem = n % 100;
        let head = format!("{} hundred", ONES[(n / 100) as usize]);
        return if rem == 0 { head } else { format!("{} {}", head, spell_int(rem)) };
    }
    if n < 1_000_000 {
        let rem = n % 1000;
        let head = format!("{} thousand", spell_int(n / 1000));
        return if rem == 0 { head } else { format!("{} {}", head, spell_int(rem)) };
    }
    n.to_string()
}

/// Canonical normalization: casefold, strip punctuation (keeping intra-word
/// apostrophes), expand contractions, optionally spell out integers,
/// collapse whitespace.
pub fn normalize_canonical(text: &str, spell_numbers: bool) -> String {
    let typo = normalize_typography(text);
    let lower = typo.to_lowercase();

    let mut out_words: Vec<String> = Vec::new();
    for raw_word in lower.split_whitespace() {
        let stripped: String = raw_word
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '\'')
            .collect();
        let stripped = stripped.trim_matches('\'').to_string();
        if stripped.is_empty() {
            continue;
        }

        if let Some(expansion) = contractions().get(stripped.as_str()) {
            for w in expansion.split(' ') {
                out_words.push(w.to_string());
            }
            continue;
        }

        if spell_numbers {
            if let Ok(n) = stripped.parse::<u64>() {
                for w in spell_int(n).split(' ') {
                    out_words.push(w.to_string());
                }
                continue;
            }
        }

        out_words.push(stripped);
    }

    out_words.join(" ")
}

/// An explicit equivalence table for tokens that don't normalize to the same
/// string but should still compare equal (e.g. domain-specific spellings).
#[derive(Debug, Clone, Default)]
pub struct EquivMap {
    pairs: HashMap<String, String>,
}

impl EquivMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, a: &str, b: &str) {
        self.pairs.insert(a.to_string(), b.to_string());
        self.pairs.insert(b.to_string(), a.to_string());
    }

    pub fn maps_to(&self, a: &str, b: &str) -> bool {
        self.pairs.get(a).map(|v| v == b).unwrap_or(false)
    }
}

/// Two tokens are equivalent iff their canonical normalizations match, or an
/// `equiv` map entry maps one to the other.
pub fn tokens_equivalent(a: &str, b: &str, equiv: Option<&EquivMap>) -> bool {
    let na = normalize_canonical(a, false);
    let nb = normalize_canonical(b, false);
    if na == nb {
        return true;
    }
    equiv.map(|m| m.maps_to(&na, &nb)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typography_normalizes_smart_quotes() {
        assert_eq!(normalize_typography("\u{2018}hi\u{2019}"), "'hi'");
        assert_eq!(normalize_typography("\u{201C}hi\u{201D}"), "\"hi\"");
    }

    #[test]
    fn typography_is_idempotent() {
        let once = normalize_typography("\u{2018}hi\u{2019}\u{2014}there");
        let twice = normalize_typography(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn canonical_casefolds_and_strips_punctuation() {
        assert_eq!(normalize_canonical("Hello, World!", false), "hello world");
    }

    #[test]
    fn canonical_keeps_intraword_apostrophes() {
        assert_eq!(normalize_canonical("rock'n'roll", false), "rock'n'roll");
    }

    #[test]
    fn canonical_expands_contractions() {
        assert_eq!(normalize_canonical("don't", false), "do not");
        assert_eq!(normalize_canonical("it's", false), "it is");
    }

    #[test]
    fn canonical_keeps_cannot_as_one_word() {
        assert_eq!(normalize_canonical("cannot", false), "cannot");
    }

    #[test]
    fn canonical_spells_numbers_when_requested() {
        assert_eq!(normalize_canonical("123", true), "one hundred twenty three");
        assert_eq!(normalize_canonical("123", false), "123");
    }

    #[test]
    fn canonical_collapses_whitespace() {
        assert_eq!(normalize_canonical("  hello   world  ", false), "hello world");
    }

    #[test]
    fn tokens_equivalent_via_normalization() {
        assert!(tokens_equivalent("Hello!", "hello", None));
        assert!(!tokens_equivalent("hello", "world", None));
    }

    #[test]
    fn tokens_equivalent_via_equiv_map() {
        let mut m = EquivMap::new();
        m.insert("grey", "gray");
        assert!(tokens_equivalent("grey", "gray", Some(&m)));
        assert!(tokens_equivalent("gray", "grey", Some(&m)));
    }

    #[test]
    fn spell_int_edge_cases() {
        assert_eq!(spell_int(0), "zero");
        assert_eq!(spell_int(7), "seven");
        assert_eq!(spell_int(19), "nineteen");
        assert_eq!(spell_int(42), "forty two");
        assert_eq!(spell_int(100), "one hundred");
        assert_eq!(spell_int(105), "one hundred five");
        assert_eq!(spell_int(1000), "one thousand");
    }
}
