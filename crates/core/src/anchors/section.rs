//! Section locator (spec §4.4, C5): a single pure `resolve_section` function
//! representing the override | label-lookup | auto-detect strategy pipeline
//! (spec §9 "Section-resolution duplication").

use crate::book::model::SectionRange;
use crate::text::normalize_canonical;

/// A caller-supplied hint about which section a chapter covers, parsed out
/// of whatever labeling scheme the book project uses (e.g. folder names).
#[derive(Debug, Clone)]
pub enum ChapterLabel {
    /// `Chapter 03`-style: match by ordinal among same-kind sections.
    Numeric(u32),
    /// Free-text title: match by normalized heading text.
    Title(String),
}

fn strip_ordinal_prefix(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    let mut iter = trimmed.split_whitespace();
    iter.next()?; // the kind word itself ("Chapter")
    let rest: String = iter.collect::<Vec<_>>().join(" ");
    rest.trim_matches(|c: char| !c.is_ascii_digit()).parse().ok()
}

fn by_override(override_section: Option<&SectionRange>) -> Option<SectionRange> {
    override_section.cloned()
}

fn by_label(sections: &[SectionRange], labels: &[ChapterLabel]) -> Option<SectionRange> {
    for label in labels {
        match label {
            ChapterLabel::Numeric(n) => {
                let mut ordinal = 0u32;
                for s in sections {
                    ordinal += 1;
                    if strip_ordinal_prefix(&s.title).unwrap_or(ordinal) == *n || ordinal == *n {
                        return Some(s.clone());
                    }
                }
            }
            ChapterLabel::Title(title) => {
                let norm_title = normalize_canonical(title, false);
                if let Some(s) = sections
                    .iter()
                    .find(|s| normalize_canonical(&s.title, false) == norm_title)
                {
                    return Some(s.clone());
                }
            }
        }
    }
    None
}

/// Auto-detect: declare a match iff the normalized heading string appears as
/// a prefix of the normalized ASR prefix, or vice versa. Ties broken by
/// heading order (spec §4.4).
fn by_auto_detect(sections: &[SectionRange], asr_prefix: &str) -> Option<SectionRange> {
    let norm_prefix = normalize_canonical(asr_prefix, false);
    sections
        .iter()
        .find(|s| {
            let norm_heading = normalize_canonical(&s.title, false);
            !norm_heading.is_empty()
                && (norm_prefix.starts_with(&norm_heading) || norm_heading.starts_with(&norm_prefix))
        })
        .cloned()
}

/// `resolveSection(book, chapterLabels, asrPrefix) -> SectionRange?` (spec §9):
/// override wins outright; then label lookup; then heading-prefix detection
/// against the ASR transcript's opening words.
pub fn resolve_section(
    sections: &[SectionRange],
    override_section: Option<&SectionRange>,
    labels: &[ChapterLabel],
    asr_prefix: &str,
) -> Option<SectionRange> {
    by_override(override_section)
        .or_else(|| by_label(sections, labels))
        .or_else(|| by_auto_detect(sections, asr_prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::model::SectionKind;

    fn section(id: &str, title: &str) -> SectionRange {
        SectionRange {
            id: id.into(),
            title: title.into(),
            level: 1,
            kind: SectionKind::Chapter,
            start_word: 0,
            end_word: 10,
            start_paragraph: 0,
            end_paragraph: 1,
        }
    }

    #[test]
    fn override_wins_outright() {
        let sections = vec![section("a", "Chapter One")];
        let ov = section("b", "Chapter Two");
        let got = resolve_section(&sections, Some(&ov), &[], "whatever");
        assert_eq!(got.unwrap().id, "b");
    }

    #[test]
    fn numeric_label_matches_by_ordinal() {
        let sections = vec![section("a", "Chapter One"), section("b", "Chapter Two")];
        let labels = vec![ChapterLabel::Numeric(2)];
        let got = resolve_section(&sections, None, &labels, "");
        assert_eq!(got.unwrap().id, "b");
    }

    #[test]
    fn title_label_matches_by_text() {
        let sections = vec![section("a", "Chapter One"), section("b", "Prologue")];
        let labels = vec![ChapterLabel::Title("Prologue".into())];
        let got = resolve_section(&sections, None, &labels, "");
        assert_eq!(got.unwrap().id, "b");
    }

    #[test]
    fn auto_detect_matches_heading_prefix_of_asr() {
        let sections = vec![section("a", "Chapter One"), section("b", "Chapter Two")];
        let got = resolve_section(&sections, None, &[], "chapter one it was a dark night");
        assert_eq!(got.unwrap().id, "a");
    }

    #[test]
    fn no_match_returns_none() {
        let sections = vec![section("a", "Chapter One")];
        let got = resolve_section(&sections, None, &[], "something unrelated entirely");
        assert!(got.is_none());
    }
}
