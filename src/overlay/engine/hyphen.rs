use anyhow::{Context, Result, anyhow};
use hyphenation::{Hyphenator as _, Language, Load, Standard};

use crate::overlay::font::TextMeasure;

/// Source of linguistically valid break positions inside a single word.
pub trait BreakPoints: Send + Sync {
    /// Byte offsets into `word` where a hyphen may be inserted, ascending.
    fn break_points(&self, word: &str) -> Vec<usize>;
}

/// Dictionary that never offers a break; only explicit hyphens remain usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHyphenation;

impl BreakPoints for NoHyphenation {
    fn break_points(&self, _word: &str) -> Vec<usize> {
        Vec::new()
    }
}

/// Pattern-based hyphenation backed by the embedded TeX dictionaries.
pub struct Hyphenator {
    dictionary: Standard,
    language: Language,
}

impl Hyphenator {
    pub fn load(code: &str) -> Result<Self> {
        let language = language_from_code(code)
            .ok_or_else(|| anyhow!("unsupported hyphenation language: {}", code))?;
        let dictionary = Standard::from_embedded(language)
            .with_context(|| format!("failed to load embedded dictionary for {}", code))?;
        Ok(Self {
            dictionary,
            language,
        })
    }

    pub fn language(&self) -> Language {
        self.language
    }
}

impl BreakPoints for Hyphenator {
    fn break_points(&self, word: &str) -> Vec<usize> {
        // Patterns are lowercase; offsets only carry over when lowercasing keeps byte lengths.
        let lower = word.to_lowercase();
        let query = if lower.len() == word.len() {
            lower.as_str()
        } else {
            word
        };
        self.dictionary
            .hyphenate(query)
            .breaks
            .into_iter()
            .filter(|point| word.is_char_boundary(*point))
            .collect()
    }
}

fn language_from_code(code: &str) -> Option<Language> {
    let language = match code.trim().to_ascii_lowercase().replace('_', "-").as_str() {
        "en" | "en-us" | "eng" => Language::EnglishUS,
        "en-gb" => Language::EnglishGB,
        "de" | "de-de" | "de-1996" => Language::German1996,
        "fr" | "fr-fr" => Language::French,
        "es" | "es-es" => Language::Spanish,
        "it" | "it-it" => Language::Italian,
        "pt" | "pt-pt" | "pt-br" => Language::Portuguese,
        "nl" | "nl-nl" => Language::Dutch,
        "pl" => Language::Polish,
        "sv" => Language::Swedish,
        "ru" => Language::Russian,
        _ => return None,
    };
    Some(language)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordBreak {
    /// The word fits as is.
    Fits,
    /// `head` ends with a hyphen and fits; `tail` carries the rest of the word.
    Split { head: String, tail: String },
}

/// Splits one over-long word at the longest hyphenation point whose hyphenated
/// prefix still fits `max_width`. Returns `None` when no point qualifies.
pub fn break_word<M, D>(
    word: &str,
    max_width: f32,
    size: f32,
    measure: &M,
    dictionary: &D,
) -> Option<WordBreak>
where
    M: TextMeasure + ?Sized,
    D: BreakPoints + ?Sized,
{
    if measure.text_width(word, size) <= max_width {
        return Some(WordBreak::Fits);
    }

    let mut points = dictionary.break_points(word);
    points.extend(word.match_indices('-').map(|(idx, _)| idx + 1));
    points.retain(|point| *point > 0 && *point < word.len() && word.is_char_boundary(*point));
    points.sort_unstable();
    points.dedup();

    for &point in points.iter().rev() {
        let prefix = &word[..point];
        let head = if prefix.ends_with('-') {
            prefix.to_string()
        } else {
            format!("{}-", prefix)
        };
        if measure.text_width(&head, size) <= max_width {
            return Some(WordBreak::Split {
                head,
                tail: word[point..].to_string(),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::font::EstimatedMetrics;

    struct FixedPoints(Vec<usize>);

    impl BreakPoints for FixedPoints {
        fn break_points(&self, _word: &str) -> Vec<usize> {
            self.0.clone()
        }
    }

    #[test]
    fn word_that_fits_is_returned_unchanged() {
        let font = EstimatedMetrics;
        let result = break_word("cat", 100.0, 10.0, &font, &NoHyphenation);
        assert_eq!(result, Some(WordBreak::Fits));
    }

    #[test]
    fn word_without_points_fails_when_too_wide() {
        let font = EstimatedMetrics;
        // "xyzzy" is 27.5px wide at 10px.
        let result = break_word("xyzzy", 20.0, 10.0, &font, &NoHyphenation);
        assert_eq!(result, None);
    }

    #[test]
    fn longest_fitting_prefix_wins() {
        let font = EstimatedMetrics;
        let points = FixedPoints(vec![2, 4, 6]);
        // "abcd-" = 4 * 5.5 + 3.5 = 25.5, "abcdef-" = 36.5.
        let result = break_word("abcdefgh", 30.0, 10.0, &font, &points);
        assert_eq!(
            result,
            Some(WordBreak::Split {
                head: "abcd-".to_string(),
                tail: "efgh".to_string(),
            })
        );
    }

    #[test]
    fn hyphenated_prefix_that_never_fits_fails() {
        let font = EstimatedMetrics;
        let points = FixedPoints(vec![3]);
        let result = break_word("abcdefgh", 15.0, 10.0, &font, &points);
        assert_eq!(result, None);
    }

    #[test]
    fn explicit_hyphen_is_a_break_without_doubling() {
        let font = EstimatedMetrics;
        let result = break_word("self-aware", 40.0, 10.0, &font, &NoHyphenation);
        assert_eq!(
            result,
            Some(WordBreak::Split {
                head: "self-".to_string(),
                tail: "aware".to_string(),
            })
        );
    }

    #[test]
    fn out_of_range_points_are_ignored() {
        let font = EstimatedMetrics;
        let points = FixedPoints(vec![0, 8, 42]);
        let result = break_word("abcdefgh", 30.0, 10.0, &font, &points);
        assert_eq!(result, None);
    }

    #[test]
    fn english_dictionary_finds_points_in_uppercase_words() {
        let dictionary = Hyphenator::load("en-us").expect("embedded en-us");
        assert_eq!(dictionary.language(), Language::EnglishUS);
        assert!(!dictionary.break_points("hyphenation").is_empty());
        assert!(!dictionary.break_points("COMPETITION").is_empty());
    }

    #[test]
    fn unknown_language_is_rejected() {
        assert!(Hyphenator::load("xx-yy").is_err());
        assert!(Hyphenator::load("").is_err());
    }
}
