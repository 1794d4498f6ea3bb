use std::fmt;

use super::hyphen::{BreakPoints, WordBreak, break_word};
use crate::overlay::font::{TextMeasure, measure_block};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WrapParams {
    pub box_width: f32,
    pub box_height: f32,
    pub size: f32,
    /// Leading between lines as a fraction of the font size.
    pub line_spacing: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    /// Every line fits the width and the block fits the height, or the wrap fails.
    Strict,
    /// Best effort for text that fits nowhere: height is ignored and words with no
    /// usable hyphenation point are cut between characters.
    Overflow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrapResult {
    pub lines: Vec<String>,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WrapError {
    WordTooWide { word: String },
    TooTall { height: f32, limit: f32 },
    LineOverflow { line: String, width: f32, limit: f32 },
}

impl fmt::Display for WrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WrapError::WordTooWide { word } => {
                write!(f, "word '{}' has no hyphenation point that fits", word)
            }
            WrapError::TooTall { height, limit } => {
                write!(f, "wrapped block is {:.1}px tall, limit {:.1}px", height, limit)
            }
            WrapError::LineOverflow { line, width, limit } => write!(
                f,
                "line '{}' is {:.1}px wide, limit {:.1}px",
                line, width, limit
            ),
        }
    }
}

impl std::error::Error for WrapError {}

/// Greedy first-fit wrap of `text` at one font size, hyphenating words that cannot
/// fit a line on their own.
pub fn wrap_text<M, D>(
    text: &str,
    params: WrapParams,
    mode: WrapMode,
    measure: &M,
    dictionary: &D,
) -> Result<WrapResult, WrapError>
where
    M: TextMeasure + ?Sized,
    D: BreakPoints + ?Sized,
{
    let WrapParams {
        box_width,
        box_height,
        size,
        line_spacing,
    } = params;
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() {
            let candidate = format!("{} {}", current, word);
            if measure.text_width(&candidate, size) <= box_width {
                current = candidate;
                continue;
            }
            lines.push(std::mem::take(&mut current));
        }

        let mut rest = word.to_string();
        loop {
            match break_word(&rest, box_width, size, measure, dictionary) {
                Some(WordBreak::Fits) => {
                    current = rest;
                    break;
                }
                Some(WordBreak::Split { head, tail }) => {
                    lines.push(head);
                    rest = tail;
                }
                None => match mode {
                    WrapMode::Strict => {
                        return Err(WrapError::WordTooWide {
                            word: word.to_string(),
                        });
                    }
                    WrapMode::Overflow => {
                        let (head, tail) = force_split(&rest, box_width, size, measure);
                        lines.push(head);
                        rest = tail;
                    }
                },
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    let block = measure_block(measure, &lines, size, line_spacing);
    if mode == WrapMode::Strict {
        if block.height > box_height {
            return Err(WrapError::TooTall {
                height: block.height,
                limit: box_height,
            });
        }
        for line in &lines {
            let width = measure.text_width(line, size);
            if width > box_width {
                return Err(WrapError::LineOverflow {
                    line: line.clone(),
                    width,
                    limit: box_width,
                });
            }
        }
    }

    Ok(WrapResult {
        lines,
        width: block.width,
        height: block.height,
    })
}

/// Cuts the longest character prefix that fits with a trailing hyphen; at least one
/// character is always taken so the loop advances.
fn force_split<M>(word: &str, box_width: f32, size: f32, measure: &M) -> (String, String)
where
    M: TextMeasure + ?Sized,
{
    let boundaries: Vec<usize> = word.char_indices().map(|(idx, _)| idx).skip(1).collect();
    let mut cut = boundaries.first().copied().unwrap_or(word.len());
    for &idx in boundaries.iter().rev() {
        if measure.text_width(&format!("{}-", &word[..idx]), size) <= box_width {
            cut = idx;
            break;
        }
    }
    if cut >= word.len() {
        return (word.to_string(), String::new());
    }
    (format!("{}-", &word[..cut]), word[cut..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::engine::hyphen::NoHyphenation;
    use crate::overlay::font::EstimatedMetrics;

    struct FixedPoints(Vec<usize>);

    impl BreakPoints for FixedPoints {
        fn break_points(&self, word: &str) -> Vec<usize> {
            self.0
                .iter()
                .copied()
                .filter(|point| *point < word.len())
                .collect()
        }
    }

    fn params(box_width: f32, box_height: f32, size: f32) -> WrapParams {
        WrapParams {
            box_width,
            box_height,
            size,
            line_spacing: 0.1,
        }
    }

    #[test]
    fn short_text_stays_on_one_line() {
        let font = EstimatedMetrics;
        let result = wrap_text(
            "hi there",
            params(200.0, 50.0, 10.0),
            WrapMode::Strict,
            &font,
            &NoHyphenation,
        )
        .expect("fits");
        assert_eq!(result.lines, vec!["hi there"]);
        assert!((result.height - 10.0).abs() < 1e-4);
    }

    #[test]
    fn greedy_wrap_fills_lines_first() {
        let font = EstimatedMetrics;
        // "aa aa" = 4 * 5.5 + 2.5 = 24.5 fits 25, a third word does not.
        let result = wrap_text(
            "aa aa aa aa aa",
            params(25.0, 100.0, 10.0),
            WrapMode::Strict,
            &font,
            &NoHyphenation,
        )
        .expect("fits");
        assert_eq!(result.lines, vec!["aa aa", "aa aa", "aa"]);
        assert!((result.height - (30.0 + 2.0)).abs() < 1e-4);
    }

    #[test]
    fn every_line_respects_width_exactly() {
        let font = EstimatedMetrics;
        let text = "the quick brown fox jumps over the lazy dog while everyone watches";
        for width in [45.0_f32, 55.0, 80.0, 133.0] {
            let result = wrap_text(
                text,
                params(width, 1000.0, 10.0),
                WrapMode::Strict,
                &font,
                &NoHyphenation,
            )
            .expect("fits");
            for line in &result.lines {
                assert!(font.text_width(line, 10.0) <= width, "{line} exceeds {width}");
            }
            assert_eq!(result.lines.join(" "), text);
        }
    }

    #[test]
    fn over_long_word_is_hyphenated_across_lines() {
        let font = EstimatedMetrics;
        let points = FixedPoints(vec![2, 4, 6]);
        let result = wrap_text(
            "go abcdefgh",
            params(30.0, 100.0, 10.0),
            WrapMode::Strict,
            &font,
            &points,
        )
        .expect("fits");
        assert_eq!(result.lines, vec!["go", "abcd-", "efgh"]);
    }

    #[test]
    fn remainder_is_broken_again_when_still_too_wide() {
        let font = EstimatedMetrics;
        let points = FixedPoints(vec![3, 6, 9]);
        // 12 letters = 66px; each "abc-" chunk is 20px.
        // Offsets are relative to the fragment being broken, so each tail is offered 3 again.
        let result = wrap_text(
            "abcdefghijkl",
            params(25.0, 100.0, 10.0),
            WrapMode::Strict,
            &font,
            &points,
        )
        .expect("fits");
        assert_eq!(result.lines, vec!["abc-", "def-", "ghi-", "jkl"]);
    }

    #[test]
    fn unbreakable_word_fails_strict_wrap() {
        let font = EstimatedMetrics;
        let err = wrap_text(
            "xyzzy",
            params(20.0, 100.0, 10.0),
            WrapMode::Strict,
            &font,
            &NoHyphenation,
        )
        .expect_err("cannot fit");
        assert_eq!(
            err,
            WrapError::WordTooWide {
                word: "xyzzy".to_string()
            }
        );
    }

    #[test]
    fn block_taller_than_box_fails() {
        let font = EstimatedMetrics;
        let err = wrap_text(
            "aa aa aa aa aa",
            params(25.0, 25.0, 10.0),
            WrapMode::Strict,
            &font,
            &NoHyphenation,
        )
        .expect_err("too tall");
        assert!(matches!(err, WrapError::TooTall { .. }));
    }

    #[test]
    fn overflow_mode_cuts_between_characters() {
        let font = EstimatedMetrics;
        let result = wrap_text(
            "xyzzy",
            params(20.5, 5.0, 10.0),
            WrapMode::Overflow,
            &font,
            &NoHyphenation,
        )
        .expect("overflow never fails");
        // "xyz-" is 20px, the longest prefix that fits.
        assert_eq!(result.lines, vec!["xyz-", "zy"]);
        assert!(result.height > 5.0);
    }

    #[test]
    fn empty_text_produces_no_lines() {
        let font = EstimatedMetrics;
        let result = wrap_text(
            "   ",
            params(10.0, 10.0, 10.0),
            WrapMode::Strict,
            &font,
            &NoHyphenation,
        )
        .expect("empty fits");
        assert!(result.lines.is_empty());
        assert_eq!(result.height, 0.0);
    }
}
