// src/compare.rs

//! Expected-vs-actual output comparison.
//!
//! Strategies are tried in order and the first match wins:
//! 1. blank expectation: nothing to validate, always a match
//! 2. blank actual output: always a mismatch
//! 3. exact equality (after normalization, when requested)
//! 4. containment: genuine output may be a superset of the graded excerpt
//! 5. aggressive: whitespace and `,.:;!?'"` stripped, equality then containment
//!
//! A mismatch carries a report locating the first differing character.

use serde::Serialize;

use crate::normalize::{normalize as normalize_text, strip_aggressive};

/// Width of the context excerpt shown around a difference, per side.
pub const CONTEXT_WIDTH: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Comparison {
    pub matched: bool,
    pub differences: Vec<String>,
    pub excerpt: Option<String>,
}

impl Comparison {
    fn matched() -> Self {
        Self {
            matched: true,
            ..Self::default()
        }
    }

    fn mismatch(difference: String, excerpt: String) -> Self {
        Self {
            matched: false,
            differences: vec![difference],
            excerpt: Some(excerpt),
        }
    }
}

pub fn compare(expected: &str, actual: &str, normalize: bool) -> Comparison {
    if expected.trim().is_empty() {
        return Comparison::matched();
    }

    if actual.trim().is_empty() {
        return Comparison::mismatch(
            "Actual output is empty".to_string(),
            format!("Expected: {}", window(&chars(expected), 0)),
        );
    }

    let (expected, actual) = if normalize {
        (normalize_text(expected), normalize_text(actual))
    } else {
        (expected.to_string(), actual.to_string())
    };

    if expected == actual || actual.contains(&expected) {
        return Comparison::matched();
    }

    let (loose_expected, loose_actual) = (strip_aggressive(&expected), strip_aggressive(&actual));
    if loose_expected == loose_actual || loose_actual.contains(&loose_expected) {
        return Comparison::matched();
    }

    first_difference(&expected, &actual)
}

fn chars(text: &str) -> Vec<char> {
    text.chars().collect()
}

/// Up to `CONTEXT_WIDTH` characters centred on `pos`.
fn window(text: &[char], pos: usize) -> String {
    let start = pos.saturating_sub(CONTEXT_WIDTH / 2).min(text.len());
    let end = (start + CONTEXT_WIDTH).min(text.len());
    text[start..end].iter().collect()
}

fn first_difference(expected: &str, actual: &str) -> Comparison {
    let expected = chars(expected);
    let actual = chars(actual);

    if !expected.is_empty() && !actual.is_empty() {
        if let Some(pos) = expected.iter().zip(&actual).position(|(e, a)| e != a) {
            let exp = window(&expected, pos);
            let act = window(&actual, pos);
            return Comparison::mismatch(
                format!("Position {}: expected \"{}\" but got \"{}\"", pos, exp, act),
                format!("Position {}\nExpected: {}\nActual:   {}", pos, exp, act),
            );
        }
    }

    // One side is a prefix of the other (or empty after normalization).
    let shorter = expected.len().min(actual.len());
    let (label, rest) = if actual.len() < expected.len() {
        ("Missing", window(&expected, shorter))
    } else {
        ("Unexpected", window(&actual, shorter))
    };

    Comparison::mismatch(
        format!(
            "Length mismatch: expected {} characters, got {}",
            expected.len(),
            actual.len()
        ),
        format!("{} after position {}: {}", label, shorter, rest),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_expectation_always_matches() {
        assert!(compare("", "anything", true).matched);
        assert!(compare("  \n\t", "", true).matched);
        assert!(compare(" ", "x", false).matched);
    }

    #[test]
    fn blank_actual_never_matches() {
        let r = compare("Hello", "   \n", true);
        assert!(!r.matched);
        assert_eq!(r.differences, vec!["Actual output is empty".to_string()]);
    }

    #[test]
    fn case_and_surrounding_space_are_ignored() {
        assert!(compare("Hello", "  hello  \n", true).matched);
    }

    #[test]
    fn extra_trailing_output_is_tolerated() {
        assert!(compare("Welcome\nMenu", "Welcome\nMenu\nEXTRA", true).matched);
        assert!(compare(r#"{"a": 1}"#, "{\"a\": 1}\nEXTRA", true).matched);
    }

    #[test]
    fn json_formatting_is_not_graded() {
        let expected = r#"{"id": 1, "title": "Dune"}"#;
        let actual = "{\n    \"title\": \"Dune\",\n    \"id\": 1\n}\n";
        assert!(compare(expected, actual, true).matched);
    }

    #[test]
    fn punctuation_differences_fall_back_to_aggressive_match() {
        assert!(compare("Hello, World!", "hello world", true).matched);
        assert!(compare("Total: 5.", "> total 5 items", true).matched);
    }

    #[test]
    fn mismatch_reports_first_differing_position() {
        let r = compare("Result is 42", "Result is 41", true);
        assert!(!r.matched);
        assert_eq!(
            r.differences,
            vec![r#"Position 11: expected "result is 42" but got "result is 41""#.to_string()]
        );
        assert!(r.excerpt.unwrap().starts_with("Position 11"));
    }

    #[test]
    fn context_window_is_bounded() {
        let expected = format!("{}X{}", "a".repeat(100), "b".repeat(100));
        let actual = format!("{}Y{}", "a".repeat(100), "b".repeat(100));
        let r = compare(&expected, &actual, true);

        let excerpt = r.excerpt.unwrap();
        let expected_line = excerpt.lines().nth(1).unwrap();
        assert_eq!(expected_line.trim_start_matches("Expected: ").chars().count(), CONTEXT_WIDTH);
        assert!(r.differences[0].starts_with("Position 100"));
    }

    #[test]
    fn truncated_actual_reports_length_mismatch() {
        let r = compare("abcdef ghi", "abc", true);
        assert!(!r.matched);
        assert_eq!(
            r.differences,
            vec!["Length mismatch: expected 10 characters, got 3".to_string()]
        );
        assert_eq!(r.excerpt.as_deref(), Some("Missing after position 3: abcdef ghi"));
    }

    #[test]
    fn raw_comparison_keeps_case() {
        assert!(!compare("Hello", "hello", false).matched);
        assert!(compare("/api/books", "http://localhost:5000/api/books", false).matched);
    }

    #[test]
    fn normalized_text_matches_itself() {
        for s in ["Mixed CASE\n\nlines", "{\"k\": [1, 2]}", "\u{201C}x\u{201D}", "  "] {
            let n = normalize_text(s);
            assert!(compare(&n, &n, true).matched);
        }
    }
}
