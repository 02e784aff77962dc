// src/normalize.rs

//! Text canonicalization for output grading.
//!
//! Console output of equally correct submissions differs in case, spacing,
//! blank lines, quote style and JSON formatting. `normalize` folds all of
//! those away so only content is graded.
//!
//! Pipeline:
//! - byte-order marks dropped, `\uXXXX` escapes decoded
//! - typographic quotes, dashes and ellipses mapped to ASCII
//! - lowercased
//! - line endings unified, Unicode space variants and tabs turned into spaces
//! - every line trimmed, blank lines dropped, lines joined by one space
//! - whitespace runs collapsed
//! - JSON-looking text re-serialized compactly (keys sorted)
//!
//! `normalize(normalize(x)) == normalize(x)` for every input.

use regex::{Captures, Regex};
use std::sync::OnceLock;

const BOM: char = '\u{feff}';

/// Punctuation ignored by the aggressive comparison fallback.
pub const AGGRESSIVE_PUNCTUATION: &[char] = &[',', '.', ':', ';', '!', '?', '\'', '"'];

pub fn normalize(text: &str) -> String {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let text = unescape_unicode(text).replace(BOM, "");
    let text = map_typography(&text).to_lowercase();
    let text = flatten_whitespace(&text);

    canonical_json(&text).unwrap_or(text)
}

/// Drop all whitespace and [`AGGRESSIVE_PUNCTUATION`].
pub fn strip_aggressive(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !AGGRESSIVE_PUNCTUATION.contains(c))
        .collect()
}

fn unicode_escape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\\u([0-9a-f]{4})").expect("valid unicode escape regex"))
}

/// Decode `\uXXXX` escapes until none are left.
///
/// Surrogate halves are not valid `char`s and stay as written.
fn unescape_unicode(text: &str) -> String {
    let re = unicode_escape();
    let mut current = text.to_string();

    loop {
        let next = re.replace_all(&current, |caps: &Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        });

        if next == current {
            return current;
        }
        current = next.into_owned();
    }
}

fn map_typography(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => out.push('"'),
            '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            _ => out.push(c),
        }
    }

    out
}

fn is_space_variant(c: char) -> bool {
    matches!(
        c,
        '\t' | '\u{000B}'
            | '\u{000C}'
            | '\u{00A0}'
            | '\u{2000}'..='\u{200A}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{0085}' | '\u{2028}' | '\u{2029}')
}

/// Line structure is not graded: trim lines, drop blanks, join with spaces.
fn flatten_whitespace(text: &str) -> String {
    let unified: String = text
        .replace("\r\n", "\n")
        .chars()
        .map(|c| {
            if is_line_break(c) {
                '\n'
            } else if is_space_variant(c) {
                ' '
            } else {
                c
            }
        })
        .collect();

    let joined = unified
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compact re-serialization of JSON-looking text, `None` if it does not parse.
fn canonical_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }

    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    serde_json::to_string(&value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_case_folds_and_drops_blank_lines() {
        assert_eq!(normalize("  Hello  \n"), "hello");
        assert_eq!(normalize("Line One\r\n\r\n   \r\nLine   Two\r"), "line one line two");
        assert_eq!(normalize("\u{feff}Menu:\n\t1. Add"), "menu: 1. add");
    }

    #[test]
    fn maps_space_variants_and_typography() {
        assert_eq!(normalize("a\u{00A0}b\u{2009}c\u{3000}d"), "a b c d");
        assert_eq!(normalize("\u{201C}Done\u{201D} \u{2014} it\u{2019}s ok\u{2026}"), "\"done\" - it's ok...");
    }

    #[test]
    fn decodes_unicode_escapes() {
        assert_eq!(normalize(r"Caf\u00e9 \u0041BC"), "café abc");
        assert_eq!(normalize(r"\U0041"), "a");
        // lone surrogate half stays as written
        assert_eq!(normalize(r"x\ud83dy"), r"x\ud83dy");
    }

    #[test]
    fn canonicalizes_json_formatting_and_key_order() {
        let pretty = "{\n  \"Name\": \"Ann\",\n  \"age\": 3\n}";
        let compact = r#"{"age":3,"name":"ann"}"#;
        assert_eq!(normalize(pretty), compact);
        assert_eq!(normalize(r#"[ 1,  2 , {"b":1, "a":2} ]"#), r#"[1,2,{"a":2,"b":1}]"#);
    }

    #[test]
    fn broken_json_falls_back_to_text() {
        assert_eq!(normalize("{ not json }\n"), "{ not json }");
        assert_eq!(normalize("[INFO]  Server   started"), "[info] server started");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "Hello, World!\r\n\r\nBye",
            "\u{feff}\u{feff}x",
            r"\u0041",
            "  \u{feff}abc",
            "{\"a  c\": 1, \"a b\": 2}",
            "{\"B\": 1, \"a\": {\"Z\": [1, 2.50, \"x\u{00A0}y\"]}}",
            "[1, 2] trailing",
            "tab\tseparated\u{2028}lines",
            "\u{201C}quoted\u{201D}\u{2026}",
            r#"{"p":"\\u0041"}"#,
            r#"{"s":"line\nbreak\tand\ttab"}"#,
        ];

        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn aggressive_strip_removes_spacing_and_punctuation() {
        assert_eq!(strip_aggressive("hello, world! \"ok\"?"), "helloworldok");
        assert_eq!(strip_aggressive("a: b; c."), "abc");
    }
}
