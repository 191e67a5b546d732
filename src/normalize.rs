//! Cleanup of the raw city field as scraped from job postings.
//!
//! `91000 Evry` becomes `Evry`, `Gif-Sur-Yvette, France` becomes
//! `Gif Sur Yvette`, `Chappes (63)` becomes `Chappes`. Every leading number
//! group is dropped, so `91000 91 Evry` is also `Evry`. A string that is only
//! digits is left alone.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static CITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+\s+)*\d*\s*(\w+[^,()\d]+)[,()\d]?").expect("city pattern compiles")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Returns the normalized form of a raw city string.
///
/// Falls back to the input unchanged when nothing city-like can be captured.
/// Cleanup is repeated until the value is stable, so the result is a fixed
/// point of `normalize`.
pub fn normalize(raw: &str) -> String {
    let Some(mut current) = normalize_once(raw) else {
        debug!(raw, "city pattern did not match; keeping raw value");
        return raw.to_string();
    };
    // Each changing pass shortens the value or only rewrites hyphens and case.
    while let Some(next) = normalize_once(&current) {
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn normalize_once(value: &str) -> Option<String> {
    let captured = CITY_PATTERN.captures(value)?.get(1)?;
    let dehyphenated = captured.as_str().trim().replace('-', " ");
    let titled = title_case(&dehyphenated);
    Some(WHITESPACE.replace_all(&titled, " ").trim().to_string())
}

/// Uppercases the first letter of every run of letters and lowercases the rest.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous_is_letter = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            let mapped = if previous_is_letter {
                single_char(ch.to_lowercase(), ch)
            } else {
                single_char(ch.to_uppercase(), ch)
            };
            out.push(mapped);
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }
    out
}

// Case mappings that expand to several characters (ß -> SS) are skipped so
// that a second pass never sees a different string.
fn single_char(mut mapping: impl Iterator<Item = char>, original: char) -> char {
    match (mapping.next(), mapping.next()) {
        (Some(mapped), None) => mapped,
        _ => original,
    }
}
