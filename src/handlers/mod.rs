// src/handlers/mod.rs

//! Presentation entry points. Each handler takes shortcode-style query
//! attributes and answers with an HTML fragment; missing input and empty
//! lookups become inline placeholder text rather than errors.

pub mod admin;
pub mod course;
pub mod forms;
pub mod quiz;

/// Integer attribute parsed the lenient way shortcode attributes are:
/// leading digits count, anything else is 0.
pub(crate) fn int_attr(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return 0;
    };
    let s = raw.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

/// `debug=1` switches on diagnostic output.
pub(crate) fn debug_attr(raw: Option<&str>) -> bool {
    raw.is_some_and(|v| v.trim() == "1")
}
