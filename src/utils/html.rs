use std::collections::HashSet;

use ammonia::Builder;

/// Reduce markup to plain text using the ammonia library.
///
/// No tags survive; `<script>` and `<style>` are removed together with their
/// content. The escaped text ammonia produces is decoded back, so the result
/// is plain, unescaped text with surrounding whitespace trimmed.
pub fn strip_tags(input: &str) -> String {
    if !input.contains('<') && !input.contains('&') {
        return input.trim().to_string();
    }

    let mut builder = Builder::empty();
    builder.clean_content_tags(HashSet::from(["script", "style"]));
    let cleaned = builder.clean(input).to_string();

    decode_entities(&cleaned).trim().to_string()
}

/// Decodes named and numeric character references.
pub fn decode_entities(input: &str) -> String {
    html_escape::decode_html_entities(input).into_owned()
}

/// Escapes text for safe inclusion in element content or attribute values.
pub fn escape(input: &str) -> String {
    html_escape::encode_safe(input).into_owned()
}

/// Escapes text and turns newlines into `<br />` line breaks.
pub fn escape_multiline(input: &str) -> String {
    escape(input).replace("\r\n", "\n").replace('\n', "<br />\n")
}

/// `<pre>` block holding a pretty-printed JSON dump, used by debug output.
pub fn debug_block<T: serde::Serialize>(payload: &T) -> String {
    let json = serde_json::to_string_pretty(payload).unwrap_or_else(|e| e.to_string());
    format!(
        "<pre class=\"ldct-debug\" style=\"margin-top:.5rem;background:#f9fafb;padding:.5rem;border:1px dashed #e5e7eb;white-space:pre-wrap;\">{}</pre>",
        escape(&json)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_and_script_bodies() {
        assert_eq!(strip_tags("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_tags("a<script>alert(1)</script>b"), "ab");
        assert_eq!(strip_tags("  Fish &amp; chips "), "Fish & chips");
    }

    #[test]
    fn escapes_for_output() {
        assert_eq!(escape_multiline("a<b\nc"), "a&lt;b<br />\nc");
    }
}
