//! Clean-up of generated content before any export runs.
//!
//! Generated documents arrive wrapped in markdown code fences and carry
//! `[Field Name]` placeholders. Normalization strips the fences, substitutes
//! every placeholder that has a non-empty value and wraps the rest in a
//! highlight span. Running it again on its own output is a no-op.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Class carried by the highlight span around an unresolved placeholder.
pub const PLACEHOLDER_CLASS: &str = "unresolved-placeholder";

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("FENCE_RE: hardcoded regex is valid")
});

// An already-wrapped placeholder (group `wrapped`), any other tag (`tag`,
// left alone so attribute values are never rewritten) or a bare placeholder
// in text (`bare`). Only innermost bracket pairs match: `[A [B] C]` yields
// just `B`.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<span class="unresolved-placeholder"[^>]*>\[(?P<wrapped>[^\[\]<>]+)\]</span>|(?P<tag><[^>]*>)|\[(?P<bare>[^\[\]<>]+)\]"#,
    )
    .expect("PLACEHOLDER_RE: hardcoded regex is valid")
});

fn placeholder_name<'h>(caps: &Captures<'h>) -> Option<&'h str> {
    caps.name("wrapped")
        .or_else(|| caps.name("bare"))
        .map(|m| m.as_str())
}

pub fn strip_code_fences(content: &str) -> String {
    FENCE_RE.replace_all(content, "").trim().to_string()
}

/// Normalize generated content for export.
///
/// With `fields == None` every placeholder stays unresolved and is highlighted.
pub fn normalize(content: &str, fields: Option<&HashMap<String, String>>) -> String {
    let stripped = strip_code_fences(content);
    PLACEHOLDER_RE
        .replace_all(&stripped, |caps: &Captures| {
            let Some(name) = placeholder_name(caps) else {
                return caps[0].to_string();
            };
            match fields.and_then(|f| f.get(name)).filter(|v| !v.is_empty()) {
                Some(value) => escape_value(value),
                None => highlight(name),
            }
        })
        .into_owned()
}

fn highlight(name: &str) -> String {
    format!(
        r#"<span class="{PLACEHOLDER_CLASS}" data-placeholder="{}">[{name}]</span>"#,
        escape_attr(name)
    )
}

/// Distinct placeholder names in order of first appearance.
pub fn placeholders(content: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(content) {
        let Some(name) = placeholder_name(&caps) else {
            continue;
        };
        if !seen.iter().any(|s| s == name) {
            seen.push(name.to_string());
        }
    }
    seen
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// A substituted field value. Brackets become character references so the
/// value can never be taken for a placeholder on a later pass.
fn escape_value(value: &str) -> String {
    escape_html(value)
        .replace('[', "&#91;")
        .replace(']', "&#93;")
}

pub(crate) fn escape_attr(text: &str) -> String {
    escape_html(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn strips_code_fences() {
        let out = normalize("```html\n<h1>Hi</h1>\n```", None);
        assert_eq!(out, "<h1>Hi</h1>");
    }

    #[test]
    fn substitutes_every_occurrence() {
        let f = fields(&[("Name", "X")]);
        let out = normalize("<p>[Name] and [Name]</p>", Some(&f));
        assert_eq!(out, "<p>X and X</p>");
        assert!(!out.contains("[Name]"));
    }

    #[test]
    fn empty_value_stays_highlighted() {
        let f = fields(&[("Client Name", "")]);
        let out = normalize("<p>Bill to [Client Name]</p>", Some(&f));
        assert!(out.contains(r#"class="unresolved-placeholder""#));
        assert!(out.contains("[Client Name]</span>"));
    }

    #[test]
    fn missing_field_map_highlights_everything() {
        let out = normalize("[A] [B]", None);
        assert_eq!(out.matches(PLACEHOLDER_CLASS).count(), 2);
    }

    #[test]
    fn normalization_is_idempotent() {
        let f = fields(&[("Known", "value")]);
        let once = normalize("```html\n<p>[Known] [Unknown]</p>\n```", Some(&f));
        let twice = normalize(&once, Some(&f));
        assert_eq!(once, twice);
        assert_eq!(twice.matches(PLACEHOLDER_CLASS).count(), 1);
    }

    #[test]
    fn wrapped_placeholder_resolves_on_later_pass() {
        let once = normalize("<p>[Date]</p>", None);
        let f = fields(&[("Date", "2024-01-01")]);
        assert_eq!(normalize(&once, Some(&f)), "<p>2024-01-01</p>");
    }

    #[test]
    fn bracketed_values_are_not_placeholders_on_a_later_pass() {
        let f = fields(&[("Status", "[TBD]")]);
        let once = normalize("<p>Status: [Status]</p>", Some(&f));
        assert_eq!(once, "<p>Status: &#91;TBD&#93;</p>");
        assert_eq!(normalize(&once, Some(&f)), once);
        assert_eq!(normalize(&once, None), once);
        assert!(placeholders(&once).is_empty());
    }

    #[test]
    fn attribute_values_are_left_alone() {
        let f = fields(&[("Website", "https://example.com")]);
        let html = r#"<p><a href="[Website]" title="[Website]">[Website]</a></p>"#;
        assert_eq!(
            normalize(html, None),
            r#"<p><a href="[Website]" title="[Website]"><span class="unresolved-placeholder" data-placeholder="Website">[Website]</span></a></p>"#
        );
        assert_eq!(
            normalize(html, Some(&f)),
            r#"<p><a href="[Website]" title="[Website]">https://example.com</a></p>"#
        );
        assert_eq!(placeholders(html), ["Website"]);
    }

    #[test]
    fn values_are_escaped() {
        let f = fields(&[("Co", "A & <B>")]);
        assert_eq!(normalize("[Co]", Some(&f)), "A &amp; &lt;B&gt;");
    }

    #[test]
    fn nested_brackets_match_innermost_only() {
        let out = normalize("[A [B] C]", None);
        assert!(out.starts_with("[A "));
        assert!(out.ends_with(" C]"));
        assert!(out.contains(r#"data-placeholder="B""#));
    }

    #[test]
    fn placeholder_names_are_deduplicated_in_order() {
        let names = placeholders("<p>[B] [A] [B] [a]</p>");
        assert_eq!(names, vec!["B", "A", "a"]);
    }
}
