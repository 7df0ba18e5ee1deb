//! Helpers for the small HTML fragments the campaign endpoint embeds in some
//! fields (entity links, progress trend icons).
//!
//! These are not a general HTML parser. They understand exactly the shapes the
//! endpoint produces: flat `<a>`, `<img>` and `<i>` tags with double-quoted
//! attributes.

/// Material icon names used for progress trends, mapped to terminal glyphs.
const TREND_GLYPHS: &[(&str, &str)] = &[
    ("trending_up", " \u{2197} "),
    ("trending_down", " \u{2198} "),
    ("trending_flat", " \u{2192} "),
];

/// Remove every tag from `html`, keeping the text between them.
///
/// A handful of common entities are decoded. Whitespace runs are not touched.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;

    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }

    decode_entities(&out)
}

/// Plain text for a progress cell, with trend icon names turned into arrows.
pub fn progress_text(html: &str) -> String {
    let mut text = strip_tags(html);
    for (icon, glyph) in TREND_GLYPHS {
        text = text.replace(icon, glyph);
    }
    text.trim().to_string()
}

/// Value of the first `name="..."` attribute in `html`.
pub fn attribute(html: &str, name: &str) -> Option<String> {
    let needle = format!("{}=\"", name);
    let mut search_from = 0;

    while let Some(found) = html[search_from..].find(&needle) {
        let start = search_from + found;
        // Make sure we matched a whole attribute name, not a suffix such as
        // `data-title=` when looking for `title=`.
        let boundary_ok = start == 0
            || html[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_whitespace());
        let value_start = start + needle.len();

        if boundary_ok {
            let value_len = html[value_start..].find('"')?;
            let value = &html[value_start..value_start + value_len];
            return Some(decode_entities(value));
        }
        search_from = value_start;
    }

    None
}

/// Target of the first link in `html`.
pub fn first_href(html: &str) -> Option<String> {
    attribute(html, "href").filter(|href| !href.is_empty())
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
