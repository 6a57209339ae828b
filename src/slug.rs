//! Title → URL slug conversion.
//!
//! Slugs name the per-topic output files (`topics/<slug>.html`), so the
//! transform must be stable across runs: the same title always yields the same
//! slug, with no locale or randomness involved.
//!
//! ## Rules
//!
//! Applied in order to the lower-cased title:
//!
//! 1. Whitespace runs become a single `-`
//! 2. Accented and typographic characters from a fixed table map to ASCII
//!    (`é` → `e`, `ß` → `s`, `/` → `-`, ...)
//! 3. `&` becomes `-and-`
//! 4. Anything that is not `[a-z0-9_-]` is dropped
//! 5. Repeated `-` collapse to one, leading/trailing `-` are trimmed
//!
//! ```text
//! "Café & Crème Brûlée!"  →  "cafe-and-creme-brulee"
//! "  Hello,   World  "    →  "hello-world"
//! ""                      →  ""
//! None                    →  "untitled-topic"
//! ```
//!
//! An empty result is possible (empty title, or a title made only of
//! characters that get stripped). Callers treat it the same as [`UNTITLED`].

/// Slug returned for a missing or non-string title.
pub const UNTITLED: &str = "untitled-topic";

const FROM: &str = "àáâäæãåāăąçćčđďèéêëēėęěğǵḧîïíīįìłḿñńǹňôöòóœøōõőṕŕřßśšşșťțûüùúūǘůűųẃẍÿýžźż·/_,:;";
const TO: &str = "aaaaaaaaaacccddeeeeeeeegghiiiiiilmnnnnoooooooooprrsssssttuuuuuuuuuwxyyzzz------";

/// Convert a topic title into a URL-safe slug.
pub fn slugify(title: Option<&str>) -> String {
    let Some(title) = title else {
        return UNTITLED.to_string();
    };

    // Pass 1: whitespace, transliteration and `&` expansion.
    let mut expanded = String::with_capacity(title.len());
    let mut in_whitespace = false;
    for c in title.to_lowercase().chars() {
        if is_space(c) {
            if !in_whitespace {
                expanded.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        match c {
            '&' => expanded.push_str("-and-"),
            c => expanded.push(transliterate(c)),
        }
    }

    // Pass 2: strip, collapse and trim hyphens.
    let mut slug = String::with_capacity(expanded.len());
    for c in expanded.chars() {
        if c == '-' {
            if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        } else if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c);
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// True when a slug cannot name a page: empty, or the untitled sentinel.
pub fn is_unusable(slug: &str) -> bool {
    slug.is_empty() || slug == UNTITLED
}

fn transliterate(c: char) -> char {
    FROM.chars()
        .zip(TO.chars())
        .find_map(|(from, to)| (from == c).then_some(to))
        .unwrap_or(c)
}

// JavaScript's `\s`: Unicode White_Space without U+0085, plus U+FEFF.
fn is_space(c: char) -> bool {
    (c.is_whitespace() && c != '\u{85}') || c == '\u{feff}'
}
