//! Cleanup: deterministic removal of model artefacts before mapping.
//!
//! Even a well-prompted model sometimes wraps its answer in a
//! ` ```markdown ` fence, emits `\r\n`, sprinkles zero-width characters, or
//! invents `![figure](figure.png)` links for drawings it was told to describe
//! as `[DIAGRAM: …]`. These passes fix that without touching the notes
//! themselves: chemistry notation, arrows and LaTeX pass through verbatim.
//!
//! ## Rule Order
//!
//! Line endings are normalised before fence stripping so the fence regex
//! sees `\n` only; image links are rewritten last so their placeholder
//! lines are not trimmed away.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to the raw model output.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip outer markdown fences
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Unescape `\[DIAGRAM …\]` placeholders
/// 6. Rewrite image links as `[DIAGRAM: alt]` placeholders
/// 7. Trim leading/trailing blank lines
pub fn clean_transcription(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_markdown_fences(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = unescape_diagram_placeholders(&s);
    let s = images_to_diagrams(&s);
    s.trim_matches('\n').to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md|text)?[ \t]*\n(.*)\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 3: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Unescape diagram placeholders ────────────────────────────────────
//
// Some models escape the brackets (`\[DIAGRAM: …\]`) as if writing strict
// Markdown. Only placeholders are touched; `\[ … \]` display math is kept.

static RE_ESCAPED_DIAGRAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\s*)\\\[(DIAGRAM\b[^\n]*?)\\\]").unwrap());

fn unescape_diagram_placeholders(input: &str) -> String {
    RE_ESCAPED_DIAGRAM.replace_all(input, "$1[$2]").to_string()
}

// ── Rule 6: Image links become diagram placeholders ──────────────────────────
//
// A photographed notebook page has no image files to link to, so every
// `![alt](url)` is a drawing the model failed to describe in the requested
// form. The alt text is the description; links without one are dropped.

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

fn images_to_diagrams(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let alt = caps[1].trim();
            if alt.is_empty() {
                String::new()
            } else {
                format!("[DIAGRAM: {}]", alt)
            }
        })
        .to_string()
}
