//! Structural mapping: transcription text → ordered [`StructuralBlock`]s.
//!
//! Classification is line-oriented. Each line is trimmed; blank lines only
//! separate content and never produce a block. The remaining lines are
//! offered to the rules of a [`MapperPolicy`] in order, and the first rule
//! that matches decides the block. A line no rule claims becomes a
//! [`StructuralBlock::Paragraph`], so content is never dropped.
//!
//! Rules are plain data (a regex with a `text` capture plus an action), so a
//! caller can prepend a rule for a model's house style without touching the
//! mapper:
//!
//! ```rust
//! use notes2docx::{map_blocks, LineRule, MapperPolicy, RuleAction, StructuralBlock};
//!
//! let policy = MapperPolicy::default()
//!     .with_rule_first(LineRule::new("arrow-item", r"^=>\s+(?P<text>.+)$", RuleAction::Bullet).unwrap());
//! let blocks = map_blocks("=> Oxidation is loss", &policy);
//! assert_eq!(blocks, vec![StructuralBlock::bullet("Oxidation is loss")]);
//! ```
//!
//! Chemistry notation is not interpreted: subscripts, charges, arrows and
//! LaTeX reach the document exactly as the model wrote them.

use crate::error::NotesError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A classified unit of transcribed content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuralBlock {
    /// Section title; `level` 1 is the most prominent.
    Heading { level: u8, text: String },
    /// Body text.
    Paragraph { text: String },
    /// List item; `ordered` items were numbered in the transcription.
    BulletItem { text: String, ordered: bool },
    /// `[DIAGRAM: …]` placeholder for a drawing on the page.
    Diagram { text: String },
}

impl StructuralBlock {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        StructuralBlock::Heading {
            level,
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        StructuralBlock::Paragraph { text: text.into() }
    }

    pub fn bullet(text: impl Into<String>) -> Self {
        StructuralBlock::BulletItem {
            text: text.into(),
            ordered: false,
        }
    }

    pub fn numbered(text: impl Into<String>) -> Self {
        StructuralBlock::BulletItem {
            text: text.into(),
            ordered: true,
        }
    }

    pub fn diagram(text: impl Into<String>) -> Self {
        StructuralBlock::Diagram { text: text.into() }
    }

    /// The block's text without any structural marker.
    pub fn text(&self) -> &str {
        match self {
            StructuralBlock::Heading { text, .. }
            | StructuralBlock::Paragraph { text }
            | StructuralBlock::BulletItem { text, .. }
            | StructuralBlock::Diagram { text } => text,
        }
    }
}

/// How a heading rule determines the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    /// Number of characters in the `marker` capture (`##` → 2).
    FromMarker,
    Fixed(u8),
}

/// What a matching rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Heading(HeadingLevel),
    Bullet,
    Numbered,
    Diagram,
}

/// One classification rule.
///
/// The pattern must define a `text` capture group; [`HeadingLevel::FromMarker`]
/// additionally needs a `marker` group. A match whose `text` is empty after
/// trimming is treated as no match.
#[derive(Debug, Clone)]
pub struct LineRule {
    name: String,
    pattern: Regex,
    action: RuleAction,
}

impl LineRule {
    /// Compile a rule.
    ///
    /// # Errors
    /// [`NotesError::InvalidConfig`] if the pattern does not compile or lacks
    /// the capture groups the action needs.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        action: RuleAction,
    ) -> Result<Self, NotesError> {
        let name = name.into();
        let regex = Regex::new(pattern)
            .map_err(|e| NotesError::InvalidConfig(format!("rule '{name}': {e}")))?;

        let has_group = |g: &str| regex.capture_names().any(|n| n == Some(g));
        if !has_group("text") {
            return Err(NotesError::InvalidConfig(format!(
                "rule '{name}': pattern has no (?P<text>…) group"
            )));
        }
        if action == RuleAction::Heading(HeadingLevel::FromMarker) && !has_group("marker") {
            return Err(NotesError::InvalidConfig(format!(
                "rule '{name}': heading level from marker needs a (?P<marker>…) group"
            )));
        }

        Ok(Self::from_regex(name, regex, action))
    }

    fn from_regex(name: impl Into<String>, pattern: Regex, action: RuleAction) -> Self {
        Self {
            name: name.into(),
            pattern,
            action,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> RuleAction {
        self.action
    }

    /// Classify a trimmed, non-empty line, or `None` if the rule does not apply.
    pub fn apply(&self, line: &str) -> Option<StructuralBlock> {
        let caps = self.pattern.captures(line)?;
        let text = caps.name("text")?.as_str().trim();
        if text.is_empty() {
            return None;
        }

        Some(match self.action {
            RuleAction::Heading(HeadingLevel::FromMarker) => {
                let marker = caps.name("marker")?.as_str().chars().count();
                StructuralBlock::heading(clamp_level(marker), text)
            }
            RuleAction::Heading(HeadingLevel::Fixed(level)) => {
                StructuralBlock::heading(clamp_level(level as usize), text)
            }
            RuleAction::Bullet => StructuralBlock::bullet(text),
            RuleAction::Numbered => StructuralBlock::numbered(text),
            RuleAction::Diagram => StructuralBlock::diagram(text),
        })
    }
}

fn clamp_level(level: usize) -> u8 {
    level.clamp(1, 6) as u8
}

// ── Default rules ────────────────────────────────────────────────────────────

static DEFAULT_RULES: Lazy<Vec<LineRule>> = Lazy::new(|| {
    vec![
        // `# Title` … `###### Title`
        LineRule::from_regex(
            "markdown-heading",
            Regex::new(r"^(?P<marker>#{1,6})\s+(?P<text>.+)$").unwrap(),
            RuleAction::Heading(HeadingLevel::FromMarker),
        ),
        // A line that is nothing but `**Title**`, optionally with a colon.
        LineRule::from_regex(
            "bold-title",
            Regex::new(r"^\*\*(?P<text>[^*]+?):?\*\*:?$").unwrap(),
            RuleAction::Heading(HeadingLevel::Fixed(3)),
        ),
        LineRule::from_regex(
            "diagram",
            Regex::new(r"(?i)^(?P<text>\[(?:diagram|figure|graph)\b.*)$").unwrap(),
            RuleAction::Diagram,
        ),
        // `+` is deliberately not a marker: `+ H2O → …` continues an equation.
        LineRule::from_regex(
            "bullet",
            Regex::new(r"^[-*•]\s+(?P<text>.+)$").unwrap(),
            RuleAction::Bullet,
        ),
        LineRule::from_regex(
            "numbered",
            Regex::new(r"^\d{1,3}[.)]\s+(?P<text>.+)$").unwrap(),
            RuleAction::Numbered,
        ),
    ]
});

/// Ordered list of classification rules.
#[derive(Debug, Clone)]
pub struct MapperPolicy {
    rules: Vec<LineRule>,
}

impl Default for MapperPolicy {
    /// Markdown headings, bold titles, diagram placeholders, bullets and
    /// numbered items, tried in that order.
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }
}

impl MapperPolicy {
    pub fn new(rules: Vec<LineRule>) -> Self {
        Self { rules }
    }

    /// A policy without rules: every line becomes a paragraph.
    pub fn paragraphs_only() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule (lowest precedence).
    pub fn with_rule(mut self, rule: LineRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Insert a rule ahead of all others.
    pub fn with_rule_first(mut self, rule: LineRule) -> Self {
        self.rules.insert(0, rule);
        self
    }

    /// Drop every rule with the given name.
    pub fn without_rule(mut self, name: &str) -> Self {
        self.rules.retain(|r| r.name != name);
        self
    }

    pub fn rules(&self) -> &[LineRule] {
        &self.rules
    }

    /// Classify one line. Blank lines yield `None`.
    pub fn classify(&self, line: &str) -> Option<StructuralBlock> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        Some(
            self.rules
                .iter()
                .find_map(|rule| rule.apply(line))
                .unwrap_or_else(|| StructuralBlock::paragraph(line)),
        )
    }
}

/// Map a transcription into blocks, one per non-blank line, in order.
///
/// Empty or whitespace-only input yields an empty vector.
pub fn map_blocks(text: &str, policy: &MapperPolicy) -> Vec<StructuralBlock> {
    text.lines().filter_map(|line| policy.classify(line)).collect()
}

/// Markdown projection of `blocks`, one block per line.
///
/// Mapping the result with [`MapperPolicy::default`] yields the same blocks
/// for any sequence that policy produced. Numbered items are renumbered from
/// 1 within each contiguous run.
pub fn to_plain_text(blocks: &[StructuralBlock]) -> String {
    let mut out = String::new();
    let mut ordinal = 0usize;

    for (i, block) in blocks.iter().enumerate() {
        if !matches!(block, StructuralBlock::BulletItem { ordered: true, .. }) {
            ordinal = 0;
        }
        match block {
            StructuralBlock::Heading { level, text } => {
                if i > 0 {
                    out.push('\n');
                }
                out.push_str(&"#".repeat(clamp_level(*level as usize) as usize));
                out.push(' ');
                out.push_str(text);
            }
            StructuralBlock::Paragraph { text } | StructuralBlock::Diagram { text } => {
                out.push_str(text);
            }
            StructuralBlock::BulletItem {
                text,
                ordered: false,
            } => {
                out.push_str("- ");
                out.push_str(text);
            }
            StructuralBlock::BulletItem {
                text,
                ordered: true,
            } => {
                ordinal += 1;
                out.push_str(&format!("{ordinal}. {text}"));
            }
        }
        out.push('\n');
    }

    out
}
