//! Clean-up of model replies before they reach the user.
//!
//! Internal context blocks the model may echo are removed, characters
//! outside the Latin script are dropped, and a sponsor line is appended on
//! a fixed turn cadence.

use std::sync::LazyLock;

use regex::Regex;

use crate::locale::Locale;
use crate::types::{ConversationMessage, Role};

/// Internal block markers: opener and closer.
const BLOCKS: &[(&str, &str)] = &[
    ("[SQL]", "[/SQL]"),
    ("[DATA]", "[/DATA]"),
    ("<context>", "</context>"),
];

/// Markers removed on their own when they appear without a partner.
const STRAY: &[&str] = &["[/SQL]", "[/DATA]", "</context>"];

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)\[SQL\].*?(?:\[/SQL\]|\z)|\[DATA\].*?(?:\[/DATA\]|\z)|<context>.*?(?:</context>|\z)",
    )
    .expect("Invalid block regex")
});

static STRAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[/?(?:SQL|DATA)\]|</?context>").expect("Invalid stray tag regex")
});

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid blank line regex"));

/// Remove internal blocks and stray markers from a complete reply.
///
/// A block with no closer runs to the end of the text.
pub fn strip_internal_tags(text: &str) -> String {
    let without_blocks = BLOCK_RE.replace_all(text, "");
    let without_stray = STRAY_RE.replace_all(&without_blocks, "");
    BLANK_LINES
        .replace_all(&without_stray, "\n\n")
        .trim()
        .to_string()
}

/// Whether `c` belongs to the scripts replies may use.
fn is_allowed(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | ' '..='~'
        | '\u{00A0}'..='\u{024F}'
        | '\u{1E00}'..='\u{1EFF}'
        | '\u{2000}'..='\u{206F}'
        | '\u{20A0}'..='\u{20CF}'
        | '\u{2100}'..='\u{214F}'
    )
}

/// Drop characters outside the Latin script and common punctuation.
pub fn latin_only(text: &str) -> String {
    text.chars().filter(|c| is_allowed(*c)).collect()
}

/// Full clean-up of a complete reply.
pub fn clean_reply(text: &str) -> String {
    latin_only(&strip_internal_tags(text)).trim().to_string()
}

/// Sponsor line for the reply about to be sent, if this turn gets one.
///
/// Every `every`-th assistant turn carries a line; lines rotate. `0`
/// disables sponsoring.
pub fn sponsor_line<'a>(
    locale: &'a Locale,
    history: &[ConversationMessage],
    every: usize,
) -> Option<&'a str> {
    let sponsors = locale.text.sponsors;
    if every == 0 || sponsors.is_empty() {
        return None;
    }
    let turn = history.iter().filter(|m| m.role == Role::Assistant).count() + 1;
    if turn % every != 0 {
        return None;
    }
    Some(sponsors[(turn / every - 1) % sponsors.len()])
}

/// Append the sponsor line for this turn, if any.
pub fn with_sponsor(text: String, locale: &Locale, history: &[ConversationMessage], every: usize) -> String {
    match sponsor_line(locale, history, every) {
        Some(line) => format!("{}\n\n{}", text, line),
        None => text,
    }
}

// =============================================================================
// StreamCleaner
// =============================================================================

/// Incremental version of [`clean_reply`] for streamed replies.
///
/// Markers may be split across chunks, so text that could still turn into
/// a marker is held back until the next chunk or [`StreamCleaner::finish`].
#[derive(Debug, Default)]
pub struct StreamCleaner {
    pending: String,
    /// Closing marker of the block being skipped.
    skipping: Option<&'static str>,
}

enum Marker {
    Open(&'static str, &'static str),
    Stray(&'static str),
    Partial,
    None,
}

impl StreamCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and get the text that is safe to emit now.
    pub fn push(&mut self, chunk: &str) -> String {
        self.pending.push_str(chunk);
        let mut out = String::new();

        loop {
            if let Some(close) = self.skipping {
                match find_ignore_case(&self.pending, close) {
                    Some(at) => {
                        self.pending.drain(..at + close.len());
                        self.skipping = None;
                        continue;
                    }
                    None => {
                        // Keep a possible partial closer only.
                        let keep = self.pending.rfind(['[', '<']).unwrap_or(self.pending.len());
                        self.pending.drain(..keep);
                        break;
                    }
                }
            }

            let Some(at) = self.pending.find(['[', '<']) else {
                out.push_str(&self.pending);
                self.pending.clear();
                break;
            };
            out.push_str(&self.pending[..at]);
            self.pending.drain(..at);

            match classify_marker(&self.pending) {
                Marker::Open(open, close) => {
                    self.pending.drain(..open.len());
                    self.skipping = Some(close);
                }
                Marker::Stray(tag) => {
                    self.pending.drain(..tag.len());
                }
                Marker::Partial => break,
                Marker::None => {
                    // The bracket is ordinary text.
                    out.push_str(&self.pending[..1]);
                    self.pending.drain(..1);
                }
            }
        }

        latin_only(&out)
    }

    /// Flush what is left at the end of the stream.
    ///
    /// An unterminated block is dropped.
    pub fn finish(self) -> String {
        if self.skipping.is_some() {
            return String::new();
        }
        latin_only(&self.pending)
    }
}

fn classify_marker(text: &str) -> Marker {
    let bytes = text.as_bytes();
    let mut partial = false;
    for (open, close) in BLOCKS {
        match prefix_state(bytes, open.as_bytes()) {
            Some(true) => return Marker::Open(open, close),
            Some(false) => partial = true,
            None => {}
        }
    }
    for tag in STRAY {
        match prefix_state(bytes, tag.as_bytes()) {
            Some(true) => return Marker::Stray(tag),
            Some(false) => partial = true,
            None => {}
        }
    }
    if partial {
        Marker::Partial
    } else {
        Marker::None
    }
}

/// `Some(true)` if `text` starts with `tag`, `Some(false)` if `text` is a
/// strict prefix of `tag`, `None` otherwise. ASCII case-insensitive.
fn prefix_state(text: &[u8], tag: &[u8]) -> Option<bool> {
    if text.len() >= tag.len() {
        text[..tag.len()].eq_ignore_ascii_case(tag).then_some(true)
    } else {
        tag[..text.len()].eq_ignore_ascii_case(text).then_some(false)
    }
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(&needle.to_ascii_lowercase())
}
