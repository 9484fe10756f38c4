//! System prompts and prompt assembly.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use tirage_core::error::TirageError;

use crate::types::{ConversationMessage, Role};

/// Per-language system instructions, loaded from `<language>.txt` files.
#[derive(Debug, Clone, Default)]
pub struct SystemPrompts {
    prompts: HashMap<String, String>,
}

impl SystemPrompts {
    /// Load every `*.txt` file of `dir`, keyed by file stem.
    ///
    /// Empty files are skipped.
    pub fn load_dir(dir: &Path) -> Result<Self, TirageError> {
        let mut prompts = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(language) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path)?;
            let text = text.trim();
            if text.is_empty() {
                warn!(path = %path.display(), "Skipping empty system prompt");
                continue;
            }
            prompts.insert(language.to_lowercase(), text.to_string());
        }
        info!(count = prompts.len(), dir = %dir.display(), "System prompts loaded");
        Ok(Self { prompts })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prompts: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, language: &str) -> Option<&str> {
        self.prompts.get(language).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

/// The last `max_turns` history messages plus the current one, with
/// consecutive same-role messages merged into one.
pub fn conversation(
    history: &[ConversationMessage],
    current: &str,
    max_turns: usize,
) -> Vec<ConversationMessage> {
    let start = history.len().saturating_sub(max_turns);
    let mut merged: Vec<ConversationMessage> = Vec::with_capacity(max_turns + 1);
    let turns = history[start..]
        .iter()
        .map(|m| (m.role, m.text.trim()))
        .chain(std::iter::once((Role::User, current.trim())));
    for (role, text) in turns {
        if text.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.role == role => {
                last.text.push('\n');
                last.text.push_str(text);
            }
            _ => merged.push(ConversationMessage {
                role,
                text: text.to_string(),
            }),
        }
    }
    // Providers expect the conversation to open with a user turn.
    if merged.first().is_some_and(|m| m.role == Role::Assistant) {
        merged.remove(0);
    }
    merged
}

/// Structured data block for one turn.
pub fn data_block(text: &str) -> String {
    format!("[DATA]\n{}\n[/DATA]", text.trim())
}

/// Session summary block.
pub fn session_block(text: &str) -> String {
    format!("<context>\n{}\n</context>", text.trim())
}

/// System instructions followed by the turn's context blocks.
pub fn compose_system(base: &str, blocks: &[String]) -> String {
    let mut out = base.trim().to_string();
    for block in blocks.iter().filter(|b| !b.trim().is_empty()) {
        out.push_str("\n\n");
        out.push_str(block);
    }
    out
}
