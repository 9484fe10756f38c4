//! Session context: numbers and draws the user already talked about.
//!
//! The block only feeds the generative call. Short sessions with fewer than
//! two distinct references produce nothing.

use chrono::NaiveDate;

use tirage_core::types::{DrawRef, NumberKind};

use crate::classifier::{ClassifyContext, IntentClassifier};
use crate::locale::Locale;
use crate::types::{ComplexQuery, ConversationMessage, Intent, Role};

/// Minimum distinct references before a summary is emitted.
const MIN_REFERENCES: usize = 2;

/// Something specific the user referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRef {
    Number { number: u32, kind: NumberKind },
    Draw(DrawRef),
}

// =============================================================================
// SessionContextBuilder
// =============================================================================

/// Collects references from user messages and renders a labeled summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionContextBuilder {
    classifier: IntentClassifier,
}

impl SessionContextBuilder {
    pub fn new(classifier: IntentClassifier) -> Self {
        Self { classifier }
    }

    /// Distinct references in order of first mention, history first.
    pub fn references(
        &self,
        history: &[ConversationMessage],
        message: &str,
        locale: &Locale,
        today: NaiveDate,
    ) -> Vec<SessionRef> {
        let ctx = ClassifyContext::detached(today);
        let texts = history
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.text.as_str())
            .chain(std::iter::once(message));

        let mut refs: Vec<SessionRef> = Vec::new();
        for text in texts {
            let Some(intent) = self.classifier.classify_analytic(text, &ctx, locale) else {
                continue;
            };
            for r in refs_of(&intent) {
                if !refs.contains(&r) {
                    refs.push(r);
                }
            }
        }
        refs
    }

    /// Summary block, or `None` below the reference threshold.
    pub fn build(
        &self,
        history: &[ConversationMessage],
        message: &str,
        locale: &Locale,
        today: NaiveDate,
    ) -> Option<String> {
        let refs = self.references(history, message, locale, today);
        if refs.len() < MIN_REFERENCES {
            return None;
        }
        Some(render(&refs))
    }
}

fn refs_of(intent: &Intent) -> Vec<SessionRef> {
    match intent {
        Intent::SingleNumberLookup { number, kind } => vec![SessionRef::Number {
            number: *number,
            kind: *kind,
        }],
        Intent::ComplexQuery(ComplexQuery::Comparison {
            first,
            second,
            kind,
        }) => vec![
            SessionRef::Number {
                number: *first,
                kind: *kind,
            },
            SessionRef::Number {
                number: *second,
                kind: *kind,
            },
        ],
        Intent::HistoricalDrawLookup(draw) => vec![SessionRef::Draw(*draw)],
        _ => Vec::new(),
    }
}

fn render(refs: &[SessionRef]) -> String {
    let numbers_of = |wanted: NumberKind| -> Vec<String> {
        refs.iter()
            .filter_map(|r| match r {
                SessionRef::Number { number, kind } if *kind == wanted => Some(number.to_string()),
                _ => None,
            })
            .collect()
    };
    let draws: Vec<String> = refs
        .iter()
        .filter_map(|r| match r {
            SessionRef::Draw(d) => Some(d.to_string()),
            _ => None,
        })
        .collect();

    let mut out = String::from("Referenced earlier in this session:");
    for (label, items) in [
        ("main numbers", numbers_of(NumberKind::Primary)),
        ("bonus numbers", numbers_of(NumberKind::Secondary)),
        ("draws", draws),
    ] {
        if !items.is_empty() {
            out.push_str(&format!("\n- {}: {}", label, items.join(", ")));
        }
    }
    out
}
