//! Canned replies for insults, compliments and out-of-range numbers.
//!
//! Replies escalate with the number of consecutive earlier user messages of
//! the same category and avoid repeating anything the assistant already said
//! in the visible history.

use chrono::NaiveDate;
use rand::seq::IndexedRandom;
use rand::Rng;

use tirage_core::types::NumberKind;

use crate::classifier::{ClassifyContext, IntentClassifier};
use crate::locale::{Locale, TieredPool};
use crate::types::{ConversationMessage, InsultTarget, Intent, PipelineResult, Role, Source};

/// Social categories that get tiered canned replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationCategory {
    Insult,
    Compliment,
    OutOfRange,
}

impl EscalationCategory {
    /// Category of an intent; domain-directed insults have none.
    pub fn of(intent: &Intent) -> Option<Self> {
        match intent {
            Intent::Insult {
                target: InsultTarget::Assistant,
                ..
            } => Some(EscalationCategory::Insult),
            Intent::Compliment(_) => Some(EscalationCategory::Compliment),
            Intent::OutOfRangeNumber(_) => Some(EscalationCategory::OutOfRange),
            _ => None,
        }
    }

    pub fn source(&self) -> Source {
        match self {
            EscalationCategory::Insult => Source::InsultResponse,
            EscalationCategory::Compliment => Source::ComplimentResponse,
            EscalationCategory::OutOfRange => Source::OutOfRangeResponse,
        }
    }
}

/// Picks tiered replies from the locale catalog.
#[derive(Debug, Default, Clone, Copy)]
pub struct EscalationResponder {
    classifier: IntentClassifier,
}

impl EscalationResponder {
    pub fn new(classifier: IntentClassifier) -> Self {
        Self { classifier }
    }

    /// Consecutive earlier user messages of `category`, scanning back from
    /// the newest. Each is classified on its own.
    pub fn streak(
        &self,
        category: EscalationCategory,
        history: &[ConversationMessage],
        locale: &Locale,
        today: NaiveDate,
    ) -> usize {
        let ctx = ClassifyContext::detached(today);
        history
            .iter()
            .rev()
            .filter(|m| m.role == Role::User)
            .take_while(|m| {
                let intent = self.classifier.classify(&m.text, &ctx, locale);
                EscalationCategory::of(&intent) == Some(category)
            })
            .count()
    }

    /// Canned reply for `intent`, or `None` when it does not escalate.
    pub fn respond<R: Rng + ?Sized>(
        &self,
        intent: &Intent,
        history: &[ConversationMessage],
        locale: &Locale,
        today: NaiveDate,
        rng: &mut R,
    ) -> Option<PipelineResult> {
        let category = EscalationCategory::of(intent)?;
        let catalog = locale.catalog;
        let pool = match intent {
            Intent::Insult { threat: true, .. } => &catalog.threat,
            Intent::Insult { .. } => &catalog.insult,
            Intent::Compliment(kind) => catalog.compliment(*kind),
            Intent::OutOfRangeNumber(o) => catalog.out_of_range(o.case),
            _ => return None,
        };
        let streak = self.streak(category, history, locale, today);
        let vars = TemplateVars::for_intent(intent, locale);
        let text = pick(pool, streak, history, &vars, rng);
        tracing::debug!(
            category = ?category,
            streak,
            tier = streak.min(pool.max_tier()),
            "Escalation reply selected"
        );
        Some(PipelineResult::new(text, category.source()))
    }
}

fn pick<R: Rng + ?Sized>(
    pool: &TieredPool,
    streak: usize,
    history: &[ConversationMessage],
    vars: &TemplateVars,
    rng: &mut R,
) -> String {
    let candidates: Vec<String> = pool.tier(streak).iter().map(|t| vars.render(t)).collect();
    let fresh: Vec<&String> = candidates
        .iter()
        .filter(|c| {
            !history
                .iter()
                .any(|m| m.role == Role::Assistant && m.text == **c)
        })
        .collect();

    let chosen = if fresh.is_empty() {
        candidates.choose(rng)
    } else {
        fresh.choose(rng).copied()
    };
    chosen.cloned().unwrap_or_default()
}

/// Placeholder values for catalog templates.
#[derive(Debug, Default)]
struct TemplateVars {
    n: String,
    max: String,
    diff: String,
    plural: &'static str,
    label: String,
    game: String,
}

impl TemplateVars {
    fn for_intent(intent: &Intent, locale: &Locale) -> Self {
        let game = locale.rules.name.to_string();
        match intent {
            Intent::OutOfRangeNumber(o) => {
                let diff = o.distance();
                Self {
                    n: o.value.to_string(),
                    max: o.bound.to_string(),
                    diff: diff.to_string(),
                    plural: if diff > 1 { "s" } else { "" },
                    label: match o.kind {
                        NumberKind::Secondary => locale.secondary_label().to_string(),
                        NumberKind::Primary => locale.text.main_label.to_string(),
                    },
                    game,
                }
            }
            _ => Self {
                game,
                ..Self::default()
            },
        }
    }

    fn render(&self, template: &str) -> String {
        template
            .replace("{n}", &self.n)
            .replace("{max}", &self.max)
            .replace("{diff}", &self.diff)
            .replace("{s}", self.plural)
            .replace("{label}", &self.label)
            .replace("{game}", &self.game)
    }
}
