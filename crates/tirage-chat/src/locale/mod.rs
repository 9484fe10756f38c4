//! Per-language pattern sets, response catalogs and fixed texts.
//!
//! Patterns and catalogs are compiled once per language and shared; a
//! [`Locale`] pairs them with the game rules of the running instance.

mod en;
mod fr;

use chrono::Weekday;
use regex::Regex;

use tirage_core::types::{GameKind, GameRules};

use crate::types::{ComplimentKind, OutOfRangeCase};

// =============================================================================
// Response catalogs
// =============================================================================

/// Reply templates grouped by escalation tier, mildest first.
///
/// Templates may use `{n}`, `{max}`, `{diff}`, `{s}`, `{label}` and `{game}`.
#[derive(Debug)]
pub struct TieredPool {
    pub tiers: &'static [&'static [&'static str]],
}

impl TieredPool {
    /// Highest tier index.
    pub fn max_tier(&self) -> usize {
        self.tiers.len().saturating_sub(1)
    }

    /// Templates of tier `min(streak, max_tier)`.
    pub fn tier(&self, streak: usize) -> &'static [&'static str] {
        self.tiers
            .get(streak.min(self.max_tier()))
            .copied()
            .unwrap_or(&[])
    }
}

#[derive(Debug)]
pub struct ResponseCatalog {
    pub insult: TieredPool,
    pub threat: TieredPool,
    pub praise: TieredPool,
    pub affection: TieredPool,
    pub thanks: TieredPool,
    pub zero_neg: TieredPool,
    pub close: TieredPool,
    pub high: TieredPool,
    pub secondary: TieredPool,
}

impl ResponseCatalog {
    pub fn compliment(&self, kind: ComplimentKind) -> &TieredPool {
        match kind {
            ComplimentKind::Praise => &self.praise,
            ComplimentKind::Affection => &self.affection,
            ComplimentKind::Thanks => &self.thanks,
        }
    }

    pub fn out_of_range(&self, case: OutOfRangeCase) -> &TieredPool {
        match case {
            OutOfRangeCase::ZeroNeg => &self.zero_neg,
            OutOfRangeCase::Close => &self.close,
            OutOfRangeCase::High => &self.high,
            OutOfRangeCase::Secondary => &self.secondary,
        }
    }
}

/// Fixed texts of one language.
#[derive(Debug)]
pub struct LocaleText {
    /// Static reply used whenever the external service is not usable.
    pub fallback: &'static str,
    /// Prefix acknowledging an insult that also carries a real question.
    pub ack_insult: &'static str,
    /// Prefix acknowledging a compliment that also carries a real question.
    pub ack_compliment: &'static str,
    pub chance_label: &'static str,
    pub star_label: &'static str,
    pub main_label: &'static str,
    /// Restatement of a short follow-up; `{previous}` and `{reply}`.
    pub continuation: &'static str,
    pub sponsors: &'static [&'static str],
    /// Pitch instruction; `{count}` is the number of grids.
    pub pitch_instruction: &'static str,
    /// Name of the language, for instructions sent to the model.
    pub language_name: &'static str,
}

// =============================================================================
// Patterns
// =============================================================================

/// Compiled classification patterns of one language.
///
/// Regexes run against the folded (lowercase, unaccented) message; word
/// lists are compared with the de-obfuscated words.
#[derive(Debug)]
pub struct LocalePatterns {
    pub continuation: &'static [&'static str],

    pub insult_words: &'static [&'static str],
    pub insult_phrases: Vec<Regex>,
    pub threats: Vec<Regex>,
    pub assistant_words: &'static [&'static str],
    pub domain_words: &'static [&'static str],

    pub affection: Vec<Regex>,
    pub thanks: Regex,
    pub praise_words: &'static [&'static str],
    pub praise_phrases: Vec<Regex>,

    pub next_draw: Vec<Regex>,
    pub draw_trigger: Vec<Regex>,
    pub latest_draw: Vec<Regex>,
    pub yesterday: Regex,
    /// Relative weekday references; capture group `day`.
    pub past_weekday: Vec<Regex>,
    pub weekdays: &'static [(&'static str, Weekday)],
    pub months: &'static [(&'static str, u32)],
    /// Spelled dates; capture groups `d`, `m` and optional `y`.
    pub spelled_dates: Vec<Regex>,

    pub temporal: Vec<Regex>,

    /// Two-number comparisons; capture groups `a` and `b`.
    pub comparison: Vec<Regex>,
    pub ranking: Vec<Regex>,
    pub ranking_least: Regex,
    pub ranking_gap: Regex,
    pub hot: Regex,
    pub cold: Regex,
    pub overdue: Regex,
    pub numbers_context: Regex,

    /// Mentions of the secondary pool in general.
    pub secondary_terms: Regex,
    /// Explicit secondary-number references; capture group `n`.
    pub secondary_number: Vec<Regex>,
    /// Explicit main-number references; capture group `n`.
    pub primary_number: Vec<Regex>,
}

pub(crate) fn mk(pats: &[&str]) -> Vec<Regex> {
    pats.iter()
        .map(|p| Regex::new(p).expect("Invalid locale regex"))
        .collect()
}

pub(crate) fn re(pat: &str) -> Regex {
    Regex::new(pat).expect("Invalid locale regex")
}

/// `a|b|c` over month names, longest first.
pub(crate) fn month_alternation(months: &[(&str, u32)]) -> String {
    let mut names: Vec<&str> = months.iter().map(|(name, _)| *name).collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    names.join("|")
}

// =============================================================================
// Locale
// =============================================================================

/// Everything language-specific the chat core needs for one request.
#[derive(Debug, Clone)]
pub struct Locale {
    pub language: &'static str,
    pub rules: GameRules,
    pub patterns: &'static LocalePatterns,
    pub catalog: &'static ResponseCatalog,
    pub text: &'static LocaleText,
}

impl Locale {
    pub fn english(rules: GameRules) -> Self {
        Self {
            language: "en",
            rules,
            patterns: &en::PATTERNS,
            catalog: &en::CATALOG,
            text: &en::TEXT,
        }
    }

    pub fn french(rules: GameRules) -> Self {
        Self {
            language: "fr",
            rules,
            patterns: &fr::PATTERNS,
            catalog: &fr::CATALOG,
            text: &fr::TEXT,
        }
    }

    /// Name of the secondary number for the running game.
    pub fn secondary_label(&self) -> &'static str {
        match self.rules.kind {
            GameKind::Loto => self.text.chance_label,
            GameKind::Euromillions => self.text.star_label,
        }
    }

    pub fn month_number(&self, name: &str) -> Option<u32> {
        self.patterns
            .months
            .iter()
            .find(|(m, _)| *m == name)
            .map(|(_, n)| *n)
    }

    pub fn weekday(&self, name: &str) -> Option<Weekday> {
        self.patterns
            .weekdays
            .iter()
            .find(|(d, _)| *d == name)
            .map(|(_, w)| *w)
    }
}

/// Available locales, resolved by language tag.
#[derive(Debug, Clone)]
pub struct LocaleRegistry {
    locales: Vec<Locale>,
    default_language: String,
}

impl LocaleRegistry {
    pub fn new(rules: GameRules, default_language: &str) -> Self {
        Self {
            locales: vec![Locale::french(rules.clone()), Locale::english(rules)],
            default_language: primary_subtag(default_language),
        }
    }

    /// Locale for `language` (`fr`, `en-GB`, ...), or the default one.
    pub fn get(&self, language: &str) -> &Locale {
        let wanted = primary_subtag(language);
        self.find(&wanted)
            .or_else(|| self.find(&self.default_language))
            .unwrap_or(&self.locales[0])
    }

    pub fn languages(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.locales.iter().map(|l| l.language)
    }

    fn find(&self, language: &str) -> Option<&Locale> {
        self.locales.iter().find(|l| l.language == language)
    }
}

fn primary_subtag(tag: &str) -> String {
    tag.trim()
        .split(|c| c == '-' || c == '_')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}
