//! Intent classification.
//!
//! Runs an ordered table of matchers over the normalized message and
//! returns the first match. Order is significant: social intents win over
//! analytic ones, and explicit draw lookups win over temporal filters.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::{Captures, Regex};

use tirage_core::types::{CategoryKind, DrawRef, NumberKind, RankOrder, SortKey};

use crate::locale::Locale;
use crate::normalize::NormalizedText;
use crate::types::{
    ComplexQuery, ComplimentKind, ConversationMessage, Grid, InsultTarget, Intent, OutOfRange,
    OutOfRangeCase, Role, TemporalScope,
};

/// Longest bare reply still treated as a follow-up.
const MAX_CONTINUATION_LEN: usize = 25;

/// Ranking size when the message names none.
const DEFAULT_RANK_LIMIT: usize = 5;

// =============================================================================
// Language-independent patterns
// =============================================================================

struct DatePatterns {
    iso: Regex,
    numeric: Regex,
}

static DATE_PATTERNS: LazyLock<DatePatterns> = LazyLock::new(|| DatePatterns {
    iso: Regex::new(r"\b(?P<y>(?:19|20)\d{2})-(?P<m>\d{1,2})-(?P<d>\d{1,2})\b").unwrap(),
    numeric: Regex::new(r"\b(?P<d>\d{1,2})[/.](?P<m>\d{1,2})(?:[/.](?P<y>\d{4}|\d{2}))?\b")
        .unwrap(),
});

/// Secondary-number markers of a grid; capture groups `a` and optional `b`.
static GRID_SECONDARY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:\+|\bnumero chance\b|\bn° ?chance\b|\bchance\b|\blucky stars?\b|\bstars?\b|\betoiles?\b|\bbonus\b|\bcomplementaire\b) ?:? ?(?P<a>\d{1,3})(?:(?: ?, ?| et | and | ?- ?| )(?P<b>\d{1,3}))?\b",
        r"\((?P<a>\d{1,3})(?: ?[,-] ?(?P<b>\d{1,3}))?\)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid grid regex"))
    .collect()
});

static STANDALONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").unwrap());

static RANK_LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\btop ?(?P<n>\d{1,2})\b|\b(?P<m>\d{1,2}) (?:most|least|numbers?|numeros|boules|stars|etoiles|chances?|plus|moins|nombres)\b|\b(?:the|les) (?P<k>\d{1,2}) (?:most|least|plus|moins)\b",
    )
    .unwrap()
});

// =============================================================================
// Matcher table
// =============================================================================

/// Conversation state the classifier can consult.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub history: &'a [ConversationMessage],
    pub page: &'a str,
    pub today: NaiveDate,
}

impl<'a> ClassifyContext<'a> {
    /// Context for re-classifying a past message on its own.
    pub fn detached(today: NaiveDate) -> Self {
        Self {
            history: &[],
            page: "",
            today,
        }
    }
}

struct MatchInput<'a> {
    text: &'a NormalizedText,
    ctx: &'a ClassifyContext<'a>,
    locale: &'a Locale,
}

type Matcher = fn(&MatchInput<'_>) -> Option<Intent>;

const STRATEGIES: &[(&str, Matcher)] = &[
    ("continuation", match_continuation),
    ("insult", match_insult),
    ("compliment", match_compliment),
    ("next_draw", match_next_draw),
    ("draw_lookup", match_draw_lookup),
    ("temporal_filter", match_temporal),
    ("grid", match_grid),
    ("complex", match_complex),
    ("out_of_range", match_out_of_range),
    ("single_number", match_single_number),
];

/// First analytic matcher; everything from here on answers a data question.
const ANALYTIC_START: usize = 3;

/// Rule-based intent classifier. Pure given its inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a message. Never fails; anything unrecognised is `Generic`.
    pub fn classify(&self, message: &str, ctx: &ClassifyContext<'_>, locale: &Locale) -> Intent {
        let text = NormalizedText::new(message);
        let input = MatchInput {
            text: &text,
            ctx,
            locale,
        };
        run_from(&input, 0).unwrap_or(Intent::Generic)
    }

    /// The data question embedded in a social message, if any.
    ///
    /// Skips the social matchers and ignores out-of-range numbers, which
    /// have their own canned replies.
    pub fn classify_analytic(
        &self,
        message: &str,
        ctx: &ClassifyContext<'_>,
        locale: &Locale,
    ) -> Option<Intent> {
        let text = NormalizedText::new(message);
        let input = MatchInput {
            text: &text,
            ctx,
            locale,
        };
        match run_from(&input, ANALYTIC_START)? {
            Intent::OutOfRangeNumber(_) => None,
            intent => Some(intent),
        }
    }
}

fn run_from(input: &MatchInput<'_>, start: usize) -> Option<Intent> {
    STRATEGIES[start..].iter().find_map(|(name, matcher)| {
        let intent = matcher(input)?;
        tracing::trace!(matcher = name, "Intent matched");
        Some(intent)
    })
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

// -----------------------------------------------------------------
// Social
// -----------------------------------------------------------------

fn match_continuation(input: &MatchInput<'_>) -> Option<Intent> {
    let last = input.ctx.history.last()?;
    if last.role != Role::Assistant {
        return None;
    }
    let bare = input.text.bare();
    if bare.is_empty() || bare.chars().count() > MAX_CONTINUATION_LEN {
        return None;
    }
    input
        .locale
        .patterns
        .continuation
        .contains(&bare)
        .then_some(Intent::Continuation)
}

fn match_insult(input: &MatchInput<'_>) -> Option<Intent> {
    let p = input.locale.patterns;
    let text = input.text;

    if any_match(&p.threats, &text.deleet) {
        return Some(Intent::Insult {
            target: InsultTarget::Assistant,
            threat: true,
        });
    }

    let words: Vec<&str> = text.words().collect();
    let insulting = words.iter().any(|w| p.insult_words.contains(w))
        || any_match(&p.insult_phrases, &text.deleet);
    if !insulting {
        return None;
    }

    let at_assistant = words.iter().any(|w| p.assistant_words.contains(w));
    let at_domain = words.iter().any(|w| p.domain_words.contains(w));
    let target = if at_domain && !at_assistant {
        InsultTarget::Domain
    } else {
        InsultTarget::Assistant
    };
    Some(Intent::Insult {
        target,
        threat: false,
    })
}

fn match_compliment(input: &MatchInput<'_>) -> Option<Intent> {
    let p = input.locale.patterns;
    let text = input.text;

    if any_match(&p.affection, &text.plain) {
        return Some(Intent::Compliment(ComplimentKind::Affection));
    }
    if p.thanks.is_match(text.bare()) {
        return Some(Intent::Compliment(ComplimentKind::Thanks));
    }
    let praised = text.words().any(|w| p.praise_words.contains(&w))
        || any_match(&p.praise_phrases, &text.plain);
    praised.then_some(Intent::Compliment(ComplimentKind::Praise))
}

// -----------------------------------------------------------------
// Draws and dates
// -----------------------------------------------------------------

fn match_next_draw(input: &MatchInput<'_>) -> Option<Intent> {
    any_match(&input.locale.patterns.next_draw, &input.text.plain).then_some(Intent::NextDrawQuery)
}

fn match_draw_lookup(input: &MatchInput<'_>) -> Option<Intent> {
    let p = input.locale.patterns;
    let text = &input.text.plain;

    if any_match(&p.next_draw, text) || !any_match(&p.draw_trigger, text) {
        return None;
    }
    if let Some(date) = extract_date(input) {
        return Some(Intent::HistoricalDrawLookup(DrawRef::Date(date)));
    }
    if any_match(&p.latest_draw, text) {
        return Some(Intent::HistoricalDrawLookup(DrawRef::Latest));
    }
    if let Some(date) = page_date(input.ctx.page) {
        return Some(Intent::HistoricalDrawLookup(DrawRef::Date(date)));
    }
    // "results" next to a period, a ranking or a number is not about one draw
    if has_analytic_signal(input) {
        return None;
    }
    Some(Intent::HistoricalDrawLookup(DrawRef::Latest))
}

fn has_analytic_signal(input: &MatchInput<'_>) -> bool {
    let p = input.locale.patterns;
    let text = &input.text.plain;
    any_match(&p.temporal, text)
        || any_match(&p.ranking, text)
        || any_match(&p.comparison, text)
        || p.hot.is_match(text)
        || p.cold.is_match(text)
        || p.overdue.is_match(text)
        || extract_number(input).is_some()
}

/// `draw/YYYY-MM-DD` pages carry the draw being viewed.
fn page_date(page: &str) -> Option<NaiveDate> {
    let date = page.trim().strip_prefix("draw/")?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn extract_date(input: &MatchInput<'_>) -> Option<NaiveDate> {
    let text = &input.text.plain;
    let today = input.ctx.today;
    let locale = input.locale;
    let dp = &*DATE_PATTERNS;

    if let Some(caps) = dp.iso.captures(text) {
        if let Some(date) = date_from_caps(&caps, |m| m.parse().ok(), today) {
            return Some(date);
        }
    }
    if let Some(caps) = dp.numeric.captures(text) {
        if let Some(date) = date_from_caps(&caps, |m| m.parse().ok(), today) {
            return Some(date);
        }
    }
    for re in &locale.patterns.spelled_dates {
        if let Some(caps) = re.captures(text) {
            if let Some(date) = date_from_caps(&caps, |m| locale.month_number(m), today) {
                return Some(date);
            }
        }
    }
    if locale.patterns.yesterday.is_match(text) {
        return today.pred_opt();
    }
    for re in &locale.patterns.past_weekday {
        if let Some(day) = re
            .captures(text)
            .and_then(|caps| caps.name("day"))
            .and_then(|m| locale.weekday(m.as_str()))
        {
            let back = (today.weekday().num_days_from_monday() + 7
                - day.num_days_from_monday())
                % 7;
            let back = if back == 0 { 7 } else { back };
            return today.checked_sub_signed(Duration::days(i64::from(back)));
        }
    }
    None
}

/// Build a date from `d`, `m` and optional `y` groups.
///
/// Without a year, the most recent such date not after `today` is used.
fn date_from_caps(
    caps: &Captures<'_>,
    month: impl Fn(&str) -> Option<u32>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let day: u32 = caps.name("d")?.as_str().parse().ok()?;
    let month = month(caps.name("m")?.as_str())?;
    match caps.name("y") {
        Some(y) => {
            let mut year: i32 = y.as_str().parse().ok()?;
            if year < 100 {
                year += 2000;
            }
            NaiveDate::from_ymd_opt(year, month, day)
        }
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(date) if date <= today => Some(date),
                _ => NaiveDate::from_ymd_opt(today.year() - 1, month, day),
            }
        }
    }
}

fn match_temporal(input: &MatchInput<'_>) -> Option<Intent> {
    input
        .locale
        .patterns
        .temporal
        .iter()
        .find_map(|re| re.find(&input.text.plain))
        .map(|m| {
            Intent::TemporalFilter(TemporalScope {
                expression: m.as_str().to_string(),
            })
        })
}

// -----------------------------------------------------------------
// Grids and complex queries
// -----------------------------------------------------------------

fn match_grid(input: &MatchInput<'_>) -> Option<Intent> {
    let text = &input.text.plain;
    let (marker_start, secondaries) = GRID_SECONDARY.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let start = caps.get(0)?.start();
        let secondaries: Vec<i64> = ["a", "b"]
            .iter()
            .filter_map(|g| caps.name(g))
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        Some((start, secondaries))
    })?;

    let mut primaries = Vec::new();
    for m in STANDALONE_NUMBER.find_iter(&text[..marker_start]) {
        primaries.push(m.as_str().parse::<i64>().ok()?);
    }

    Grid::from_numbers(&primaries, &secondaries, &input.locale.rules)
        .ok()
        .map(Intent::GridSubmission)
}

fn match_complex(input: &MatchInput<'_>) -> Option<Intent> {
    let p = input.locale.patterns;
    let rules = &input.locale.rules;
    let text = &input.text.plain;
    let kind = if p.secondary_terms.is_match(text) {
        NumberKind::Secondary
    } else {
        NumberKind::Primary
    };

    for re in &p.comparison {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let a: Option<i64> = caps.name("a").and_then(|m| m.as_str().parse().ok());
        let b: Option<i64> = caps.name("b").and_then(|m| m.as_str().parse().ok());
        if let (Some(a), Some(b)) = (a, b) {
            if a != b && rules.in_range(a, kind) && rules.in_range(b, kind) {
                return Some(Intent::ComplexQuery(ComplexQuery::Comparison {
                    first: a as u32,
                    second: b as u32,
                    kind,
                }));
            }
        }
    }

    if any_match(&p.ranking, text) {
        let (sort, order) = if p.ranking_gap.is_match(text) {
            (SortKey::Gap, RankOrder::Descending)
        } else if p.ranking_least.is_match(text) {
            (SortKey::Frequency, RankOrder::Ascending)
        } else {
            (SortKey::Frequency, RankOrder::Descending)
        };
        let limit = rank_limit(text)
            .unwrap_or(DEFAULT_RANK_LIMIT)
            .clamp(1, rules.max_for(kind) as usize);
        return Some(Intent::ComplexQuery(ComplexQuery::Ranking {
            sort,
            order,
            limit,
            kind,
        }));
    }

    if p.numbers_context.is_match(text) {
        let category = if p.overdue.is_match(text) {
            Some(CategoryKind::Overdue)
        } else if p.hot.is_match(text) {
            Some(CategoryKind::Hot)
        } else if p.cold.is_match(text) {
            Some(CategoryKind::Cold)
        } else {
            None
        };
        if let Some(category) = category {
            return Some(Intent::ComplexQuery(ComplexQuery::Category { category, kind }));
        }
    }

    None
}

fn rank_limit(text: &str) -> Option<usize> {
    let caps = RANK_LIMIT.captures(text)?;
    ["n", "m", "k"]
        .iter()
        .find_map(|g| caps.name(g))
        .and_then(|m| m.as_str().parse().ok())
}

// -----------------------------------------------------------------
// Single numbers
// -----------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct NumberRef {
    value: i64,
    kind: NumberKind,
}

fn extract_number(input: &MatchInput<'_>) -> Option<NumberRef> {
    let p = input.locale.patterns;
    let text = &input.text.plain;
    let secondary = p
        .secondary_number
        .iter()
        .find_map(|re| first_number(re, text, input.locale))
        .map(|value| NumberRef {
            value,
            kind: NumberKind::Secondary,
        });
    secondary.or_else(|| {
        p.primary_number
            .iter()
            .find_map(|re| first_number(re, text, input.locale))
            .map(|value| NumberRef {
                value,
                kind: NumberKind::Primary,
            })
    })
}

/// First `n` capture that is neither a year nor part of a date or time.
fn first_number(re: &Regex, text: &str, locale: &Locale) -> Option<i64> {
    for caps in re.captures_iter(text) {
        let Some(m) = caps.name("n") else {
            continue;
        };
        let digits = m.as_str().trim_start_matches('-');
        if looks_like_year(digits) {
            continue;
        }
        if text[..m.start()].ends_with(['/', ':']) {
            continue;
        }
        let rest = &text[m.end()..];
        if rest.starts_with(['/', ':', '%', '€', '$', 'h']) {
            continue;
        }
        if rest.starts_with(' ') {
            let next_word = rest
                .trim_start()
                .split(|c: char| !c.is_alphabetic())
                .next()
                .unwrap_or("");
            if locale.month_number(next_word).is_some() {
                continue;
            }
        }
        if let Ok(value) = m.as_str().parse::<i64>() {
            return Some(value);
        }
    }
    None
}

fn looks_like_year(digits: &str) -> bool {
    digits.len() == 4
        && digits
            .parse::<u32>()
            .map(|y| (1900..=2099).contains(&y))
            .unwrap_or(false)
}

fn range_check(number: NumberRef, locale: &Locale) -> Result<u32, OutOfRange> {
    let rules = &locale.rules;
    let bound = rules.max_for(number.kind);
    if rules.in_range(number.value, number.kind) {
        return Ok(number.value as u32);
    }
    let case = match number.kind {
        _ if number.value < 1 => OutOfRangeCase::ZeroNeg,
        NumberKind::Secondary => OutOfRangeCase::Secondary,
        NumberKind::Primary if number.value <= i64::from(bound) + 2 => OutOfRangeCase::Close,
        NumberKind::Primary => OutOfRangeCase::High,
    };
    Err(OutOfRange {
        value: number.value,
        kind: number.kind,
        case,
        bound,
    })
}

fn match_out_of_range(input: &MatchInput<'_>) -> Option<Intent> {
    let number = extract_number(input)?;
    range_check(number, input.locale)
        .err()
        .map(Intent::OutOfRangeNumber)
}

fn match_single_number(input: &MatchInput<'_>) -> Option<Intent> {
    let number = extract_number(input)?;
    range_check(number, input.locale)
        .ok()
        .map(|n| Intent::SingleNumberLookup {
            number: n,
            kind: number.kind,
        })
}
