//! Request, intent and result types for the chat core.

use serde::{Deserialize, Serialize};

use tirage_core::types::{CategoryKind, DrawRef, GameRules, NumberKind, RankOrder, SortKey};

// =============================================================================
// Conversation
// =============================================================================

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One caller-supplied conversation turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub text: String,
}

impl ConversationMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Inbound chat request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ConversationMessage>,
    /// Page the user is on, e.g. `home` or `draw/2024-03-12`.
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub language: String,
    /// Opaque session key used only for the dynamic-query attempt budget.
    #[serde(default)]
    pub session_id: Option<String>,
}

// =============================================================================
// Intents
// =============================================================================

/// Who an insult is aimed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsultTarget {
    /// The assistant itself; escalates.
    Assistant,
    /// The lottery, the operator or luck in general; does not escalate.
    Domain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplimentKind {
    Praise,
    Affection,
    Thanks,
}

/// Sub-case of an out-of-range number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangeCase {
    /// Zero or negative.
    ZeroNeg,
    /// At most 2 above the primary bound.
    Close,
    /// More than 2 above the primary bound.
    High,
    /// Secondary number above its own bound.
    Secondary,
}

impl OutOfRangeCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutOfRangeCase::ZeroNeg => "zero_neg",
            OutOfRangeCase::Close => "close",
            OutOfRangeCase::High => "high",
            OutOfRangeCase::Secondary => "secondary",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfRange {
    pub value: i64,
    pub kind: NumberKind,
    pub case: OutOfRangeCase,
    /// Upper bound of the pool the value was checked against.
    pub bound: u32,
}

impl OutOfRange {
    /// Distance between the value and the nearest valid number.
    pub fn distance(&self) -> u64 {
        let bound = i64::from(self.bound);
        if self.value < 1 {
            1i64.abs_diff(self.value)
        } else if self.value > bound {
            self.value.abs_diff(bound)
        } else {
            0
        }
    }
}

/// A full grid: distinct in-range primaries plus secondaries, both sorted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub primaries: Vec<u32>,
    pub secondaries: Vec<u32>,
}

impl Grid {
    /// Build a grid, checking counts, ranges and duplicates against `rules`.
    pub fn from_numbers(
        primaries: &[i64],
        secondaries: &[i64],
        rules: &GameRules,
    ) -> Result<Self, String> {
        Ok(Self {
            primaries: checked_pool(primaries, rules, NumberKind::Primary)?,
            secondaries: checked_pool(secondaries, rules, NumberKind::Secondary)?,
        })
    }
}

fn checked_pool(numbers: &[i64], rules: &GameRules, kind: NumberKind) -> Result<Vec<u32>, String> {
    let (expected, what) = match kind {
        NumberKind::Primary => (rules.primary_count, "main numbers"),
        NumberKind::Secondary => (rules.secondary_count, "bonus numbers"),
    };
    if numbers.len() != expected {
        return Err(format!("expected {} {}, got {}", expected, what, numbers.len()));
    }
    let mut out = Vec::with_capacity(numbers.len());
    for &n in numbers {
        if !rules.in_range(n, kind) {
            return Err(format!(
                "{} is outside 1-{} for {}",
                n,
                rules.max_for(kind),
                what
            ));
        }
        let n = n as u32;
        if out.contains(&n) {
            return Err(format!("{} appears twice in {}", n, what));
        }
        out.push(n);
    }
    out.sort_unstable();
    Ok(out)
}

/// Year/month/range qualifier that turns a question into a filtered analytic one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalScope {
    /// The matched qualifier, e.g. `in 2024` or `last month`.
    pub expression: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplexQuery {
    Ranking {
        sort: SortKey,
        order: RankOrder,
        limit: usize,
        kind: NumberKind,
    },
    Comparison {
        first: u32,
        second: u32,
        kind: NumberKind,
    },
    Category {
        category: CategoryKind,
        kind: NumberKind,
    },
}

/// The classified purpose of one inbound message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Continuation,
    Insult { target: InsultTarget, threat: bool },
    Compliment(ComplimentKind),
    NextDrawQuery,
    HistoricalDrawLookup(DrawRef),
    TemporalFilter(TemporalScope),
    GridSubmission(Grid),
    ComplexQuery(ComplexQuery),
    OutOfRangeNumber(OutOfRange),
    SingleNumberLookup { number: u32, kind: NumberKind },
    Generic,
}

impl Intent {
    /// Short stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Continuation => "continuation",
            Intent::Insult { .. } => "insult",
            Intent::Compliment(_) => "compliment",
            Intent::NextDrawQuery => "next_draw",
            Intent::HistoricalDrawLookup(_) => "draw_lookup",
            Intent::TemporalFilter(_) => "temporal_filter",
            Intent::GridSubmission(_) => "grid",
            Intent::ComplexQuery(_) => "complex",
            Intent::OutOfRangeNumber(_) => "out_of_range",
            Intent::SingleNumberLookup { .. } => "single_number",
            Intent::Generic => "generic",
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// Where a reply came from. Always visible to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    GenericModel,
    LocalFallback,
    BreakerOpen,
    Timeout,
    InsultResponse,
    ComplimentResponse,
    OutOfRangeResponse,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::GenericModel => "generic_model",
            Source::LocalFallback => "local_fallback",
            Source::BreakerOpen => "breaker_open",
            Source::Timeout => "timeout",
            Source::InsultResponse => "insult_response",
            Source::ComplimentResponse => "compliment_response",
            Source::OutOfRangeResponse => "out_of_range_response",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub text: String,
    pub source: Source,
}

impl PipelineResult {
    pub fn new(text: impl Into<String>, source: Source) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

/// Event of a streamed reply: chunks in generation order, then one `Done`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Chunk { text: String },
    Done { source: Source },
}
