use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Which pool a drawn number belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberKind {
    /// Main balls (e.g. 5 of 1..=49).
    Primary,
    /// Bonus balls: the Loto "chance" number or the EuroMillions stars.
    Secondary,
}

/// Supported game variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    #[default]
    Loto,
    Euromillions,
}

/// Sort key for ranking queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Number of appearances over the whole history.
    Frequency,
    /// Draws elapsed since the last appearance.
    Gap,
}

/// Ordering for ranking queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankOrder {
    Descending,
    Ascending,
}

/// Named number categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    /// Most frequent over the recent window.
    Hot,
    /// Least frequent over the recent window.
    Cold,
    /// Longest current gap.
    Overdue,
}

// =============================================================================
// Game rules
// =============================================================================

/// Numeric ranges and schedule for one game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameRules {
    pub kind: GameKind,
    /// Display name, e.g. "Loto".
    pub name: &'static str,
    /// Highest valid primary number (lowest is always 1).
    pub primary_max: u32,
    /// Primaries per grid.
    pub primary_count: usize,
    /// Highest valid secondary number.
    pub secondary_max: u32,
    /// Secondaries per grid.
    pub secondary_count: usize,
    /// Weekdays on which a draw takes place.
    pub draw_days: Vec<Weekday>,
    /// Local time of the draw.
    pub draw_time: NaiveTime,
}

impl GameRules {
    /// French Loto: 5 of 1..=49 plus one chance number of 1..=10.
    pub fn loto() -> Self {
        Self {
            kind: GameKind::Loto,
            name: "Loto",
            primary_max: 49,
            primary_count: 5,
            secondary_max: 10,
            secondary_count: 1,
            draw_days: vec![Weekday::Mon, Weekday::Wed, Weekday::Sat],
            draw_time: NaiveTime::from_hms_opt(20, 15, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    /// EuroMillions: 5 of 1..=50 plus two stars of 1..=12.
    pub fn euromillions() -> Self {
        Self {
            kind: GameKind::Euromillions,
            name: "EuroMillions",
            primary_max: 50,
            primary_count: 5,
            secondary_max: 12,
            secondary_count: 2,
            draw_days: vec![Weekday::Tue, Weekday::Fri],
            draw_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    pub fn for_kind(kind: GameKind) -> Self {
        match kind {
            GameKind::Loto => Self::loto(),
            GameKind::Euromillions => Self::euromillions(),
        }
    }

    /// Upper bound for the given pool.
    pub fn max_for(&self, kind: NumberKind) -> u32 {
        match kind {
            NumberKind::Primary => self.primary_max,
            NumberKind::Secondary => self.secondary_max,
        }
    }

    /// Whether `n` is a valid number of the given pool.
    pub fn in_range(&self, n: i64, kind: NumberKind) -> bool {
        n >= 1 && n <= i64::from(self.max_for(kind))
    }

    /// The first draw strictly after `now`.
    ///
    /// A draw happening today still counts when `now` is before the draw time.
    pub fn next_draw_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.draw_days.is_empty() {
            return None;
        }
        (0..8).find_map(|offset| {
            let date = now.date() + Duration::days(offset);
            let at = date.and_time(self.draw_time);
            (self.draw_days.contains(&date.weekday()) && at > now).then_some(at)
        })
    }
}

// =============================================================================
// Draw history
// =============================================================================

/// Reference to a specific draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawRef {
    Date(NaiveDate),
    Latest,
}

impl std::fmt::Display for DrawRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawRef::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DrawRef::Latest => f.write_str("latest"),
        }
    }
}

/// One historical draw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub date: NaiveDate,
    /// Primaries in ascending order.
    pub primaries: Vec<u32>,
    /// Secondaries in ascending order.
    pub secondaries: Vec<u32>,
}

/// Frequency statistics for one number over the stored history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumberStats {
    pub number: u32,
    pub kind: NumberKind,
    /// Number of draws in which the number appeared.
    pub occurrences: u32,
    /// Number of draws considered.
    pub total_draws: u32,
    /// Date of the most recent appearance.
    pub last_seen: Option<NaiveDate>,
    /// Draws elapsed since the most recent appearance (0 = drawn last time).
    pub gap: Option<u32>,
    /// Appearances within the recent window used for hot/cold.
    pub recent_occurrences: u32,
}

impl NumberStats {
    /// Share of draws containing the number, in percent.
    pub fn frequency_percent(&self) -> f64 {
        if self.total_draws == 0 {
            0.0
        } else {
            f64::from(self.occurrences) * 100.0 / f64::from(self.total_draws)
        }
    }
}

/// Two numbers side by side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub first: NumberStats,
    pub second: NumberStats,
}

/// Rows returned by an ad hoc read-only query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_loto_ranges() {
        let rules = GameRules::loto();
        assert!(rules.in_range(1, NumberKind::Primary));
        assert!(rules.in_range(49, NumberKind::Primary));
        assert!(!rules.in_range(50, NumberKind::Primary));
        assert!(!rules.in_range(0, NumberKind::Primary));
        assert!(rules.in_range(10, NumberKind::Secondary));
        assert!(!rules.in_range(11, NumberKind::Secondary));
    }

    #[test]
    fn test_euromillions_ranges() {
        let rules = GameRules::euromillions();
        assert_eq!(rules.max_for(NumberKind::Primary), 50);
        assert_eq!(rules.max_for(NumberKind::Secondary), 12);
        assert_eq!(rules.secondary_count, 2);
    }

    #[test]
    fn test_next_draw_same_day_before_draw_time() {
        // 2024-03-11 is a Monday.
        let rules = GameRules::loto();
        let next = rules.next_draw_after(at(2024, 3, 11, 10, 0)).unwrap();
        assert_eq!(next, at(2024, 3, 11, 20, 15));
    }

    #[test]
    fn test_next_draw_same_day_after_draw_time() {
        let rules = GameRules::loto();
        let next = rules.next_draw_after(at(2024, 3, 11, 21, 0)).unwrap();
        assert_eq!(next, at(2024, 3, 13, 20, 15));
    }

    #[test]
    fn test_next_draw_wraps_week() {
        // Saturday evening after the draw -> Monday.
        let rules = GameRules::loto();
        let next = rules.next_draw_after(at(2024, 3, 16, 22, 0)).unwrap();
        assert_eq!(next.date().weekday(), Weekday::Mon);
    }

    #[test]
    fn test_frequency_percent_zero_draws() {
        let stats = NumberStats {
            number: 7,
            kind: NumberKind::Primary,
            occurrences: 0,
            total_draws: 0,
            last_seen: None,
            gap: None,
            recent_occurrences: 0,
        };
        assert_eq!(stats.frequency_percent(), 0.0);
    }

    #[test]
    fn test_game_kind_serde() {
        let json = serde_json::to_string(&GameKind::Euromillions).unwrap();
        assert_eq!(json, "\"euromillions\"");
    }
}
