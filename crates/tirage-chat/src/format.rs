//! Context blocks built from structured draw data.
//!
//! These blocks are injected into the generative call for one turn and are
//! never shown to the end user verbatim.

use chrono::{Datelike, NaiveDateTime};

use tirage_core::types::{
    CategoryKind, Comparison, Draw, DrawRef, GameKind, GameRules, NumberKind, NumberStats,
    QueryRows, RankOrder, SortKey,
};

use crate::types::Grid;

// =============================================================================
// ContextFormatter
// =============================================================================

/// Formats stats, draws and query rows for one game.
#[derive(Debug, Clone)]
pub struct ContextFormatter {
    rules: GameRules,
    /// Rows formatted from an ad hoc query before the truncation notice.
    max_rows: usize,
}

impl ContextFormatter {
    pub fn new(rules: GameRules, max_rows: usize) -> Self {
        Self { rules, max_rows }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    fn pool_label(&self, kind: NumberKind) -> &'static str {
        match (kind, self.rules.kind) {
            (NumberKind::Primary, _) => "main number",
            (NumberKind::Secondary, GameKind::Loto) => "chance number",
            (NumberKind::Secondary, GameKind::Euromillions) => "star",
        }
    }

    // -------------------------------------------------------------------------
    // Numbers
    // -------------------------------------------------------------------------

    pub fn number_stats(&self, stats: &NumberStats) -> String {
        let mut out = format!(
            "{} {} {}: drawn {} times in {} draws ({:.1}%)",
            self.rules.name,
            self.pool_label(stats.kind),
            stats.number,
            stats.occurrences,
            stats.total_draws,
            stats.frequency_percent()
        );
        match (stats.last_seen, stats.gap) {
            (Some(date), Some(gap)) => out.push_str(&format!(
                ", last drawn on {} ({} draws ago)",
                date.format("%Y-%m-%d"),
                gap
            )),
            _ => out.push_str(", never drawn"),
        }
        out.push_str(&format!(
            ", {} times in the recent window.",
            stats.recent_occurrences
        ));
        out
    }

    pub fn missing_number(&self, number: u32, kind: NumberKind) -> String {
        format!(
            "No statistics are available for {} {}.",
            self.pool_label(kind),
            number
        )
    }

    // -------------------------------------------------------------------------
    // Draws
    // -------------------------------------------------------------------------

    pub fn draw(&self, draw: &Draw) -> String {
        format!(
            "{} draw of {} ({}): main numbers {}; {} {}.",
            self.rules.name,
            draw.date.format("%Y-%m-%d"),
            weekday_name(draw.date.weekday()),
            join(&draw.primaries),
            plural(self.pool_label(NumberKind::Secondary), draw.secondaries.len()),
            join(&draw.secondaries)
        )
    }

    pub fn missing_draw(&self, draw: DrawRef) -> String {
        match draw {
            DrawRef::Date(date) => format!(
                "No {} draw is recorded for {} ({}). Draws take place on {}.",
                self.rules.name,
                date.format("%Y-%m-%d"),
                weekday_name(date.weekday()),
                self.draw_days()
            ),
            DrawRef::Latest => format!("No {} draw is recorded yet.", self.rules.name),
        }
    }

    pub fn next_draw(&self, at: Option<NaiveDateTime>) -> String {
        match at {
            Some(at) => format!(
                "The next {} draw is on {} {} at {}. Draws take place on {}.",
                self.rules.name,
                weekday_name(at.date().weekday()),
                at.format("%Y-%m-%d"),
                at.format("%H:%M"),
                self.draw_days()
            ),
            None => format!("No {} draw schedule is configured.", self.rules.name),
        }
    }

    fn draw_days(&self) -> String {
        self.rules
            .draw_days
            .iter()
            .map(|d| weekday_name(*d))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // -------------------------------------------------------------------------
    // Analytics
    // -------------------------------------------------------------------------

    pub fn ranking(
        &self,
        ranked: &[NumberStats],
        sort: SortKey,
        order: RankOrder,
        kind: NumberKind,
    ) -> String {
        if ranked.is_empty() {
            return "No ranking is available.".to_string();
        }
        let heading = match (sort, order) {
            (SortKey::Frequency, RankOrder::Descending) => "most frequent",
            (SortKey::Frequency, RankOrder::Ascending) => "least frequent",
            (SortKey::Gap, RankOrder::Descending) => "longest absent",
            (SortKey::Gap, RankOrder::Ascending) => "most recently drawn",
        };
        let mut out = format!(
            "Top {} {} {}s:",
            ranked.len(),
            heading,
            self.pool_label(kind)
        );
        for (i, s) in ranked.iter().enumerate() {
            out.push_str(&format!("\n{}. {}", i + 1, short_stats(s)));
        }
        out
    }

    pub fn comparison(&self, cmp: &Comparison) -> String {
        let (a, b) = (&cmp.first, &cmp.second);
        let verdict = match a.occurrences.cmp(&b.occurrences) {
            std::cmp::Ordering::Greater => format!("{} has been drawn more often", a.number),
            std::cmp::Ordering::Less => format!("{} has been drawn more often", b.number),
            std::cmp::Ordering::Equal => "both have been drawn equally often".to_string(),
        };
        format!(
            "Comparison of {}s {} and {}:\n- {}\n- {}\nOverall, {}.",
            self.pool_label(a.kind),
            a.number,
            b.number,
            short_stats(a),
            short_stats(b),
            verdict
        )
    }

    pub fn category(&self, list: &[NumberStats], category: CategoryKind, kind: NumberKind) -> String {
        if list.is_empty() {
            return "No category data is available.".to_string();
        }
        let name = match category {
            CategoryKind::Hot => "Hot",
            CategoryKind::Cold => "Cold",
            CategoryKind::Overdue => "Overdue",
        };
        let mut out = format!("{} {}s:", name, self.pool_label(kind));
        for s in list {
            out.push_str(&format!("\n- {}", short_stats(s)));
        }
        out
    }

    /// Per-number stats of a submitted grid plus its shape.
    pub fn grid_analysis(&self, grid: &Grid, stats: &[NumberStats]) -> String {
        let sum: u32 = grid.primaries.iter().sum();
        let even = grid.primaries.iter().filter(|n| *n % 2 == 0).count();
        let half = self.rules.primary_max / 2;
        let low = grid.primaries.iter().filter(|n| **n <= half).count();
        let mut out = format!(
            "Submitted {} grid: main numbers {}; {} {}.\nSum {}, {} even / {} odd, {} low / {} high.",
            self.rules.name,
            join(&grid.primaries),
            plural(self.pool_label(NumberKind::Secondary), grid.secondaries.len()),
            join(&grid.secondaries),
            sum,
            even,
            grid.primaries.len() - even,
            low,
            grid.primaries.len() - low
        );
        for s in stats {
            out.push_str(&format!(
                "\n- {} {}",
                self.pool_label(s.kind),
                short_stats(s)
            ));
        }
        out
    }

    /// Ad hoc query rows, capped with a truncation notice.
    pub fn query_rows(&self, sql: &str, rows: &QueryRows) -> String {
        if rows.is_empty() {
            return format!("Query: {}\nThe query returned no rows.", sql);
        }
        let mut out = format!("Query: {}\nColumns: {}", sql, rows.columns.join(" | "));
        for row in rows.rows.iter().take(self.max_rows) {
            let cells: Vec<String> = row.iter().map(cell).collect();
            out.push('\n');
            out.push_str(&cells.join(" | "));
        }
        if rows.len() > self.max_rows {
            out.push_str(&format!(
                "\n(showing {} of {} rows)",
                self.max_rows,
                rows.len()
            ));
        }
        out
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn short_stats(s: &NumberStats) -> String {
    let gap = match s.gap {
        Some(g) => format!("last drawn {} draws ago", g),
        None => "never drawn".to_string(),
    };
    format!(
        "{}: {} times ({:.1}%), {}",
        s.number,
        s.occurrences,
        s.frequency_percent(),
        gap
    )
}

fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn plural(label: &str, count: usize) -> String {
    if count > 1 {
        format!("{}s", label)
    } else {
        label.to_string()
    }
}

fn weekday_name(day: chrono::Weekday) -> &'static str {
    match day {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn stats(number: u32, occurrences: u32, gap: Option<u32>) -> NumberStats {
        NumberStats {
            number,
            kind: NumberKind::Primary,
            occurrences,
            total_draws: 200,
            last_seen: gap.map(|_| NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()),
            gap,
            recent_occurrences: 3,
        }
    }

    fn loto() -> ContextFormatter {
        ContextFormatter::new(GameRules::loto(), 20)
    }

    #[test]
    fn test_number_stats() {
        let text = loto().number_stats(&stats(7, 30, Some(2)));
        assert!(text.starts_with("Loto main number 7: drawn 30 times in 200 draws (15.0%)"));
        assert!(text.contains("last drawn on 2024-03-09 (2 draws ago)"));

        let never = loto().number_stats(&stats(8, 0, None));
        assert!(never.contains("never drawn"));
    }

    #[test]
    fn test_draw_and_missing_draw() {
        let draw = Draw {
            date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            primaries: vec![1, 7, 22, 35, 49],
            secondaries: vec![2],
        };
        assert_eq!(
            loto().draw(&draw),
            "Loto draw of 2024-03-09 (Saturday): main numbers 1 7 22 35 49; chance number 2."
        );

        let missing = loto().missing_draw(DrawRef::Date(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()));
        assert!(missing.contains("Sunday"));
        assert!(missing.contains("Monday, Wednesday, Saturday"));
    }

    #[test]
    fn test_euromillions_labels() {
        let f = ContextFormatter::new(GameRules::euromillions(), 20);
        let draw = Draw {
            date: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            primaries: vec![4, 11, 23, 38, 50],
            secondaries: vec![3, 9],
        };
        assert!(f.draw(&draw).ends_with("stars 3 9."));
    }

    #[test]
    fn test_next_draw() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 11)
            .unwrap()
            .and_hms_opt(20, 15, 0)
            .unwrap();
        assert!(loto()
            .next_draw(Some(at))
            .starts_with("The next Loto draw is on Monday 2024-03-11 at 20:15."));
    }

    #[test]
    fn test_ranking_and_comparison() {
        let list = vec![stats(7, 30, Some(0)), stats(19, 28, Some(4))];
        let text = loto().ranking(&list, SortKey::Frequency, RankOrder::Descending, NumberKind::Primary);
        assert!(text.starts_with("Top 2 most frequent main numbers:"));
        assert!(text.contains("\n2. 19: 28 times"));

        let cmp = Comparison {
            first: stats(7, 30, Some(0)),
            second: stats(19, 28, Some(4)),
        };
        assert!(loto().comparison(&cmp).ends_with("7 has been drawn more often."));
    }

    #[test]
    fn test_grid_analysis_shape() {
        let grid = Grid {
            primaries: vec![3, 12, 25, 33, 48],
            secondaries: vec![6],
        };
        let text = loto().grid_analysis(&grid, &[]);
        assert!(text.contains("Sum 121, 2 even / 3 odd, 2 low / 3 high."));
    }

    #[test]
    fn test_query_rows_truncation() {
        let rows = QueryRows {
            columns: vec!["draw_date".to_string(), "s2".to_string()],
            rows: (0..25)
                .map(|i| vec![json!(format!("2024-01-{:02}", i + 1)), json!(null)])
                .collect(),
        };
        let text = loto().query_rows("SELECT draw_date, s2 FROM draws", &rows);
        assert!(text.contains("Columns: draw_date | s2"));
        assert!(text.contains("2024-01-01 | NULL"));
        assert!(!text.contains("2024-01-21"));
        assert!(text.ends_with("(showing 20 of 25 rows)"));
    }

    #[test]
    fn test_query_rows_empty() {
        let text = loto().query_rows("SELECT 1", &QueryRows::default());
        assert!(text.ends_with("The query returned no rows."));
    }
}
