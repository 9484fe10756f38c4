//! Draw-history persistence.

use std::io::BufRead;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};
use rusqlite::{params, Row};
use tracing::{debug, info};

use tirage_core::error::TirageError;
use tirage_core::types::{Draw, GameRules};

use crate::db::Database;

const SELECT_DRAW: &str = "SELECT draw_date, n1, n2, n3, n4, n5, s1, s2 FROM draws";

/// Repository for historical draws.
#[derive(Clone)]
pub struct DrawRepository {
    db: Arc<Database>,
}

impl DrawRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or replace a draw after checking it against the game rules.
    pub fn save(&self, draw: &Draw, rules: &GameRules) -> Result<(), TirageError> {
        validate_draw(draw, rules)?;
        let mut primaries = draw.primaries.clone();
        primaries.sort_unstable();
        let mut secondaries = draw.secondaries.clone();
        secondaries.sort_unstable();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO draws
                    (draw_date, weekday, n1, n2, n3, n4, n5, s1, s2)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    draw.date.format("%Y-%m-%d").to_string(),
                    weekday_name(draw.date.weekday()),
                    primaries[0],
                    primaries[1],
                    primaries[2],
                    primaries[3],
                    primaries[4],
                    secondaries[0],
                    secondaries.get(1).copied(),
                ],
            )
            .map_err(|e| TirageError::Storage(format!("Failed to save draw: {}", e)))?;
            Ok(())
        })
    }

    /// Find the draw held on `date`.
    pub fn find_by_date(&self, date: NaiveDate) -> Result<Option<Draw>, TirageError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("{} WHERE draw_date = ?1", SELECT_DRAW))
                .map_err(|e| TirageError::Storage(e.to_string()))?;
            let mut rows = stmt
                .query_map(params![date.format("%Y-%m-%d").to_string()], row_to_draw)
                .map_err(|e| TirageError::Storage(e.to_string()))?;
            match rows.next() {
                Some(row) => Ok(Some(row.map_err(|e| TirageError::Storage(e.to_string()))??)),
                None => Ok(None),
            }
        })
    }

    /// The most recent draw, if any.
    pub fn latest(&self) -> Result<Option<Draw>, TirageError> {
        Ok(self.recent(1)?.into_iter().next())
    }

    /// The `limit` most recent draws, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<Draw>, TirageError> {
        self.query_draws(
            &format!("{} ORDER BY draw_date DESC LIMIT {}", SELECT_DRAW, limit),
        )
    }

    /// Every stored draw, oldest first.
    pub fn all(&self) -> Result<Vec<Draw>, TirageError> {
        self.query_draws(&format!("{} ORDER BY draw_date ASC", SELECT_DRAW))
    }

    /// Number of stored draws and the latest draw date.
    pub fn fingerprint(&self) -> Result<(u64, Option<String>), TirageError> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*), MAX(draw_date) FROM draws", [], |row| {
                Ok((row.get::<_, i64>(0)? as u64, row.get::<_, Option<String>>(1)?))
            })
            .map_err(|e| TirageError::Storage(e.to_string()))
        })
    }

    /// Import draws from a `;` or `,` separated file:
    /// `YYYY-MM-DD;n1;n2;n3;n4;n5;s1[;s2]`.
    ///
    /// Lines that do not start with a digit (headers, comments) are skipped.
    /// Returns the number of imported draws.
    pub fn import<R: BufRead>(&self, reader: R, rules: &GameRules) -> Result<usize, TirageError> {
        let mut imported = 0usize;
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if !line.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            let draw = parse_draw_line(line)
                .map_err(|reason| TirageError::Import(format!("line {}: {}", idx + 1, reason)))?;
            self.save(&draw, rules)
                .map_err(|e| TirageError::Import(format!("line {}: {}", idx + 1, e)))?;
            imported += 1;
        }
        info!(imported, "Draw history imported");
        Ok(imported)
    }

    fn query_draws(&self, sql: &str) -> Result<Vec<Draw>, TirageError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| TirageError::Storage(format!("Draw query prepare: {}", e)))?;
            let rows = stmt
                .query_map([], row_to_draw)
                .map_err(|e| TirageError::Storage(format!("Draw query: {}", e)))?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row.map_err(|e| TirageError::Storage(e.to_string()))??);
            }
            debug!(count = results.len(), "Loaded draws");
            Ok(results)
        })
    }
}

fn row_to_draw(row: &Row<'_>) -> Result<Result<Draw, TirageError>, rusqlite::Error> {
    let date_str: String = row.get(0)?;
    let mut primaries = Vec::with_capacity(5);
    for i in 1..=5 {
        primaries.push(row.get::<_, u32>(i)?);
    }
    let mut secondaries = vec![row.get::<_, u32>(6)?];
    if let Some(s2) = row.get::<_, Option<u32>>(7)? {
        secondaries.push(s2);
    }
    Ok(NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
        .map(|date| Draw {
            date,
            primaries,
            secondaries,
        })
        .map_err(|e| TirageError::Storage(format!("Bad draw_date '{}': {}", date_str, e))))
}

fn validate_draw(draw: &Draw, rules: &GameRules) -> Result<(), TirageError> {
    if draw.primaries.len() != rules.primary_count {
        return Err(TirageError::Storage(format!(
            "expected {} main numbers, got {}",
            rules.primary_count,
            draw.primaries.len()
        )));
    }
    if draw.secondaries.len() != rules.secondary_count {
        return Err(TirageError::Storage(format!(
            "expected {} bonus numbers, got {}",
            rules.secondary_count,
            draw.secondaries.len()
        )));
    }
    if let Some(n) = draw
        .primaries
        .iter()
        .find(|&&n| n == 0 || n > rules.primary_max)
    {
        return Err(TirageError::Storage(format!("main number {} out of range", n)));
    }
    if let Some(n) = draw
        .secondaries
        .iter()
        .find(|&&n| n == 0 || n > rules.secondary_max)
    {
        return Err(TirageError::Storage(format!("bonus number {} out of range", n)));
    }
    Ok(())
}

fn parse_draw_line(line: &str) -> Result<Draw, String> {
    let fields: Vec<&str> = line
        .split(|c| c == ';' || c == ',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    if fields.len() < 7 {
        return Err(format!("expected at least 7 fields, got {}", fields.len()));
    }
    let date = NaiveDate::parse_from_str(fields[0], "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(fields[0], "%d/%m/%Y"))
        .map_err(|e| format!("bad date '{}': {}", fields[0], e))?;
    let numbers = fields[1..]
        .iter()
        .map(|f| f.parse::<u32>().map_err(|e| format!("bad number '{}': {}", f, e)))
        .collect::<Result<Vec<u32>, String>>()?;
    Ok(Draw {
        date,
        primaries: numbers[..5].to_vec(),
        secondaries: numbers[5..].to_vec(),
    })
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}
