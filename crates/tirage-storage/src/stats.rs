//! Frequency statistics over the draw history.
//!
//! Statistics are computed in one pass over every stored draw and cached
//! until the table's fingerprint (row count + latest date) changes.

use std::sync::{Arc, Mutex};

use tracing::debug;

use tirage_core::error::TirageError;
use tirage_core::types::{
    CategoryKind, Comparison, Draw, DrawRef, GameRules, NumberKind, NumberStats, RankOrder,
    SortKey,
};

use crate::repository::DrawRepository;

/// Draws considered "recent" for hot/cold categories.
const RECENT_WINDOW: usize = 50;

/// Numbers listed per category.
const CATEGORY_SIZE: usize = 5;

#[derive(Debug)]
struct Snapshot {
    fingerprint: (u64, Option<String>),
    primary: Vec<NumberStats>,
    secondary: Vec<NumberStats>,
}

impl Snapshot {
    fn pool(&self, kind: NumberKind) -> &[NumberStats] {
        match kind {
            NumberKind::Primary => &self.primary,
            NumberKind::Secondary => &self.secondary,
        }
    }
}

/// Read-only statistics service backed by [`DrawRepository`].
pub struct StatsService {
    repo: DrawRepository,
    rules: GameRules,
    cache: Mutex<Option<Arc<Snapshot>>>,
}

impl StatsService {
    pub fn new(repo: DrawRepository, rules: GameRules) -> Self {
        Self {
            repo,
            rules,
            cache: Mutex::new(None),
        }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Statistics for one number, `None` when it is outside the game's range.
    pub fn lookup_number(
        &self,
        number: u32,
        kind: NumberKind,
    ) -> Result<Option<NumberStats>, TirageError> {
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .pool(kind)
            .iter()
            .find(|s| s.number == number)
            .cloned())
    }

    /// A specific draw, or the most recent one.
    pub fn lookup_draw(&self, draw: DrawRef) -> Result<Option<Draw>, TirageError> {
        match draw {
            DrawRef::Date(date) => self.repo.find_by_date(date),
            DrawRef::Latest => self.repo.latest(),
        }
    }

    /// The `limit` numbers with the highest (or lowest) value of `sort_key`.
    ///
    /// Numbers never drawn count as having the longest gap.
    pub fn rank(
        &self,
        sort_key: SortKey,
        order: RankOrder,
        limit: usize,
        kind: NumberKind,
    ) -> Result<Vec<NumberStats>, TirageError> {
        let snapshot = self.snapshot()?;
        let mut ranked: Vec<NumberStats> = snapshot.pool(kind).to_vec();
        let key = |s: &NumberStats| -> u64 {
            match sort_key {
                SortKey::Frequency => u64::from(s.occurrences),
                SortKey::Gap => s.gap.map(u64::from).unwrap_or(u64::MAX),
            }
        };
        ranked.sort_by(|a, b| {
            let ord = match order {
                RankOrder::Descending => key(b).cmp(&key(a)),
                RankOrder::Ascending => key(a).cmp(&key(b)),
            };
            ord.then(a.number.cmp(&b.number))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Side-by-side statistics for two numbers of the same pool.
    pub fn compare(
        &self,
        first: u32,
        second: u32,
        kind: NumberKind,
    ) -> Result<Option<Comparison>, TirageError> {
        let first = self.lookup_number(first, kind)?;
        let second = self.lookup_number(second, kind)?;
        Ok(first
            .zip(second)
            .map(|(first, second)| Comparison { first, second }))
    }

    /// Hot, cold or overdue numbers.
    pub fn category(
        &self,
        category: CategoryKind,
        kind: NumberKind,
    ) -> Result<Vec<NumberStats>, TirageError> {
        match category {
            CategoryKind::Overdue => self.rank(SortKey::Gap, RankOrder::Descending, CATEGORY_SIZE, kind),
            CategoryKind::Hot | CategoryKind::Cold => {
                let snapshot = self.snapshot()?;
                let mut pool: Vec<NumberStats> = snapshot.pool(kind).to_vec();
                pool.sort_by(|a, b| {
                    let ord = if category == CategoryKind::Hot {
                        b.recent_occurrences.cmp(&a.recent_occurrences)
                    } else {
                        a.recent_occurrences.cmp(&b.recent_occurrences)
                    };
                    ord.then(a.number.cmp(&b.number))
                });
                pool.truncate(CATEGORY_SIZE);
                Ok(pool)
            }
        }
    }

    fn snapshot(&self) -> Result<Arc<Snapshot>, TirageError> {
        let fingerprint = self.repo.fingerprint()?;
        {
            let cache = self
                .cache
                .lock()
                .map_err(|e| TirageError::Storage(format!("stats cache lock poisoned: {}", e)))?;
            if let Some(ref snap) = *cache {
                if snap.fingerprint == fingerprint {
                    return Ok(Arc::clone(snap));
                }
            }
        }

        let draws = self.repo.all()?;
        let snapshot = Arc::new(Snapshot {
            fingerprint,
            primary: compute_stats(&draws, NumberKind::Primary, self.rules.primary_max),
            secondary: compute_stats(&draws, NumberKind::Secondary, self.rules.secondary_max),
        });
        debug!(draws = draws.len(), "Stats snapshot rebuilt");

        let mut cache = self
            .cache
            .lock()
            .map_err(|e| TirageError::Storage(format!("stats cache lock poisoned: {}", e)))?;
        *cache = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

/// Per-number statistics over `draws` (oldest first).
fn compute_stats(draws: &[Draw], kind: NumberKind, max: u32) -> Vec<NumberStats> {
    let total = draws.len();
    let recent_start = total.saturating_sub(RECENT_WINDOW);

    (1..=max)
        .map(|number| {
            let mut occurrences = 0u32;
            let mut recent = 0u32;
            let mut last_idx = None;
            for (idx, draw) in draws.iter().enumerate() {
                let balls = match kind {
                    NumberKind::Primary => &draw.primaries,
                    NumberKind::Secondary => &draw.secondaries,
                };
                if balls.contains(&number) {
                    occurrences += 1;
                    if idx >= recent_start {
                        recent += 1;
                    }
                    last_idx = Some(idx);
                }
            }
            NumberStats {
                number,
                kind,
                occurrences,
                total_draws: total as u32,
                last_seen: last_idx.map(|i| draws[i].date),
                gap: last_idx.map(|i| (total - 1 - i) as u32),
                recent_occurrences: recent,
            }
        })
        .collect()
}
