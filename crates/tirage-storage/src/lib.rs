//! Tirage Storage crate - SQLite draw history, statistics, read-only queries.
//!
//! Provides a WAL-mode SQLite database with migrations, the draw repository
//! (including CSV import), a cached frequency-statistics service, and a
//! guarded executor for ad hoc read-only queries.

pub mod db;
pub mod migrations;
pub mod readonly;
pub mod repository;
pub mod stats;

pub use db::Database;
pub use readonly::ReadOnlyQueries;
pub use repository::DrawRepository;
pub use stats::StatsService;
