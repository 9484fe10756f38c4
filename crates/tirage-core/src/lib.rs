pub mod config;
pub mod error;
pub mod types;

pub use config::TirageConfig;
pub use error::{Result, TirageError};
pub use types::*;
