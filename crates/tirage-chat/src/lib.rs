//! Conversational core for Tirage.
//!
//! Classifies lottery questions, answers social messages from tiered
//! catalogs, gathers draw statistics or runs guarded read-only queries,
//! and delegates the reply to a generative model behind a circuit breaker.

pub mod breaker;
pub mod budget;
pub mod classifier;
pub mod context;
pub mod data;
pub mod error;
pub mod escalation;
pub mod format;
pub mod locale;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod pitch;
pub mod postprocess;
pub mod prompt;
pub mod sql_guard;
pub mod translator;
pub mod types;

pub use breaker::{Breaker, BreakerSnapshot, BreakerState};
pub use classifier::{ClassifyContext, IntentClassifier};
pub use context::SessionContextBuilder;
pub use data::{DrawStats, QueryStore, StoreQueries, StoreStats};
pub use error::ChatError;
pub use escalation::EscalationResponder;
pub use locale::{Locale, LocaleRegistry};
pub use model::{GenerationRequest, GenerativeModel, HttpModel, TextStream};
pub use pipeline::{ChatPipeline, PipelineDeps, PipelineSettings};
pub use pitch::{PitchGrid, PitchOutcome};
pub use prompt::SystemPrompts;
pub use sql_guard::{validate_query, QueryRejection};
pub use translator::QueryTranslator;
pub use types::{
    ChatEvent, ChatRequest, ConversationMessage, Intent, PipelineResult, Role, Source,
};
