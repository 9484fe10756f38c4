//! Chat pipeline: the per-request coordinator.
//!
//! Validates the request, classifies the message, answers social intents
//! from the canned catalogs, gathers structured or dynamic-query context,
//! and delegates to the generative service through the shared breaker.
//! Every failure past validation degrades to the locale's fallback text.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDateTime;
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use tirage_core::config::TirageConfig;
use tirage_core::types::{GameRules, NumberKind, NumberStats};

use crate::breaker::Breaker;
use crate::budget::SqlAttemptBudget;
use crate::classifier::{ClassifyContext, IntentClassifier};
use crate::context::SessionContextBuilder;
use crate::data::{DrawStats, QueryStore};
use crate::error::ChatError;
use crate::escalation::{EscalationCategory, EscalationResponder};
use crate::format::ContextFormatter;
use crate::locale::{Locale, LocaleRegistry};
use crate::model::{GenerationRequest, GenerativeModel};
use crate::postprocess::{clean_reply, with_sponsor, StreamCleaner};
use crate::prompt::{compose_system, conversation, data_block, session_block, SystemPrompts};
use crate::translator::QueryTranslator;
use crate::types::{
    ChatEvent, ChatRequest, ComplexQuery, Grid, Intent, PipelineResult, Role, Source,
};

/// Events buffered between the generation task and the HTTP stream.
const STREAM_BUFFER: usize = 32;

type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

// =============================================================================
// Settings and collaborators
// =============================================================================

/// Tunables of the pipeline, usually taken from [`TirageConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub default_language: String,
    pub max_message_length: usize,
    pub history_turns: usize,
    pub sponsor_every: usize,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub generation_timeout: Duration,
    /// Longest wait between two streamed chunks.
    pub chunk_timeout: Duration,
    /// Timeout for translation calls and draw-history lookups.
    pub lookup_timeout: Duration,
    pub sql_enabled: bool,
    pub sql_default_limit: u32,
    pub sql_max_attempts: u32,
    pub sql_session_timeout: Duration,
    pub max_context_rows: usize,
    pub breaker_threshold: u32,
    pub breaker_open_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &TirageConfig) -> Self {
        Self {
            default_language: config.chat.default_language.clone(),
            max_message_length: config.chat.max_message_length,
            history_turns: config.chat.history_turns,
            sponsor_every: config.chat.sponsor_every,
            temperature: config.llm.temperature,
            max_output_tokens: config.llm.max_output_tokens,
            generation_timeout: Duration::from_secs(config.llm.generation_timeout_secs),
            chunk_timeout: Duration::from_secs(config.llm.generation_timeout_secs),
            lookup_timeout: Duration::from_secs(config.llm.translation_timeout_secs),
            sql_enabled: config.sql.enabled,
            sql_default_limit: config.sql.default_row_limit,
            sql_max_attempts: config.sql.max_attempts_per_session,
            sql_session_timeout: Duration::from_secs(
                u64::from(config.sql.session_timeout_minutes) * 60,
            ),
            max_context_rows: config.sql.max_context_rows,
            breaker_threshold: config.breaker.failure_threshold,
            breaker_open_timeout: Duration::from_secs(config.breaker.open_timeout_secs),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&TirageConfig::default())
    }
}

/// External collaborators of the pipeline.
pub struct PipelineDeps {
    pub stats: Arc<dyn DrawStats>,
    /// Executor for generated queries; `None` disables the dynamic path.
    pub queries: Option<Arc<dyn QueryStore>>,
    /// Generative service; `None` when no credential is configured.
    pub model: Option<Arc<dyn GenerativeModel>>,
    pub prompts: SystemPrompts,
}

// =============================================================================
// ChatPipeline
// =============================================================================

/// What the request needs after the local phases ran.
enum Prepared {
    /// Answered locally.
    Reply(PipelineResult),
    /// Needs the generative service; `prefix` goes before its reply.
    Generate {
        request: GenerationRequest,
        prefix: String,
    },
}

pub struct ChatPipeline {
    pub(crate) settings: PipelineSettings,
    pub(crate) locales: LocaleRegistry,
    classifier: IntentClassifier,
    escalation: EscalationResponder,
    context: SessionContextBuilder,
    pub(crate) formatter: ContextFormatter,
    translator: QueryTranslator,
    budget: SqlAttemptBudget,
    pub(crate) breaker: Arc<Breaker>,
    pub(crate) stats: Arc<dyn DrawStats>,
    queries: Option<Arc<dyn QueryStore>>,
    pub(crate) model: Option<Arc<dyn GenerativeModel>>,
    pub(crate) prompts: SystemPrompts,
    rng: Mutex<StdRng>,
    clock: Clock,
}

impl ChatPipeline {
    pub fn new(config: &TirageConfig, deps: PipelineDeps) -> Self {
        let rules = GameRules::for_kind(config.game.kind);
        Self::with_settings(PipelineSettings::from_config(config), rules, deps)
    }

    pub fn with_settings(
        settings: PipelineSettings,
        rules: GameRules,
        deps: PipelineDeps,
    ) -> Self {
        let classifier = IntentClassifier::new();
        Self {
            locales: LocaleRegistry::new(rules.clone(), &settings.default_language),
            classifier,
            escalation: EscalationResponder::new(classifier),
            context: SessionContextBuilder::new(classifier),
            formatter: ContextFormatter::new(rules.clone(), settings.max_context_rows),
            translator: QueryTranslator::new(
                rules,
                settings.sql_default_limit,
                settings.lookup_timeout,
            ),
            budget: SqlAttemptBudget::new(settings.sql_max_attempts, settings.sql_session_timeout),
            breaker: Arc::new(Breaker::new(
                settings.breaker_threshold,
                settings.breaker_open_timeout,
            )),
            stats: deps.stats,
            queries: deps.queries,
            model: deps.model,
            prompts: deps.prompts,
            rng: Mutex::new(StdRng::from_os_rng()),
            clock: Box::new(|| chrono::Local::now().naive_local()),
            settings,
        }
    }

    /// Use a fixed random source for template selection.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Use a fixed clock for date resolution and the next-draw lookup.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Share an existing breaker, e.g. with another pipeline.
    pub fn with_breaker(mut self, breaker: Arc<Breaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn breaker(&self) -> &Breaker {
        &self.breaker
    }

    pub fn locales(&self) -> &LocaleRegistry {
        &self.locales
    }

    pub(crate) fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// Reject requests the pipeline never processes.
    pub fn validate_request(&self, request: &ChatRequest) -> Result<(), ChatError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.settings.max_message_length {
            return Err(ChatError::MessageTooLong(self.settings.max_message_length));
        }
        Ok(())
    }

    /// Whether the generative path is configured for `locale`.
    pub(crate) fn generation_ready(&self, locale: &Locale) -> Option<(&str, &dyn GenerativeModel)> {
        let prompt = self.prompts.get(locale.language)?;
        let model = self.model.as_deref()?;
        Some((prompt, model))
    }

    // -------------------------------------------------------------------------
    // Entry points
    // -------------------------------------------------------------------------

    /// Answer one message.
    ///
    /// Only request validation fails; every later problem degrades to a
    /// fallback reply with the matching source tag.
    pub async fn handle_chat(&self, request: ChatRequest) -> Result<PipelineResult, ChatError> {
        self.validate_request(&request)?;
        let locale = self.locales.get(&request.language);

        let (request_body, prefix) = match self.prepare(&request, locale).await {
            Prepared::Reply(result) => return Ok(result),
            Prepared::Generate { request, prefix } => (request, prefix),
        };
        let Some((_, model)) = self.generation_ready(locale) else {
            return Ok(fallback(locale, Source::LocalFallback));
        };

        let timeout = self.settings.generation_timeout;
        let outcome = self
            .breaker
            .call(async {
                tokio::time::timeout(timeout, model.generate(&request_body))
                    .await
                    .map_err(|_| ChatError::Timeout)
                    .and_then(|r| r)
            })
            .await;

        match outcome {
            Ok(text) => {
                let text = clean_reply(&text);
                if text.is_empty() {
                    warn!("Generative reply was empty after clean-up");
                    return Ok(fallback(locale, Source::LocalFallback));
                }
                let text = with_sponsor(
                    format!("{}{}", prefix, text),
                    locale,
                    &request.history,
                    self.settings.sponsor_every,
                );
                info!(source = %Source::GenericModel, "Chat reply generated");
                Ok(PipelineResult::new(text, Source::GenericModel))
            }
            Err(e) => {
                let source = source_for(&e);
                warn!(error = %e, source = %source, "Generation failed, using fallback");
                Ok(fallback(locale, source))
            }
        }
    }

    /// Answer one message as a stream: chunks in generation order, then
    /// exactly one [`ChatEvent::Done`].
    ///
    /// Dropping the returned stream abandons any call still in flight; an
    /// abandoned call counts as neither success nor failure.
    pub fn handle_chat_stream(
        self: Arc<Self>,
        request: ChatRequest,
    ) -> Result<ReceiverStream<ChatEvent>, ChatError> {
        self.validate_request(&request)?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            tokio::select! {
                source = self.stream_reply(&request, &tx) => {
                    let _ = tx.send(ChatEvent::Done { source }).await;
                }
                _ = tx.closed() => {
                    debug!("Stream receiver dropped, abandoning reply");
                }
            }
        });
        Ok(ReceiverStream::new(rx))
    }

    async fn stream_reply(&self, request: &ChatRequest, tx: &mpsc::Sender<ChatEvent>) -> Source {
        let locale = self.locales.get(&request.language);
        let (body, prefix) = match self.prepare(request, locale).await {
            Prepared::Reply(result) => {
                send_chunk(tx, result.text).await;
                return result.source;
            }
            Prepared::Generate { request, prefix } => (request, prefix),
        };
        let Some((_, model)) = self.generation_ready(locale) else {
            send_chunk(tx, locale.text.fallback.to_string()).await;
            return Source::LocalFallback;
        };

        let permit = match self.breaker.try_acquire() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Stream rejected by breaker");
                send_chunk(tx, locale.text.fallback.to_string()).await;
                return Source::BreakerOpen;
            }
        };
        let opened = tokio::time::timeout(self.settings.generation_timeout, model.generate_stream(&body))
            .await
            .map_err(|_| ChatError::Timeout)
            .and_then(|r| r);
        permit.record(&opened);
        let mut stream = match opened {
            Ok(s) => s,
            Err(e) => {
                let source = source_for(&e);
                warn!(error = %e, source = %source, "Stream could not be opened");
                send_chunk(tx, locale.text.fallback.to_string()).await;
                return source;
            }
        };

        let mut cleaner = StreamCleaner::new();
        let mut emitted = false;
        let mut failure: Option<ChatError> = None;
        loop {
            let next = tokio::time::timeout(self.settings.chunk_timeout, stream.next()).await;
            let delta = match next {
                Ok(Some(Ok(delta))) => delta,
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    failure = Some(e);
                    break;
                }
                Err(_) => {
                    failure = Some(ChatError::Timeout);
                    break;
                }
            };
            let mut text = cleaner.push(&delta);
            if !emitted && text.trim().is_empty() {
                continue;
            }
            if !emitted {
                text = format!("{}{}", prefix, text.trim_start());
                emitted = true;
            }
            if tx.send(ChatEvent::Chunk { text }).await.is_err() {
                debug!("Stream receiver dropped");
                return Source::GenericModel;
            }
        }

        if let Some(e) = failure {
            if e.trips_breaker() {
                self.breaker.record_failure();
            }
            let source = source_for(&e);
            warn!(error = %e, source = %source, "Stream interrupted");
            if !emitted {
                send_chunk(tx, locale.text.fallback.to_string()).await;
            }
            return source;
        }

        let tail = cleaner.finish();
        if !emitted && tail.trim().is_empty() {
            warn!("Streamed reply was empty after clean-up");
            send_chunk(tx, locale.text.fallback.to_string()).await;
            return Source::LocalFallback;
        }
        let tail = if emitted {
            tail
        } else {
            format!("{}{}", prefix, tail.trim_start())
        };
        let closing = with_sponsor(tail, locale, &request.history, self.settings.sponsor_every);
        if !closing.is_empty() {
            send_chunk(tx, closing).await;
        }
        info!(source = %Source::GenericModel, "Streamed chat reply complete");
        Source::GenericModel
    }

    // -------------------------------------------------------------------------
    // Local phases
    // -------------------------------------------------------------------------

    async fn prepare(&self, request: &ChatRequest, locale: &Locale) -> Prepared {
        let Some((system_prompt, model)) = self.generation_ready(locale) else {
            info!(language = locale.language, "Generative path not configured");
            return Prepared::Reply(fallback(locale, Source::LocalFallback));
        };

        let now = self.now();
        let today = now.date();
        let message = request.message.trim();
        let ctx = ClassifyContext {
            history: &request.history,
            page: &request.page,
            today,
        };
        let mut intent = self.classifier.classify(message, &ctx, locale);
        info!(intent = intent.name(), language = locale.language, "Message classified");

        let mut prefix = String::new();
        let mut message = message.to_string();
        let mut may_query = matches!(intent, Intent::Generic | Intent::TemporalFilter(_));

        if let Some(category) = EscalationCategory::of(&intent) {
            let embedded = match intent {
                Intent::Insult { threat: false, .. } | Intent::Compliment(_) => {
                    self.classifier.classify_analytic(&message, &ctx, locale)
                }
                _ => None,
            };
            match embedded {
                Some(analytic) => {
                    prefix = match category {
                        EscalationCategory::Insult => locale.text.ack_insult,
                        _ => locale.text.ack_compliment,
                    }
                    .to_string();
                    may_query = matches!(analytic, Intent::TemporalFilter(_));
                    debug!(intent = analytic.name(), "Social message carries a question");
                    intent = analytic;
                }
                None => {
                    let reply = {
                        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                        self.escalation
                            .respond(&intent, &request.history, locale, today, &mut *rng)
                    };
                    match reply {
                        Some(reply) => {
                            info!(source = %reply.source, "Answered from catalog");
                            return Prepared::Reply(reply);
                        }
                        None => intent = Intent::Generic,
                    }
                }
            }
        } else if matches!(intent, Intent::Insult { .. }) {
            debug!("Domain-directed insult, passing to the model");
            intent = Intent::Generic;
        } else if intent == Intent::Continuation {
            if let Some(previous) = request
                .history
                .iter()
                .rev()
                .find(|m| m.role == Role::Assistant)
            {
                message = locale
                    .text
                    .continuation
                    .replace("{previous}", previous.text.trim())
                    .replace("{reply}", &message);
            }
            intent = Intent::Generic;
        }

        let mut blocks = Vec::new();
        if let Some(summary) = self
            .context
            .build(&request.history, request.message.trim(), locale, today)
        {
            blocks.push(session_block(&summary));
        }
        if let Some(data) = self.structured_block(&intent, now).await {
            blocks.push(data_block(&data));
        } else if may_query {
            if let Some(data) = self.query_block(request, locale, model, today).await {
                blocks.push(data_block(&data));
            }
        }

        Prepared::Generate {
            request: GenerationRequest {
                system: compose_system(system_prompt, &blocks),
                messages: conversation(&request.history, &message, self.settings.history_turns),
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_output_tokens,
            },
            prefix,
        }
    }

    /// Structured data for the intent, formatted as context text.
    async fn structured_block(&self, intent: &Intent, now: NaiveDateTime) -> Option<String> {
        let f = &self.formatter;
        match intent {
            Intent::NextDrawQuery => Some(f.next_draw(f.rules().next_draw_after(now))),
            Intent::HistoricalDrawLookup(draw) => {
                let found = self.fetch("draw", self.stats.lookup_draw(*draw)).await?;
                Some(match found {
                    Some(d) => f.draw(&d),
                    None => f.missing_draw(*draw),
                })
            }
            Intent::SingleNumberLookup { number, kind } => {
                let found = self.fetch("number", self.stats.lookup_number(*number, *kind)).await?;
                Some(match found {
                    Some(s) => f.number_stats(&s),
                    None => f.missing_number(*number, *kind),
                })
            }
            Intent::GridSubmission(grid) => Some(f.grid_analysis(grid, &self.grid_stats(grid).await)),
            Intent::ComplexQuery(ComplexQuery::Ranking {
                sort,
                order,
                limit,
                kind,
            }) => {
                let ranked = self
                    .fetch("rank", self.stats.rank(*sort, *order, *limit, *kind))
                    .await?;
                Some(f.ranking(&ranked, *sort, *order, *kind))
            }
            Intent::ComplexQuery(ComplexQuery::Comparison {
                first,
                second,
                kind,
            }) => {
                let cmp = self
                    .fetch("compare", self.stats.compare(*first, *second, *kind))
                    .await?;
                Some(match cmp {
                    Some(c) => f.comparison(&c),
                    None => format!(
                        "{}\n{}",
                        f.missing_number(*first, *kind),
                        f.missing_number(*second, *kind)
                    ),
                })
            }
            Intent::ComplexQuery(ComplexQuery::Category { category, kind }) => {
                let list = self
                    .fetch("category", self.stats.category(*category, *kind))
                    .await?;
                Some(f.category(&list, *category, *kind))
            }
            _ => None,
        }
    }

    pub(crate) async fn grid_stats(&self, grid: &Grid) -> Vec<NumberStats> {
        let numbers = grid
            .primaries
            .iter()
            .map(|n| (*n, NumberKind::Primary))
            .chain(grid.secondaries.iter().map(|n| (*n, NumberKind::Secondary)));
        let mut out = Vec::new();
        for (number, kind) in numbers {
            if let Some(Some(s)) = self.fetch("grid", self.stats.lookup_number(number, kind)).await {
                out.push(s);
            }
        }
        out
    }

    async fn query_block(
        &self,
        request: &ChatRequest,
        locale: &Locale,
        model: &dyn GenerativeModel,
        today: chrono::NaiveDate,
    ) -> Option<String> {
        if !self.settings.sql_enabled {
            return None;
        }
        let store = self.queries.as_deref()?;
        if !self.budget.try_acquire(request.session_id.as_deref()) {
            info!("Dynamic query budget exhausted for session");
            return None;
        }
        let answer = self
            .translator
            .answer(
                model,
                &self.breaker,
                store,
                &request.history,
                request.message.trim(),
                today,
                locale.text.language_name,
            )
            .await?;
        Some(self.formatter.query_rows(&answer.sql, &answer.rows))
    }

    /// Run a draw-history lookup with the lookup timeout; failures are
    /// logged and read as "no data".
    pub(crate) async fn fetch<T, F>(&self, what: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, ChatError>>,
    {
        match tokio::time::timeout(self.settings.lookup_timeout, fut).await {
            Ok(Ok(v)) => Some(v),
            Ok(Err(e)) => {
                warn!(lookup = what, error = %e, "Draw-history lookup failed");
                None
            }
            Err(_) => {
                warn!(lookup = what, "Draw-history lookup timed out");
                None
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub(crate) fn fallback(locale: &Locale, source: Source) -> PipelineResult {
    PipelineResult::new(locale.text.fallback, source)
}

pub(crate) fn source_for(error: &ChatError) -> Source {
    match error {
        ChatError::BreakerOpen => Source::BreakerOpen,
        ChatError::Timeout => Source::Timeout,
        _ => Source::LocalFallback,
    }
}

async fn send_chunk(tx: &mpsc::Sender<ChatEvent>, text: String) {
    if text.is_empty() {
        return;
    }
    let _ = tx.send(ChatEvent::Chunk { text }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextStream;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use crate::types::ConversationMessage;
    use tirage_core::types::{CategoryKind, Comparison, Draw, DrawRef, QueryRows, RankOrder, SortKey};

    // ---- Fakes ----

    struct FakeStats;

    fn fake_number(number: u32, kind: NumberKind) -> NumberStats {
        NumberStats {
            number,
            kind,
            occurrences: 30 + number,
            total_draws: 200,
            last_seen: NaiveDate::from_ymd_opt(2024, 3, 16),
            gap: Some(1),
            recent_occurrences: 2,
        }
    }

    #[async_trait]
    impl DrawStats for FakeStats {
        async fn lookup_number(
            &self,
            number: u32,
            kind: NumberKind,
        ) -> Result<Option<NumberStats>, ChatError> {
            Ok(Some(fake_number(number, kind)))
        }

        async fn lookup_draw(&self, draw: DrawRef) -> Result<Option<Draw>, ChatError> {
            Ok(match draw {
                DrawRef::Latest => Some(Draw {
                    date: NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
                    primaries: vec![4, 8, 15, 16, 23],
                    secondaries: vec![7],
                }),
                DrawRef::Date(_) => None,
            })
        }

        async fn rank(
            &self,
            _sort: SortKey,
            _order: RankOrder,
            limit: usize,
            kind: NumberKind,
        ) -> Result<Vec<NumberStats>, ChatError> {
            Ok((1..=limit as u32).map(|n| fake_number(n, kind)).collect())
        }

        async fn compare(
            &self,
            first: u32,
            second: u32,
            kind: NumberKind,
        ) -> Result<Option<Comparison>, ChatError> {
            Ok(Some(Comparison {
                first: fake_number(first, kind),
                second: fake_number(second, kind),
            }))
        }

        async fn category(
            &self,
            _category: CategoryKind,
            kind: NumberKind,
        ) -> Result<Vec<NumberStats>, ChatError> {
            Err(ChatError::Storage(format!("{:?} pool unavailable", kind)))
        }
    }

    struct FakeQueries {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueryStore for FakeQueries {
        async fn run_readonly(&self, _sql: &str, _max_rows: usize) -> Result<QueryRows, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(QueryRows {
                columns: vec!["total".to_string()],
                rows: vec![vec![serde_json::json!(42)]],
            })
        }
    }

    /// Replies from a script, recording every request.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, ChatError>>>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<&str, ChatError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn next(&self, request: &GenerationRequest) -> Result<String, ChatError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("Default reply.".to_string()))
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, ChatError> {
            self.next(request)
        }

        async fn generate_stream(&self, request: &GenerationRequest) -> Result<TextStream, ChatError> {
            let text = self.next(request)?;
            let pieces: Vec<Result<String, ChatError>> = text
                .split_inclusive(' ')
                .map(|p| Ok(p.to_string()))
                .collect();
            Ok(Box::pin(futures::stream::iter(pieces)))
        }
    }

    fn now() -> NaiveDateTime {
        // Wednesday 2024-03-20, 10:00.
        NaiveDate::from_ymd_opt(2024, 3, 20)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn pipeline_with(model: Option<Arc<ScriptedModel>>, settings: PipelineSettings) -> ChatPipeline {
        pipeline_with_model(model.map(|m| m as Arc<dyn GenerativeModel>), settings)
    }

    fn pipeline_with_model(
        model: Option<Arc<dyn GenerativeModel>>,
        settings: PipelineSettings,
    ) -> ChatPipeline {
        let deps = PipelineDeps {
            stats: Arc::new(FakeStats),
            queries: Some(Arc::new(FakeQueries {
                calls: AtomicUsize::new(0),
            })),
            model,
            prompts: SystemPrompts::from_pairs([("en", "You help Loto players."), ("fr", "Tu aides les joueurs.")]),
        };
        ChatPipeline::with_settings(settings, GameRules::loto(), deps)
            .with_rng(StdRng::seed_from_u64(7))
            .with_clock(now)
    }

    fn pipeline(model: Arc<ScriptedModel>) -> ChatPipeline {
        pipeline_with(Some(model), PipelineSettings::default())
    }

    fn ask(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            language: "en".to_string(),
            ..Default::default()
        }
    }

    // ---- Validation and configuration ----

    #[tokio::test]
    async fn test_rejects_empty_and_long_messages() {
        let p = pipeline(ScriptedModel::new(vec![]));
        assert_eq!(p.handle_chat(ask("   ")).await, Err(ChatError::EmptyMessage));
        let long = "a".repeat(2001);
        assert_eq!(p.handle_chat(ask(&long)).await, Err(ChatError::MessageTooLong(2000)));
    }

    #[tokio::test]
    async fn test_no_credential_gives_local_fallback() {
        let p = pipeline_with(None, PipelineSettings::default());
        let result = p.handle_chat(ask("You are an idiot")).await.unwrap();
        assert_eq!(result.source, Source::LocalFallback);
        assert_eq!(result.text, p.locales.get("en").text.fallback);
    }

    #[tokio::test]
    async fn test_no_prompt_for_language_gives_local_fallback() {
        let model = ScriptedModel::new(vec![]);
        let deps = PipelineDeps {
            stats: Arc::new(FakeStats),
            queries: None,
            model: Some(model.clone()),
            prompts: SystemPrompts::from_pairs([("fr", "Tu aides.")]),
        };
        let p = ChatPipeline::with_settings(PipelineSettings::default(), GameRules::loto(), deps)
            .with_clock(now);
        let result = p.handle_chat(ask("hello")).await.unwrap();
        assert_eq!(result.source, Source::LocalFallback);
        assert_eq!(model.calls(), 0);
    }

    // ---- Social intents ----

    #[tokio::test]
    async fn test_insult_escalates_without_model_call() {
        let model = ScriptedModel::new(vec![]);
        let p = pipeline(model.clone());
        let locale = p.locales.get("en");
        let mut history = Vec::new();
        for tier in 0..3 {
            let mut req = ask("You are an idiot");
            req.history = history.clone();
            let result = p.handle_chat(req).await.unwrap();
            assert_eq!(result.source, Source::InsultResponse);
            let pool = locale.catalog.insult.tier(tier);
            assert!(pool.contains(&result.text.as_str()), "tier {}: {}", tier, result.text);
            history.push(ConversationMessage::user("You are an idiot"));
            history.push(ConversationMessage::assistant(result.text));
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_is_answered_locally() {
        let model = ScriptedModel::new(vec![]);
        let p = pipeline(model.clone());
        let result = p.handle_chat(ask("number 99")).await.unwrap();
        assert_eq!(result.source, Source::OutOfRangeResponse);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_compliment_with_question_gets_prefix() {
        let model = ScriptedModel::new(vec![Ok("Number 7 came out 37 times.")]);
        let p = pipeline(model.clone());
        let result = p
            .handle_chat(ask("you're awesome, tell me about number 7"))
            .await
            .unwrap();
        assert_eq!(result.source, Source::GenericModel);
        assert!(result.text.starts_with(p.locales.get("en").text.ack_compliment));
        let system = &model.requests.lock().unwrap()[0].system;
        assert!(system.contains("[DATA]\nLoto main number 7"));
    }

    #[tokio::test]
    async fn test_domain_insult_goes_to_model() {
        let model = ScriptedModel::new(vec![Ok("I understand the frustration.")]);
        let p = pipeline(model.clone());
        let result = p.handle_chat(ask("this lottery is rigged crap")).await.unwrap();
        assert_eq!(result.source, Source::GenericModel);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_continuation_is_restated() {
        let model = ScriptedModel::new(vec![Ok("Here is more.")]);
        let p = pipeline(model.clone());
        let mut req = ask("yes please");
        req.history = vec![
            ConversationMessage::user("tell me about number 7"),
            ConversationMessage::assistant("7 came out 37 times. Want the gap too?"),
        ];
        p.handle_chat(req).await.unwrap();
        let requests = model.requests.lock().unwrap();
        let last = requests[0].messages.last().unwrap();
        assert!(last.text.contains("Want the gap too?"));
        assert!(last.text.contains("\"yes please\""));
    }

    // ---- Structured and dynamic context ----

    #[tokio::test]
    async fn test_latest_draw_context() {
        let model = ScriptedModel::new(vec![Ok("The latest draw was on Monday.")]);
        let p = pipeline(model.clone());
        p.handle_chat(ask("latest results please")).await.unwrap();
        let system = &model.requests.lock().unwrap()[0].system;
        assert!(system.contains("Loto draw of 2024-03-18 (Monday): main numbers 4 8 15 16 23"));
    }

    #[tokio::test]
    async fn test_next_draw_is_computed_locally() {
        let model = ScriptedModel::new(vec![Ok("Tonight? No, Saturday.")]);
        let p = pipeline(model.clone());
        p.handle_chat(ask("When is the next draw?")).await.unwrap();
        let system = &model.requests.lock().unwrap()[0].system;
        // Wednesday 10:00 -> same day 20:15.
        assert!(system.contains("on Wednesday 2024-03-20 at 20:15"));
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_to_no_context() {
        let model = ScriptedModel::new(vec![Ok("Hot numbers change often.")]);
        let p = pipeline(model.clone());
        let result = p
            .handle_chat(ask("which numbers are hot right now?"))
            .await
            .unwrap();
        assert_eq!(result.source, Source::GenericModel);
        assert!(!model.requests.lock().unwrap()[0].system.contains("[DATA]"));
    }

    #[tokio::test]
    async fn test_generic_question_uses_dynamic_query() {
        let model = ScriptedModel::new(vec![
            Ok("SELECT COUNT(*) AS total FROM draws WHERE weekday = 'saturday'"),
            Ok("There were 42 Saturday draws."),
        ]);
        let p = pipeline(model.clone());
        let result = p
            .handle_chat(ask("how many draws fell on a weekend?"))
            .await
            .unwrap();
        assert_eq!(result.text, "There were 42 Saturday draws.");
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].system.contains("Columns: total\n42"));
        assert!(requests[1].system.contains("LIMIT 50"));
    }

    #[tokio::test]
    async fn test_rejected_query_falls_through_without_context() {
        let model = ScriptedModel::new(vec![
            Ok("DELETE FROM draws"),
            Ok("I can only read the history."),
        ]);
        let p = pipeline(model.clone());
        let result = p.handle_chat(ask("how many draws are stored?")).await.unwrap();
        assert_eq!(result.source, Source::GenericModel);
        assert!(!model.requests.lock().unwrap()[1].system.contains("[DATA]"));
    }

    #[tokio::test]
    async fn test_query_budget_per_session() {
        let mut settings = PipelineSettings::default();
        settings.sql_max_attempts = 1;
        let model = ScriptedModel::new(vec![
            Ok("SELECT 1 AS total"),
            Ok("First."),
            Ok("Second."),
        ]);
        let p = pipeline_with(Some(model.clone()), settings);
        let mut req = ask("how many draws are stored?");
        req.session_id = Some("s1".to_string());
        p.handle_chat(req.clone()).await.unwrap();
        let second = p.handle_chat(req).await.unwrap();
        assert_eq!(second.text, "Second.");
        // translation, answer, answer
        assert_eq!(model.calls(), 3);
    }

    // ---- Reply handling ----

    #[tokio::test]
    async fn test_reply_is_cleaned() {
        let model = ScriptedModel::new(vec![Ok("[DATA]leak[/DATA]Seven is common 你好.")]);
        let p = pipeline(model);
        let result = p.handle_chat(ask("tell me about number 7")).await.unwrap();
        assert_eq!(result.text, "Seven is common .");
    }

    #[tokio::test]
    async fn test_empty_reply_gives_local_fallback() {
        let model = ScriptedModel::new(vec![Ok("<context>only tags</context>")]);
        let p = pipeline(model);
        let result = p.handle_chat(ask("tell me about number 7")).await.unwrap();
        assert_eq!(result.source, Source::LocalFallback);
    }

    #[tokio::test]
    async fn test_breaker_opens_after_three_server_errors() {
        let err = || {
            Err(ChatError::Upstream {
                status: 500,
                body: String::new(),
            })
        };
        let model = ScriptedModel::new(vec![err(), err(), err(), Ok("never")]);
        let p = pipeline(model.clone());
        for _ in 0..3 {
            let r = p.handle_chat(ask("tell me about number 7")).await.unwrap();
            assert_eq!(r.source, Source::LocalFallback);
        }
        let fourth = p.handle_chat(ask("tell me about number 7")).await.unwrap();
        assert_eq!(fourth.source, Source::BreakerOpen);
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_timeout_source() {
        let model = ScriptedModel::new(vec![Err(ChatError::Timeout)]);
        let p = pipeline(model);
        let r = p.handle_chat(ask("tell me about number 7")).await.unwrap();
        assert_eq!(r.source, Source::Timeout);
    }

    #[tokio::test]
    async fn test_sponsor_line_on_cadence() {
        let mut settings = PipelineSettings::default();
        settings.sponsor_every = 1;
        let model = ScriptedModel::new(vec![Ok("Seven is common.")]);
        let p = pipeline_with(Some(model), settings);
        let r = p.handle_chat(ask("tell me about number 7")).await.unwrap();
        let sponsor = p.locales.get("en").text.sponsors[0];
        assert_eq!(r.text, format!("Seven is common.\n\n{}", sponsor));
    }

    // ---- Streaming ----

    async fn collect(stream: ReceiverStream<ChatEvent>) -> Vec<ChatEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_stream_chunks_then_done() {
        let model = ScriptedModel::new(vec![Ok("Seven is [DATA]x[/DATA]common.")]);
        let p = Arc::new(pipeline(model));
        let events = collect(p.handle_chat_stream(ask("tell me about number 7")).unwrap()).await;
        let (last, chunks) = events.split_last().unwrap();
        assert_eq!(
            last,
            &ChatEvent::Done {
                source: Source::GenericModel
            }
        );
        let text: String = chunks
            .iter()
            .map(|e| match e {
                ChatEvent::Chunk { text } => text.as_str(),
                ChatEvent::Done { .. } => panic!("done before the end"),
            })
            .collect();
        assert_eq!(text, "Seven is common.");
    }

    #[tokio::test]
    async fn test_stream_local_reply() {
        let p = Arc::new(pipeline(ScriptedModel::new(vec![])));
        let events = collect(p.handle_chat_stream(ask("number 0")).unwrap()).await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ChatEvent::Done {
                source: Source::OutOfRangeResponse
            }
        );
    }

    #[tokio::test]
    async fn test_stream_failure_gives_fallback() {
        let model = ScriptedModel::new(vec![Err(ChatError::Network("refused".to_string()))]);
        let p = Arc::new(pipeline(model));
        let events = collect(p.clone().handle_chat_stream(ask("tell me about number 7")).unwrap()).await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Chunk {
                    text: p.locales.get("en").text.fallback.to_string()
                },
                ChatEvent::Done {
                    source: Source::LocalFallback
                },
            ]
        );
        assert_eq!(p.breaker().snapshot().consecutive_failures, 1);
    }

    /// Never answers; flags when the pending call is dropped.
    struct StalledModel {
        started: tokio::sync::Notify,
        abandoned: Arc<AtomicBool>,
    }

    struct FlagOnDrop(Arc<AtomicBool>);

    impl Drop for FlagOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl GenerativeModel for StalledModel {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, ChatError> {
            Err(ChatError::Disabled)
        }

        async fn generate_stream(&self, _request: &GenerationRequest) -> Result<TextStream, ChatError> {
            let _flag = FlagOnDrop(Arc::clone(&self.abandoned));
            self.started.notify_one();
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ChatError::Timeout)
        }
    }

    #[tokio::test]
    async fn test_dropped_stream_abandons_call_without_recording() {
        let model = Arc::new(StalledModel {
            started: tokio::sync::Notify::new(),
            abandoned: Arc::new(AtomicBool::new(false)),
        });
        let mut settings = PipelineSettings::default();
        settings.generation_timeout = Duration::from_millis(100);
        let p = Arc::new(pipeline_with_model(
            Some(model.clone() as Arc<dyn GenerativeModel>),
            settings,
        ));

        let stream = p.clone().handle_chat_stream(ask("tell me about number 7")).unwrap();
        model.started.notified().await;
        drop(stream);

        // Well past the generation timeout.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(model.abandoned.load(Ordering::SeqCst));
        let snapshot = p.breaker().snapshot();
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.state, crate::breaker::BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_stream_validation_error() {
        let p = Arc::new(pipeline(ScriptedModel::new(vec![])));
        assert!(matches!(
            p.handle_chat_stream(ask("")),
            Err(ChatError::EmptyMessage)
        ));
    }
}
