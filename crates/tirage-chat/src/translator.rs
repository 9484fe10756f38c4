//! Natural-language to read-only query translation.
//!
//! The generative service is asked for one SQLite `SELECT` over the draws
//! table. The reply is validated by [`crate::sql_guard`] before anything
//! touches the store; every failure degrades to "no query context".

use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use tirage_core::types::{GameRules, QueryRows};

use crate::breaker::Breaker;
use crate::data::QueryStore;
use crate::error::ChatError;
use crate::model::{GenerationRequest, GenerativeModel};
use crate::prompt::conversation;
use crate::sql_guard::{ensure_limit, validate_query, QueryRejection};
use crate::types::ConversationMessage;

/// History turns forwarded to the translation call.
pub const TRANSLATION_TURNS: usize = 6;

/// Reply meaning the question needs no query.
const NO_SQL: &str = "NO_SQL";

/// A query proposed by the generative service and the validator's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuery {
    /// Query text, with a row cap appended when it was valid and had none.
    pub sql: String,
    pub verdict: Result<(), QueryRejection>,
}

impl GeneratedQuery {
    pub fn is_valid(&self) -> bool {
        self.verdict.is_ok()
    }
}

/// Rows of a successfully executed generated query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnswer {
    pub sql: String,
    pub rows: QueryRows,
}

/// Drives the translate, validate, execute sequence.
#[derive(Debug, Clone)]
pub struct QueryTranslator {
    rules: GameRules,
    default_limit: u32,
    timeout: Duration,
}

impl QueryTranslator {
    pub fn new(rules: GameRules, default_limit: u32, timeout: Duration) -> Self {
        Self {
            rules,
            default_limit,
            timeout,
        }
    }

    /// Instruction sent as the system message of the translation call.
    pub fn instruction(&self, today: NaiveDate, language_name: &str) -> String {
        let second_star = if self.rules.secondary_count > 1 {
            format!(", s2 = second star (1-{})", self.rules.secondary_max)
        } else {
            ", s2 = always NULL".to_string()
        };
        format!(
            "You translate questions about {game} draw history into one SQLite query.\n\
             Today is {today}. The user writes in {language}.\n\
             Schema: draws(draw_date TEXT 'YYYY-MM-DD', weekday TEXT lowercase english day name, \
             n1, n2, n3, n4, n5 INTEGER main numbers 1-{pmax} in ascending order, \
             s1 INTEGER {secondary} 1-{smax}{second_star}).\n\
             Rules: reply with a single SELECT statement and nothing else. No semicolon, \
             no comments, no explanation, no code fence. Only read the draws table.\n\
             If the question cannot be answered from this table, reply exactly {no_sql}.",
            game = self.rules.name,
            today = today.format("%Y-%m-%d"),
            language = language_name,
            pmax = self.rules.primary_max,
            secondary = if self.rules.secondary_count > 1 {
                "first star"
            } else {
                "chance number"
            },
            smax = self.rules.secondary_max,
            second_star = second_star,
            no_sql = NO_SQL,
        )
    }

    /// Ask the model for a query. `Ok(None)` means the model declined.
    pub async fn translate(
        &self,
        model: &dyn GenerativeModel,
        breaker: &Breaker,
        history: &[ConversationMessage],
        message: &str,
        today: NaiveDate,
        language_name: &str,
    ) -> Result<Option<GeneratedQuery>, ChatError> {
        let request = GenerationRequest {
            system: self.instruction(today, language_name),
            messages: conversation(history, message, TRANSLATION_TURNS),
            temperature: 0.0,
            max_output_tokens: 300,
        };
        let reply = breaker
            .call(async {
                tokio::time::timeout(self.timeout, model.generate(&request))
                    .await
                    .map_err(|_| ChatError::Timeout)?
            })
            .await?;

        Ok(extract_query(&reply).map(|sql| {
            let verdict = validate_query(&sql);
            let sql = if verdict.is_ok() {
                ensure_limit(&sql, self.default_limit)
            } else {
                sql
            };
            GeneratedQuery { sql, verdict }
        }))
    }

    /// Full path: translate, validate and execute. Any failure yields `None`.
    #[allow(clippy::too_many_arguments)]
    pub async fn answer(
        &self,
        model: &dyn GenerativeModel,
        breaker: &Breaker,
        store: &dyn QueryStore,
        history: &[ConversationMessage],
        message: &str,
        today: NaiveDate,
        language_name: &str,
    ) -> Option<QueryAnswer> {
        let generated = match self
            .translate(model, breaker, history, message, today, language_name)
            .await
        {
            Ok(Some(q)) => q,
            Ok(None) => {
                debug!("Translator declined the question");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Query translation failed");
                return None;
            }
        };

        if let Err(rejection) = &generated.verdict {
            warn!(reason = %rejection, sql = %generated.sql, "Generated query rejected");
            return None;
        }

        let max_rows = self.default_limit as usize;
        match tokio::time::timeout(self.timeout, store.run_readonly(&generated.sql, max_rows)).await
        {
            Ok(Ok(rows)) => {
                info!(rows = rows.len(), "Generated query executed");
                Some(QueryAnswer {
                    sql: generated.sql,
                    rows,
                })
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Generated query failed");
                None
            }
            Err(_) => {
                warn!("Generated query timed out");
                None
            }
        }
    }
}

/// Query text from a model reply: code fences, surrounding whitespace and a
/// single trailing `;` are removed. `None` for an empty or `NO_SQL` reply.
pub fn extract_query(reply: &str) -> Option<String> {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the optional language tag on the opening fence line.
        text = match rest.split_once('\n') {
            Some((_, body)) => body,
            None => rest,
        };
        text = text.trim_end();
        text = text.strip_suffix("```").unwrap_or(text);
    }
    let mut text = text.trim();
    if let Some(stripped) = text.strip_suffix(';') {
        text = stripped.trim_end();
    }
    if text.is_empty() || text.eq_ignore_ascii_case(NO_SQL) {
        return None;
    }
    Some(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerState;
    use crate::model::TextStream;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedModel {
        reply: Result<String, ChatError>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl CannedModel {
        fn new(reply: Result<&str, ChatError>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerativeModel for CannedModel {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, ChatError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone()
        }

        async fn generate_stream(&self, _: &GenerationRequest) -> Result<TextStream, ChatError> {
            Err(ChatError::EmptyResponse)
        }
    }

    struct RecordingStore {
        fail: bool,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryStore for RecordingStore {
        async fn run_readonly(&self, sql: &str, _max_rows: usize) -> Result<QueryRows, ChatError> {
            self.seen.lock().unwrap().push(sql.to_string());
            if self.fail {
                return Err(ChatError::Storage("disk I/O error".to_string()));
            }
            Ok(QueryRows {
                columns: vec!["n".to_string()],
                rows: vec![vec![serde_json::json!(12)]],
            })
        }
    }

    fn translator() -> QueryTranslator {
        QueryTranslator::new(GameRules::loto(), 50, Duration::from_secs(8))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 20).unwrap()
    }

    // ---- Reply extraction ----

    #[test]
    fn test_extract_plain_and_fenced() {
        assert_eq!(
            extract_query("SELECT * FROM draws;").as_deref(),
            Some("SELECT * FROM draws")
        );
        assert_eq!(
            extract_query("```sql\nSELECT n1 FROM draws;\n```").as_deref(),
            Some("SELECT n1 FROM draws")
        );
        assert_eq!(
            extract_query("  ```\nSELECT 1\n```  ").as_deref(),
            Some("SELECT 1")
        );
    }

    #[test]
    fn test_extract_no_sql() {
        assert_eq!(extract_query("NO_SQL"), None);
        assert_eq!(extract_query(" no_sql \n"), None);
        assert_eq!(extract_query("   "), None);
    }

    #[test]
    fn test_extract_keeps_inner_separator() {
        // Only one trailing separator is removed; the validator sees the rest.
        assert_eq!(
            extract_query("SELECT 1; DROP TABLE draws;").as_deref(),
            Some("SELECT 1; DROP TABLE draws")
        );
    }

    #[test]
    fn test_instruction_mentions_schema_and_date() {
        let text = translator().instruction(today(), "French");
        assert!(text.contains("Today is 2024-03-20"));
        assert!(text.contains("draws(draw_date"));
        assert!(text.contains("s2 = always NULL"));
        assert!(text.contains("French"));
    }

    // ---- Translation ----

    #[tokio::test]
    async fn test_translate_appends_limit_and_merges_history() {
        let model = CannedModel::new(Ok("SELECT n1 FROM draws WHERE draw_date >= '2024-01-01'"));
        let breaker = Breaker::default();
        let history = vec![
            ConversationMessage::user("hi"),
            ConversationMessage::user("are you there"),
            ConversationMessage::assistant("yes"),
        ];
        let q = translator()
            .translate(&model, &breaker, &history, "draws since january?", today(), "English")
            .await
            .unwrap()
            .unwrap();
        assert!(q.is_valid());
        assert!(q.sql.ends_with("LIMIT 50"));

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].messages.len(), 3);
        assert_eq!(seen[0].messages[0].text, "hi\nare you there");
    }

    #[tokio::test]
    async fn test_translate_flags_unsafe_query() {
        let model = CannedModel::new(Ok("SELECT 1; DELETE FROM draws"));
        let q = translator()
            .translate(&model, &Breaker::default(), &[], "wipe", today(), "English")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(q.verdict, Err(QueryRejection::StatementSeparator));
        assert!(!q.sql.contains("LIMIT"));
    }

    #[tokio::test]
    async fn test_answer_never_executes_rejected_query() {
        let model = CannedModel::new(Ok("SELECT * FROM sqlite_master"));
        let store = RecordingStore {
            fail: false,
            seen: Mutex::new(Vec::new()),
        };
        let answer = translator()
            .answer(&model, &Breaker::default(), &store, &[], "schema?", today(), "English")
            .await;
        assert!(answer.is_none());
        assert!(store.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_runs_valid_query() {
        let model = CannedModel::new(Ok("```sql\nSELECT n1 AS n FROM draws LIMIT 3;\n```"));
        let store = RecordingStore {
            fail: false,
            seen: Mutex::new(Vec::new()),
        };
        let answer = translator()
            .answer(&model, &Breaker::default(), &store, &[], "first numbers", today(), "English")
            .await
            .unwrap();
        assert_eq!(answer.sql, "SELECT n1 AS n FROM draws LIMIT 3");
        assert_eq!(answer.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_answer_swallows_store_errors() {
        let model = CannedModel::new(Ok("SELECT n1 FROM draws"));
        let store = RecordingStore {
            fail: true,
            seen: Mutex::new(Vec::new()),
        };
        let answer = translator()
            .answer(&model, &Breaker::default(), &store, &[], "q", today(), "English")
            .await;
        assert!(answer.is_none());
        assert_eq!(store.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_translation_failures_count_against_breaker() {
        let model = CannedModel::new(Err(ChatError::Upstream {
            status: 503,
            body: String::new(),
        }));
        let breaker = Breaker::new(2, Duration::from_secs(60));
        let store = RecordingStore {
            fail: false,
            seen: Mutex::new(Vec::new()),
        };
        for _ in 0..2 {
            let answer = translator()
                .answer(&model, &breaker, &store, &[], "q", today(), "English")
                .await;
            assert!(answer.is_none());
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
