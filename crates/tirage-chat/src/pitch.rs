//! Grid pitches: one short commentary per submitted grid.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ChatError;
use crate::model::GenerationRequest;
use crate::pipeline::ChatPipeline;
use crate::postprocess::clean_reply;
use crate::prompt::{compose_system, data_block};
use crate::types::{ConversationMessage, Grid};

/// Most grids accepted in one batch.
pub const MAX_PITCH_GRIDS: usize = 5;

/// One grid as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchGrid {
    pub numbers: Vec<i64>,
    #[serde(default)]
    pub secondary: Vec<i64>,
}

/// Result of a pitch request, carrying the HTTP status it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status_code: u16,
}

impl PitchOutcome {
    fn ok(pitches: Vec<String>) -> Self {
        Self {
            success: true,
            data: Some(pitches),
            error: None,
            status_code: 200,
        }
    }

    fn failed(status_code: u16, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            status_code,
        }
    }
}

impl ChatPipeline {
    /// Validate `grids` and ask the model for one pitch per grid.
    pub async fn handle_pitch(&self, grids: &[PitchGrid], language: &str) -> PitchOutcome {
        let locale = self.locales.get(language);
        if grids.is_empty() || grids.len() > MAX_PITCH_GRIDS {
            return PitchOutcome::failed(
                400,
                format!("between 1 and {} grids are required", MAX_PITCH_GRIDS),
            );
        }

        let mut parsed = Vec::with_capacity(grids.len());
        for (i, g) in grids.iter().enumerate() {
            match Grid::from_numbers(&g.numbers, &g.secondary, &locale.rules) {
                Ok(grid) => parsed.push(grid),
                Err(reason) => {
                    info!(grid = i + 1, reason = %reason, "Pitch grid rejected");
                    return PitchOutcome::failed(400, format!("grid {}: {}", i + 1, reason));
                }
            }
        }

        let Some((system_prompt, model)) = self.generation_ready(locale) else {
            return PitchOutcome::failed(503, "pitch service is not configured");
        };

        let mut context = Vec::with_capacity(parsed.len());
        for (i, grid) in parsed.iter().enumerate() {
            let stats = self.grid_stats(grid).await;
            context.push(format!(
                "Grid {}:\n{}",
                i + 1,
                self.formatter.grid_analysis(grid, &stats)
            ));
        }

        let instruction = locale
            .text
            .pitch_instruction
            .replace("{count}", &parsed.len().to_string());
        let request = GenerationRequest {
            system: compose_system(system_prompt, &[data_block(&context.join("\n\n"))]),
            messages: vec![ConversationMessage::user(instruction)],
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_output_tokens,
        };

        let reply = self
            .breaker
            .call(async {
                tokio::time::timeout(self.settings.generation_timeout, model.generate(&request))
                    .await
                    .map_err(|_| ChatError::Timeout)
                    .and_then(|r| r)
            })
            .await;
        let reply = match reply {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Pitch generation failed");
                return PitchOutcome::failed(503, "pitch service is temporarily unavailable");
            }
        };

        match parse_pitches(&reply, parsed.len()) {
            Ok(pitches) => {
                info!(grids = pitches.len(), "Pitches generated");
                PitchOutcome::ok(pitches)
            }
            Err(e) => {
                warn!(error = %e, "Pitch reply unusable");
                PitchOutcome::failed(502, "pitch service returned an invalid reply")
            }
        }
    }
}

/// Read a JSON array of exactly `expected` non-empty strings from a reply.
///
/// Code fences and text around the array are ignored.
pub fn parse_pitches(reply: &str, expected: usize) -> Result<Vec<String>, ChatError> {
    let start = reply
        .find('[')
        .ok_or_else(|| ChatError::Malformed("no JSON array in reply".to_string()))?;
    let end = reply
        .rfind(']')
        .filter(|end| *end > start)
        .ok_or_else(|| ChatError::Malformed("unterminated JSON array".to_string()))?;

    let raw: Vec<String> = serde_json::from_str(&reply[start..=end])
        .map_err(|e| ChatError::Malformed(e.to_string()))?;
    if raw.len() != expected {
        return Err(ChatError::Malformed(format!(
            "expected {} pitches, got {}",
            expected,
            raw.len()
        )));
    }
    let pitches: Vec<String> = raw.iter().map(|p| clean_reply(p)).collect();
    if pitches.iter().any(String::is_empty) {
        return Err(ChatError::Malformed("empty pitch".to_string()));
    }
    Ok(pitches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DrawStats;
    use crate::model::{GenerativeModel, TextStream};
    use crate::pipeline::{PipelineDeps, PipelineSettings};
    use crate::prompt::SystemPrompts;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tirage_core::types::{
        CategoryKind, Comparison, Draw, DrawRef, GameRules, NumberKind, NumberStats, RankOrder,
        SortKey,
    };

    struct EmptyStats;

    #[async_trait]
    impl DrawStats for EmptyStats {
        async fn lookup_number(
            &self,
            number: u32,
            kind: NumberKind,
        ) -> Result<Option<NumberStats>, ChatError> {
            Ok(Some(NumberStats {
                number,
                kind,
                occurrences: 10,
                total_draws: 100,
                last_seen: None,
                gap: None,
                recent_occurrences: 0,
            }))
        }

        async fn lookup_draw(&self, _draw: DrawRef) -> Result<Option<Draw>, ChatError> {
            Ok(None)
        }

        async fn rank(
            &self,
            _sort: SortKey,
            _order: RankOrder,
            _limit: usize,
            _kind: NumberKind,
        ) -> Result<Vec<NumberStats>, ChatError> {
            Ok(Vec::new())
        }

        async fn compare(
            &self,
            _first: u32,
            _second: u32,
            _kind: NumberKind,
        ) -> Result<Option<Comparison>, ChatError> {
            Ok(None)
        }

        async fn category(
            &self,
            _category: CategoryKind,
            _kind: NumberKind,
        ) -> Result<Vec<NumberStats>, ChatError> {
            Ok(Vec::new())
        }
    }

    struct FixedModel {
        reply: Result<String, ChatError>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl GenerativeModel for FixedModel {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, ChatError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone()
        }

        async fn generate_stream(&self, _request: &GenerationRequest) -> Result<TextStream, ChatError> {
            Err(ChatError::Disabled)
        }
    }

    fn pipeline(reply: Option<Result<&str, ChatError>>) -> (ChatPipeline, Option<Arc<FixedModel>>) {
        let model = reply.map(|r| {
            Arc::new(FixedModel {
                reply: r.map(str::to_string),
                seen: Mutex::new(Vec::new()),
            })
        });
        let deps = PipelineDeps {
            stats: Arc::new(EmptyStats),
            queries: None,
            model: model.clone().map(|m| m as Arc<dyn GenerativeModel>),
            prompts: SystemPrompts::from_pairs([("en", "You present grids.")]),
        };
        let p = ChatPipeline::with_settings(PipelineSettings::default(), GameRules::loto(), deps);
        (p, model)
    }

    fn grid(numbers: &[i64], secondary: &[i64]) -> PitchGrid {
        PitchGrid {
            numbers: numbers.to_vec(),
            secondary: secondary.to_vec(),
        }
    }

    // ---- Validation ----

    #[tokio::test]
    async fn test_grid_count_limits() {
        let (p, _) = pipeline(Some(Ok("[]")));
        assert_eq!(p.handle_pitch(&[], "en").await.status_code, 400);
        let six = vec![grid(&[1, 2, 3, 4, 5], &[1]); 6];
        let outcome = p.handle_pitch(&six, "en").await;
        assert_eq!(outcome.status_code, 400);
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_invalid_grids_are_rejected_with_reason() {
        let (p, model) = pipeline(Some(Ok("[\"x\"]")));
        let cases = [
            grid(&[1, 2, 3, 4], &[1]),
            grid(&[1, 2, 3, 4, 4], &[1]),
            grid(&[1, 2, 3, 4, 50], &[1]),
            grid(&[1, 2, 3, 4, 5], &[]),
            grid(&[1, 2, 3, 4, 5], &[11]),
        ];
        for case in cases {
            let outcome = p.handle_pitch(&[case.clone()], "en").await;
            assert_eq!(outcome.status_code, 400, "{:?}", case);
            assert!(outcome.error.unwrap().starts_with("grid 1: "));
        }
        assert!(model.unwrap().seen.lock().unwrap().is_empty());
    }

    // ---- Generation ----

    #[tokio::test]
    async fn test_pitches_for_each_grid() {
        let (p, model) = pipeline(Some(Ok(
            "```json\n[\"A balanced grid.\", \"Mostly low numbers.\"]\n```",
        )));
        let grids = [grid(&[5, 12, 23, 34, 45], &[3]), grid(&[1, 2, 3, 4, 9], &[10])];
        let outcome = p.handle_pitch(&grids, "en").await;
        assert_eq!(outcome.status_code, 200);
        assert_eq!(
            outcome.data.unwrap(),
            vec!["A balanced grid.".to_string(), "Mostly low numbers.".to_string()]
        );

        let seen = model.unwrap().seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].system.contains("Grid 2:\nSubmitted Loto grid: main numbers 1 2 3 4 9"));
        assert!(seen[0].messages[0].text.contains("exactly 2 strings"));
    }

    #[tokio::test]
    async fn test_unconfigured_model_is_unavailable() {
        let (p, _) = pipeline(None);
        let outcome = p.handle_pitch(&[grid(&[1, 2, 3, 4, 5], &[1])], "en").await;
        assert_eq!(outcome.status_code, 503);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_unavailable() {
        let (p, _) = pipeline(Some(Err(ChatError::Timeout)));
        let outcome = p.handle_pitch(&[grid(&[1, 2, 3, 4, 5], &[1])], "en").await;
        assert_eq!(outcome.status_code, 503);
        assert_eq!(p.breaker().snapshot().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_bad_gateway() {
        let (p, _) = pipeline(Some(Ok("Here are your pitches!")));
        let outcome = p.handle_pitch(&[grid(&[1, 2, 3, 4, 5], &[1])], "en").await;
        assert_eq!(outcome.status_code, 502);
        assert!(outcome.data.is_none());
    }

    struct SlowModel;

    #[async_trait]
    impl GenerativeModel for SlowModel {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, ChatError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("[\"late\"]".to_string())
        }

        async fn generate_stream(&self, _request: &GenerationRequest) -> Result<TextStream, ChatError> {
            Err(ChatError::Disabled)
        }
    }

    #[tokio::test]
    async fn test_generation_timeout_applies_to_pitches() {
        let mut settings = PipelineSettings::default();
        settings.generation_timeout = Duration::from_millis(50);
        let deps = PipelineDeps {
            stats: Arc::new(EmptyStats),
            queries: None,
            model: Some(Arc::new(SlowModel)),
            prompts: SystemPrompts::from_pairs([("en", "You present grids.")]),
        };
        let p = ChatPipeline::with_settings(settings, GameRules::loto(), deps);

        let outcome = p.handle_pitch(&[grid(&[1, 2, 3, 4, 5], &[1])], "en").await;
        assert_eq!(outcome.status_code, 503);
        assert_eq!(p.breaker().snapshot().consecutive_failures, 1);
    }

    // ---- Parsing ----

    #[test]
    fn test_parse_pitches() {
        assert_eq!(
            parse_pitches("Sure: [\"One.\"] hope it helps", 1).unwrap(),
            vec!["One.".to_string()]
        );
        assert!(parse_pitches("[\"One.\"]", 2).is_err());
        assert!(parse_pitches("[1, 2]", 2).is_err());
        assert!(parse_pitches("[\"[DATA]x[/DATA]\"]", 1).is_err());
        assert!(parse_pitches("] nothing [", 1).is_err());
    }
}
