//! services/api/src/adapters/structuring_llm.rs
//!
//! This module contains the adapter for the lesson-plan structuring LLM.
//! It implements the `LessonPlanStructuringService` port from the `core` crate.
//!
//! The endpoint is any OpenAI-compatible chat completions API. By default it is
//! Google's Gemini compatibility layer, authenticated with `GEMINI_API_KEY`.

const SYSTEM_INSTRUCTIONS: &str = "You are an assistant that turns school lesson plans into \
structured JSON. You always answer with a single JSON object and nothing else.";

const STRUCTURE_TEMPLATE: &str = r#"You are a pedagogy specialist. Analyse the lesson plan text below and structure it as JSON.
Extract the following information. Be as detailed as possible and keep the content identical to the original, in the original language.

- title: The title of the activity.
- yearGrade: The school year or grade the plan is meant for (e.g. "3º ano do Ensino Médio").
- teacherName: The name of the teacher who wrote the plan, if present.
- knowledgeArea: The knowledge area(s) involved (e.g. "Matemática e suas Tecnologias", "Artes"). When the term "SEQUÊNCIA DIDÁTICA" appears, treat it as part of the knowledge area and not of the title: write the knowledge area(s) first and then append the suffix " - SEQUÊNCIA DIDÁTICA".
- summary: A summary or general description of the activity in one paragraph.
- objectives: The learning objectives, joined into a single paragraph or a list separated by line breaks (\n).
- skills: The skills worked on (e.g. BNCC codes), separated by line breaks (\n).
- estimatedTime: The total estimated time (e.g. "50 minutos", "2 aulas de 45 min").
- resources: The required resources and materials, separated by line breaks (\n).
- stepByStep: The detailed step-by-step of the activity as one long text, using line breaks (\n) between steps. If there are assessment criteria per step, include them in that step.

The lesson plan text is:
---
{text}
---

Return ONLY the JSON object with the exact keys: "title", "yearGrade", "teacherName", "knowledgeArea", "summary", "objectives", "skills", "estimatedTime", "resources", "stepByStep".
If some information is not found, return an empty string for that field."#;

const IMPROVE_TEMPLATE: &str = r#"You are an expert in instructional design and creative pedagogy.
Take the lesson plan in JSON below and improve it significantly. Be creative, detailed and focused on engagement. Keep the original language.

Improvement instructions:
1. objectives: Make them clearer, measurable and aligned with learning taxonomies. If possible, return them as a list of strings.
2. skills: Suggest socio-emotional or 21st-century skills that can be developed. If possible, return them as a list of strings.
3. stepByStep: Elaborate the steps. Add details, suggest questions that spark the students' curiosity and include time management tips.
4. resources: Suggest digital or alternative resources that can enrich the lesson (videos, apps, etc.). If possible, return them as a list of strings.
5. Consistency: Keep the theme and the core content of the original plan, but enrich it.

Here is the current lesson plan:
```json
{plan}
```

Return ONLY the improved JSON object, keeping exactly the same structure and the same keys as the original object. Do not add any explanation or text before or after the JSON."#;

const STRUCTURE_TEMPERATURE: f32 = 0.2;
const IMPROVE_TEMPERATURE: f32 = 0.7;

use crate::config::ConfigError;
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use lesson_plan_core::{
    domain::LessonPlanContent,
    normalize::normalize_response,
    ports::{LessonPlanStructuringService, PortError, PortResult},
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, error};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `LessonPlanStructuringService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiStructuringAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiStructuringAdapter {
    /// Creates a new `OpenAiStructuringAdapter`.
    ///
    /// Fails immediately when no API key is configured, rather than on the first call.
    pub fn new(api_key: Option<&str>, api_base: &str, model: String) -> Result<Self, ConfigError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Ok(Self {
            client: Client::with_config(config).with_backoff(no_retry_backoff()),
            model,
        })
    }

    /// Sends one prompt and returns the text of the first choice.
    async fn complete(&self, prompt: String, temperature: f32) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(temperature)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| {
                error!("Structuring LLM request failed: {}", e);
                PortError::AiCall(e.to_string())
            })?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PortError::AiCall("LLM response contained no text content.".to_string()))?;

        debug!("Structuring LLM replied with {} characters", content.len());
        Ok(content)
    }
}

/// A backoff policy that gives up after the first attempt.
///
/// The client's default policy retries rate limits and server errors for up to
/// fifteen minutes, which would hold an upload request open long past any
/// reasonable client timeout. Failures surface immediately as `AiCall` instead.
fn no_retry_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

//=========================================================================================
// Prompt Construction
//=========================================================================================

static RE_CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap());
static RE_WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Makes extracted document text safe to embed in the instruction payload:
/// quotes are escaped, control characters dropped, whitespace runs collapsed.
pub fn clean_text(text: &str) -> String {
    let escaped = text.replace('"', "\\\"");
    let without_controls = RE_CONTROL_CHARS.replace_all(&escaped, "");
    RE_WHITESPACE_RUNS
        .replace_all(&without_controls, " ")
        .into_owned()
}

pub fn structuring_prompt(cleaned_text: &str) -> String {
    STRUCTURE_TEMPLATE.replace("{text}", cleaned_text)
}

pub fn improvement_prompt(current: &LessonPlanContent) -> PortResult<String> {
    let plan_json = serde_json::to_string_pretty(current)
        .map_err(|e| PortError::Unexpected(format!("Failed to serialize lesson plan: {}", e)))?;
    Ok(IMPROVE_TEMPLATE.replace("{plan}", &plan_json))
}

//=========================================================================================
// `LessonPlanStructuringService` Trait Implementation
//=========================================================================================

#[async_trait]
impl LessonPlanStructuringService for OpenAiStructuringAdapter {
    async fn structure_text(&self, text: &str) -> PortResult<LessonPlanContent> {
        let prompt = structuring_prompt(&clean_text(text));
        let reply = self.complete(prompt, STRUCTURE_TEMPERATURE).await?;
        Ok(normalize_response(&reply)?)
    }

    async fn improve_plan(&self, current: &LessonPlanContent) -> PortResult<LessonPlanContent> {
        let prompt = improvement_prompt(current)?;
        let reply = self.complete(prompt, IMPROVE_TEMPERATURE).await?;
        Ok(normalize_response(&reply)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_AI_API_BASE;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(content: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gemini-2.0-flash-lite",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    fn adapter_for(server: &MockServer) -> OpenAiStructuringAdapter {
        OpenAiStructuringAdapter::new(Some("key"), &server.uri(), "gemini-2.0-flash-lite".to_string())
            .unwrap()
    }

    #[test]
    fn construction_requires_an_api_key() {
        let missing = OpenAiStructuringAdapter::new(None, DEFAULT_AI_API_BASE, "m".to_string());
        assert!(matches!(missing, Err(ConfigError::MissingVar(var)) if var == "GEMINI_API_KEY"));

        let blank = OpenAiStructuringAdapter::new(Some("   "), DEFAULT_AI_API_BASE, "m".to_string());
        assert!(blank.is_err());

        let ok = OpenAiStructuringAdapter::new(Some("key"), DEFAULT_AI_API_BASE, "m".to_string());
        assert!(ok.is_ok());
    }

    #[test]
    fn clean_text_escapes_strips_and_collapses() {
        let raw = "Plano \"Frações\"\x07\n\n\tObjetivo:\r\n  somar\x00";
        assert_eq!(clean_text(raw), "Plano \\\"Frações\\\" Objetivo: somar");
    }

    #[test]
    fn structuring_prompt_embeds_text_and_lists_every_key() {
        let prompt = structuring_prompt("texto do plano");
        assert!(prompt.contains("---\ntexto do plano\n---"));
        for key in lesson_plan_core::CONTENT_FIELDS {
            assert!(prompt.contains(&format!("\"{}\"", key)), "prompt misses {key}");
        }
        assert!(prompt.contains("SEQUÊNCIA DIDÁTICA"));
    }

    #[test]
    fn improvement_prompt_embeds_fenced_plan() {
        let plan = LessonPlanContent {
            title: "Plano Simples".to_string(),
            ..Default::default()
        };
        let prompt = improvement_prompt(&plan).unwrap();
        assert!(prompt.contains("```json\n{\n  \"title\": \"Plano Simples\""));
        assert!(prompt.contains("\"stepByStep\": \"\""));
    }

    #[tokio::test]
    async fn structure_text_normalizes_a_fenced_reply() {
        let mock_server = MockServer::start().await;
        let reply = "```json\n{\"title\": \"Frações\", \"objectives\": [\"somar\", \"subtrair\"]}\n```";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!(reply))))
            .expect(1)
            .mount(&mock_server)
            .await;

        let content = adapter_for(&mock_server)
            .structure_text("Plano de aula")
            .await
            .unwrap();

        assert_eq!(content.title, "Frações");
        assert_eq!(content.objectives, "somar\nsubtrair");
        assert_eq!(content.summary, "");
    }

    #[tokio::test]
    async fn server_errors_fail_fast_without_retrying() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": { "message": "overloaded", "type": "server_error", "param": null, "code": null }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let adapter = adapter_for(&mock_server);
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            adapter.structure_text("Plano de aula"),
        )
        .await
        .expect("a 503 must not be retried");

        assert!(matches!(result, Err(PortError::AiCall(_))));
    }

    #[tokio::test]
    async fn rate_limits_fail_fast_without_retrying() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "message": "slow down", "type": "rate_limit_exceeded", "param": null, "code": null }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let adapter = adapter_for(&mock_server);
        let plan = LessonPlanContent::default();
        let result = tokio::time::timeout(Duration::from_secs(10), adapter.improve_plan(&plan))
            .await
            .expect("a 429 must not be retried");

        assert!(matches!(result, Err(PortError::AiCall(_))));
    }

    #[tokio::test]
    async fn reply_without_content_is_an_ai_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(serde_json::Value::Null)))
            .mount(&mock_server)
            .await;

        let result = adapter_for(&mock_server).structure_text("Plano").await;
        assert!(
            matches!(result, Err(PortError::AiCall(ref message)) if message.contains("no text content"))
        );
    }

    #[tokio::test]
    async fn reply_without_choices_is_an_ai_error() {
        let mock_server = MockServer::start().await;
        let mut body = completion_body(json!("{}"));
        body["choices"] = json!([]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let result = adapter_for(&mock_server).structure_text("Plano").await;
        assert!(matches!(result, Err(PortError::AiCall(_))));
    }
}
