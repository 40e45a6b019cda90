//! End-to-end pipeline tests against a mocked Ollama backend.
//!
//! The backend profile points at a wiremock server, so these tests exercise
//! the real provider, engine, and aggregator code paths without touching the
//! network.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use quill_config::Settings;
use quill_pipeline::{
    ContentPipeline, PipelineError, RenderedPrompt, Stage, TemplateStore, TemplateVars, prompts,
};
use quill_providers::RetryConfig;
use quill_sources::{ExtractError, SourceAggregator, TextExtractor};
use quill_types::{AuthoringRequest, PageRange, SourceItem, SourceKind, WriteMode};

/// Settings with a single Ollama profile pointing at the mock server.
///
/// 100k-token window (~400k chars at 4 chars/token), 0.7 overflow threshold,
/// 40k-token chunk target.
fn settings_for(server_uri: &str) -> Arc<Settings> {
    let raw = format!(
        r#"
default_provider = "ollama"

[chunking]
target_chunk_tokens = 40000
overflow_threshold = 0.7
map_model = "map-model"
reduce_model = "reduce-model"

[providers.ollama]
max_context_tokens = 100000
default_model = "llama3.1"
base_url = "{server_uri}"
"#
    );
    Arc::new(Settings::from_toml_str(&raw).expect("test settings parse"))
}

struct StubExtractor {
    failing: Vec<&'static str>,
}

#[async_trait]
impl TextExtractor for StubExtractor {
    async fn extract(
        &self,
        locator: &str,
        _page_range: Option<PageRange>,
    ) -> Result<String, ExtractError> {
        if self.failing.contains(&locator) {
            return Err(ExtractError::new(locator, "unreachable"));
        }
        Ok(format!("extracted text of {locator}"))
    }
}

fn aggregator(failing: Vec<&'static str>) -> SourceAggregator {
    let extractor = |failing: Vec<&'static str>| -> Arc<dyn TextExtractor> {
        Arc::new(StubExtractor { failing })
    };
    SourceAggregator::new(
        extractor(failing.clone()),
        extractor(failing.clone()),
        extractor(failing),
    )
}

fn pipeline_for(server_uri: &str, failing_sources: Vec<&'static str>) -> ContentPipeline {
    ContentPipeline::new(settings_for(server_uri), aggregator(failing_sources))
        .with_retry_config(RetryConfig::fast())
}

fn body_json(request: &Request) -> Value {
    serde_json::from_slice(&request.body).expect("request body is JSON")
}

fn system_content(body: &Value) -> String {
    body["messages"][0]["content"].as_str().unwrap_or_default().to_string()
}

fn user_content(body: &Value) -> String {
    body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string()
}

fn ollama_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "message": { "role": "assistant", "content": content },
        "prompt_eval_count": 100,
        "eval_count": 200
    }))
}

/// Mounts a responder that answers "FINAL" for the reduce model and a short
/// summary for everything else.
async fn mount_generate(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(|request: &Request| {
            if body_json(request)["model"] == "reduce-model" {
                ollama_reply("FINAL")
            } else {
                ollama_reply("Generated blog post")
            }
        })
        .mount(server)
        .await;
}

#[tokio::test]
async fn direct_mode_returns_draft_without_llm_calls() {
    let mut request = AuthoringRequest::new(WriteMode::Direct);
    request.draft = Some("My hand-written post".to_string());
    request.title = "Test Post".to_string();

    // No server at all: a direct request must not need one.
    let pipeline = pipeline_for("http://localhost:1", Vec::new());
    let result = pipeline.execute(&request).await.expect("direct mode");

    assert_eq!(result.text, "My hand-written post");
    assert_eq!(result.metadata.title, "Test Post");
    assert!(!result.metadata.llm_assisted);
    assert!(!result.metadata.llm_generated);
    assert!(result.usage.is_none());
}

#[tokio::test]
async fn auto_mode_under_threshold_issues_exactly_one_generate_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply("Generated blog post"))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = AuthoringRequest::new(WriteMode::Auto);
    request.title = "Attention Is All You Need".to_string();
    request.prompt = "Write an overview of transformers".to_string();

    let pipeline = pipeline_for(&server.uri(), Vec::new());
    let result = pipeline.execute(&request).await.expect("auto mode");

    assert_eq!(result.text, "Generated blog post");
    assert!(result.metadata.llm_generated);
    assert_eq!(result.metadata.model.as_deref(), Some("llama3.1"));
    let usage = result.usage.expect("usage attached");
    assert_eq!(usage.input_tokens, 100);
    assert_eq!(usage.output_tokens, 200);

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 1);
    assert!(system_content(&body_json(&requests[0])).contains("technical blog writer"));
}

// 100k-token window at 0.7 threshold: a ~50k-token input (200k chars at
// 4 chars/token) stays on the direct path.
#[tokio::test]
async fn input_at_half_the_window_stays_direct() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply("Generated blog post"))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = AuthoringRequest::new(WriteMode::Auto);
    request.prompt = "x".repeat(200_000);

    let pipeline = pipeline_for(&server.uri(), Vec::new());
    pipeline.execute(&request).await.expect("direct path");

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 1, "a single direct generate call");
}

// Same window, ~90k-token input (360k chars): over the 70k threshold, so the
// pipeline must branch into map-reduce - several map calls plus one reduce.
#[tokio::test]
async fn input_over_threshold_takes_the_map_reduce_path() {
    let server = MockServer::start().await;
    mount_generate(&server).await;

    let mut request = AuthoringRequest::new(WriteMode::Auto);
    request.prompt = "x".repeat(360_000);

    let pipeline = pipeline_for(&server.uri(), Vec::new());
    let result = pipeline.execute(&request).await.expect("map-reduce path");
    assert_eq!(result.text, "FINAL");

    let requests = server.received_requests().await.expect("requests");
    let map_calls = requests
        .iter()
        .filter(|r| body_json(r)["model"] == "map-model")
        .count();
    let reduce_calls = requests
        .iter()
        .filter(|r| body_json(r)["model"] == "reduce-model")
        .count();
    assert!(map_calls > 1, "expected several map calls, got {map_calls}");
    assert_eq!(reduce_calls, 1);
    assert_eq!(requests.len(), map_calls + reduce_calls);
}

#[tokio::test]
async fn failed_source_is_omitted_but_pipeline_succeeds() {
    let server = MockServer::start().await;
    mount_generate(&server).await;

    let mut request = AuthoringRequest::new(WriteMode::Auto);
    request.title = "Summary".to_string();
    request.sources = vec![
        SourceItem::new(SourceKind::Document, "/tmp/a.pdf"),
        SourceItem::new(SourceKind::WebPage, "https://dead.example.com"),
        SourceItem::new(SourceKind::Paper, "2301.07041"),
    ];

    let pipeline = pipeline_for(&server.uri(), vec!["https://dead.example.com"]);
    pipeline.execute(&request).await.expect("partial sources");

    let requests = server.received_requests().await.expect("requests");
    let prompt = user_content(&body_json(&requests[0]));
    assert!(prompt.contains("=== Source 1: /tmp/a.pdf ==="));
    assert!(!prompt.contains("dead.example.com"));
    assert!(prompt.contains("=== Source 3: 2301.07041 ==="));
}

#[tokio::test]
async fn all_sources_failing_is_a_sources_error() {
    let mut request = AuthoringRequest::new(WriteMode::Auto);
    request.sources = vec![
        SourceItem::new(SourceKind::WebPage, "https://dead.example.com"),
        SourceItem::new(SourceKind::WebPage, "https://gone.example.com"),
    ];

    let pipeline = pipeline_for(
        "http://localhost:1",
        vec!["https://dead.example.com", "https://gone.example.com"],
    );
    let err = pipeline.execute(&request).await.expect_err("no sources");

    assert!(matches!(err, PipelineError::Sources(_)));
    assert_eq!(err.stage(), Stage::ResolvingSources);
}

struct StubTemplates;

impl TemplateStore for StubTemplates {
    fn render(&self, template_id: &str, vars: &TemplateVars<'_>) -> Option<RenderedPrompt> {
        (template_id == "deep-dive").then(|| RenderedPrompt {
            system: format!("TEMPLATE SYSTEM | style: {}", vars.style_reference),
            user: format!("TEMPLATE USER | {} | sources: {}", vars.content, vars.sources),
        })
    }
}

struct StubStyles;

impl quill_pipeline::StyleLibrary for StubStyles {
    fn content(&self, reference_id: &str) -> Option<String> {
        (reference_id == "casual").then(|| "casual example text".to_string())
    }
}

#[tokio::test]
async fn template_and_style_reference_shape_the_prompts() {
    let server = MockServer::start().await;
    mount_generate(&server).await;

    let mut request = AuthoringRequest::new(WriteMode::Auto);
    request.title = "Topic".to_string();
    request.template_id = Some("deep-dive".to_string());
    request.style_reference_id = Some("casual".to_string());
    request.sources = vec![SourceItem::new(SourceKind::WebPage, "https://example.com")];

    let pipeline = pipeline_for(&server.uri(), Vec::new())
        .with_templates(Arc::new(StubTemplates))
        .with_styles(Arc::new(StubStyles));
    pipeline.execute(&request).await.expect("templated run");

    let requests = server.received_requests().await.expect("requests");
    let body = body_json(&requests[0]);
    assert_eq!(
        system_content(&body),
        "TEMPLATE SYSTEM | style: casual example text"
    );
    let user = user_content(&body);
    assert!(user.starts_with("TEMPLATE USER |"));
    assert!(user.contains("extracted text of https://example.com"));
}

#[tokio::test]
async fn unresolved_template_falls_back_to_default_prompts() {
    let server = MockServer::start().await;
    mount_generate(&server).await;

    let mut request = AuthoringRequest::new(WriteMode::Auto);
    request.title = "Topic".to_string();
    request.template_id = Some("no-such-template".to_string());

    let pipeline = pipeline_for(&server.uri(), Vec::new()).with_templates(Arc::new(StubTemplates));
    pipeline.execute(&request).await.expect("fallback run");

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(
        system_content(&body_json(&requests[0])),
        prompts::SYSTEM_PROMPT_AUTO
    );
}

#[tokio::test]
async fn get_feedback_issues_one_call_and_marks_assistance() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply("Consider restructuring section 2."))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = AuthoringRequest::new(WriteMode::Pair);
    request.draft = Some("My rough draft".to_string());
    request.title = "WIP".to_string();

    let pipeline = pipeline_for(&server.uri(), Vec::new());
    let result = pipeline.get_feedback(&request).await.expect("feedback");

    assert_eq!(result.text, "Consider restructuring section 2.");
    assert!(result.metadata.llm_assisted);
    assert!(!result.metadata.llm_generated);

    let requests = server.received_requests().await.expect("requests");
    let body = body_json(&requests[0]);
    assert!(system_content(&body).contains("editor"));
    assert!(user_content(&body).contains("My rough draft"));
}

#[tokio::test]
async fn unknown_provider_is_a_config_error() {
    let mut request = AuthoringRequest::new(WriteMode::Auto);
    request.provider = Some("gemini".to_string());
    request.title = "Topic".to_string();

    let pipeline = pipeline_for("http://localhost:1", Vec::new());
    let err = pipeline.execute(&request).await.expect_err("unknown provider");

    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(err.stage(), Stage::AssemblingOptions);
}
