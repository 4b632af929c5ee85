//! End-to-end tests for the Lectern tutoring pipeline.
//!
//! These drive the orchestrator with the real tutor tools, stores and course
//! catalog, replacing only the model with a scripted delta stream.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use lectern_agent::{
    AgentContext, Orchestrator, RunRequest, RunSettings, RunStatus, TextPart, clean_references,
    parse_citations, parse_references, parse_text_parts,
};
use lectern_config::AppConfig;
use lectern_core::artifact::{ArtifactStore, ArtifactType};
use lectern_core::delta::{Delta, ToolCallChunk};
use lectern_core::error::ProviderError;
use lectern_core::event::{AgentEvent, RecordingSink};
use lectern_core::message::{Role, SessionId};
use lectern_core::provider::{DeltaStream, Provider, ProviderRequest};
use lectern_memory::{FileCourseCatalog, InMemoryArtifactStore, InMemorySessionStore};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const DP_ID: &str = "14-dynamic-programming-basics";
const DP_TITLE: &str = "14 打家劫舍：动态规划的解题四步骤";
const DP_CONTENT: &str = "# 打家劫舍\n\n## 定义子问题\n\n偷前 k 间房子的最大金额。\n";

// ── Scripted model ───────────────────────────────────────────────────────

/// Replays one scripted list of deltas per model turn.
struct ScriptedProvider {
    turns: Mutex<VecDeque<Vec<Delta>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(turns: Vec<Vec<Delta>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<DeltaStream, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let deltas = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider exhausted"));

        let (tx, rx) = tokio::sync::mpsc::channel(deltas.len().max(1));
        for delta in deltas {
            tx.send(Ok(delta)).await.unwrap();
        }
        Ok(rx)
    }
}

fn text_turn(fragments: &[&str]) -> Vec<Delta> {
    fragments.iter().map(|f| Delta::text(*f)).collect()
}

/// Tool calls streamed the way chat-completions APIs do: the first fragment
/// of each call carries id and name, the rest only argument text.
fn tool_turn(calls: &[(&str, &str, serde_json::Value)]) -> Vec<Delta> {
    let mut deltas = Vec::new();
    for (index, (id, name, args)) in calls.iter().enumerate() {
        let args = args.to_string();
        let mid = args.char_indices().nth(args.chars().count() / 2).map_or(0, |(i, _)| i);
        let (head, tail) = args.split_at(mid);
        let index = index as u32;
        deltas.push(Delta::tool_chunk(
            ToolCallChunk::new(index).id(*id).name(*name).arguments(head),
        ));
        deltas.push(Delta::tool_chunk(ToolCallChunk::new(index).arguments(tail)));
    }
    deltas
}

// ── Fixture ──────────────────────────────────────────────────────────────

struct Fixture {
    orchestrator: Arc<Orchestrator>,
    provider: Arc<ScriptedProvider>,
    artifacts: Arc<InMemoryArtifactStore>,
    _courses_dir: tempfile::TempDir,
}

fn write_course(dir: &Path, slug: &str, content: &str) {
    let course_dir = dir.join(slug);
    std::fs::create_dir_all(&course_dir).unwrap();
    std::fs::write(course_dir.join(format!("{slug}.md")), content).unwrap();
}

fn fixture(turns: Vec<Vec<Delta>>) -> Fixture {
    let courses_dir = tempfile::tempdir().unwrap();
    write_course(courses_dir.path(), DP_ID, DP_CONTENT);

    let provider = Arc::new(ScriptedProvider::new(turns));
    let artifacts = Arc::new(InMemoryArtifactStore::new());
    let courses = Arc::new(FileCourseCatalog::new(courses_dir.path()));
    let tools = lectern_tools::tutor_registry(courses.clone(), artifacts.clone());

    let ctx = AgentContext {
        provider: provider.clone(),
        router: None,
        tools: Arc::new(tools),
        sessions: Arc::new(InMemorySessionStore::new()),
        artifacts: artifacts.clone(),
        courses,
    };
    let settings = RunSettings::new("mock-model").with_system_prompt("你是算法老师。");

    Fixture {
        orchestrator: Arc::new(Orchestrator::new(ctx, settings)),
        provider,
        artifacts,
        _courses_dir: courses_dir,
    }
}

async fn ask(fx: &Fixture, session: &str, message: &str) -> (lectern_agent::RunOutcome, RecordingSink) {
    let sink = RecordingSink::new();
    let outcome = fx
        .orchestrator
        .execute(
            RunRequest::new(session, message),
            Arc::new(sink.clone()),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    (outcome, sink)
}

fn answer_with_reference() -> Vec<Delta> {
    text_turn(&[
        "打家劫舍的第一步是定义子问题：",
        "偷前 k 间房子的最大金额。\n",
        "<references><reference><type>course</type>",
        &format!("<artifactId>{DP_ID}</artifactId><title>DP</title></reference></references>"),
    ])
}

// ── E2E: tutor pipeline ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_tutor_reads_course_and_cites_it() {
    let fx = fixture(vec![
        tool_turn(&[("call_list", "list_articles", serde_json::json!({"tag": "动态规划"}))]),
        tool_turn(&[("call_read", "read_article", serde_json::json!({"artifact_id": DP_ID}))]),
        answer_with_reference(),
    ]);

    let (outcome, sink) = ask(&fx, "s1", "打家劫舍怎么做？").await;

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.iterations, 3);
    assert!(outcome.saved);
    assert_eq!(
        sink.kinds(),
        vec![
            "run_started",
            "tool_call_start",
            "tool_call_end",
            "tool_call_start",
            "tool_call_end",
            "text_message",
            "text_message",
            "text_message",
            "text_message",
            "artifact_list_updated",
            "run_finished",
        ]
    );

    // Display attributes come from the arguments and the catalog.
    let starts: Vec<_> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AgentEvent::ToolCallStart { attributes, .. } => Some(attributes),
            _ => None,
        })
        .collect();
    assert_eq!(starts[0]["tag"], "动态规划");
    assert_eq!(starts[1]["artifact_id"], DP_ID);
    assert_eq!(starts[1]["title"], DP_TITLE);

    // The referenced course became an artifact titled from the catalog.
    let course = fx.artifacts.get(DP_ID).await.unwrap().unwrap();
    assert_eq!(course.artifact_type, ArtifactType::Course);
    assert_eq!(course.title, DP_TITLE);
    assert_eq!(course.content, DP_CONTENT);

    // The model saw the article text as the read_article result.
    let requests = fx.provider.requests();
    assert_eq!(requests.len(), 3);
    let tool_result = requests[2]
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert_eq!(tool_result.tool_call_id.as_deref(), Some("call_read"));
    assert_eq!(tool_result.content, DP_CONTENT);

    let text = outcome.final_text().unwrap();
    assert_eq!(parse_references(text).len(), 1);
    assert_eq!(
        clean_references(text),
        "打家劫舍的第一步是定义子问题：偷前 k 间房子的最大金额。\n"
    );

    let session = fx
        .orchestrator
        .context()
        .sessions
        .get(&SessionId::from("s1"))
        .await
        .unwrap();
    let roles: Vec<Role> = session.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant,
            Role::Tool,
            Role::Assistant,
        ]
    );
}

#[tokio::test]
async fn e2e_mind_map_end_event_carries_the_new_artifact() {
    let fx = fixture(vec![
        tool_turn(&[(
            "call_map",
            "generate_mind_map_artifact",
            serde_json::json!({"text": "# 动态规划\n- 定义子问题\n- 递推关系"}),
        )]),
        text_turn(&["思维导图已经生成。"]),
    ]);

    let (outcome, sink) = ask(&fx, "s1", "帮我整理一下").await;
    assert_eq!(outcome.status, RunStatus::Completed);

    let stored = fx.artifacts.list().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].artifact_type, ArtifactType::MindMap);
    assert_eq!(stored[0].title, "动态规划");

    let end = sink
        .events()
        .into_iter()
        .find_map(|e| match e {
            AgentEvent::ToolCallEnd { tool_name, attributes, .. } => Some((tool_name, attributes)),
            _ => None,
        })
        .unwrap();
    assert_eq!(end.0, "generate_mind_map_artifact");
    assert_eq!(end.1["artifact_id"], stored[0].id.as_str());
    assert_eq!(end.1["title"], "动态规划");
}

#[tokio::test]
async fn e2e_parallel_calls_report_all_starts_before_ends() {
    let fx = fixture(vec![
        tool_turn(&[
            ("call_a", "list_articles", serde_json::json!({})),
            ("call_b", "read_article", serde_json::json!({"artifact_id": DP_ID})),
        ]),
        text_turn(&["好的。"]),
    ]);

    let (_, sink) = ask(&fx, "s1", "看看有哪些文章").await;

    let tool_events: Vec<(&str, String)> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AgentEvent::ToolCallStart { tool_call_id, .. } => Some(("start", tool_call_id)),
            AgentEvent::ToolCallEnd { tool_call_id, .. } => Some(("end", tool_call_id)),
            _ => None,
        })
        .collect();
    assert_eq!(
        tool_events,
        vec![
            ("start", "call_a".to_string()),
            ("start", "call_b".to_string()),
            ("end", "call_a".to_string()),
            ("end", "call_b".to_string()),
        ]
    );

    // Both results reach the next model turn, in call order.
    let requests = fx.provider.requests();
    let results: Vec<_> = requests[1]
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.tool_call_id.clone().unwrap_or_default())
        .collect();
    assert_eq!(results, vec!["call_a", "call_b"]);
}

#[tokio::test]
async fn e2e_follow_up_continues_the_session() {
    let fx = fixture(vec![text_turn(&["第一轮回答"]), text_turn(&["第二轮回答"])]);

    ask(&fx, "s1", "第一个问题").await;
    let (outcome, _) = ask(&fx, "s1", "第二个问题").await;
    assert_eq!(outcome.final_text(), Some("第二轮回答"));

    let requests = fx.provider.requests();
    let second = &requests[1].messages;
    assert_eq!(second.iter().filter(|m| m.role == Role::System).count(), 1);
    let contents: Vec<&str> = second.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["你是算法老师。", "第一个问题", "第一轮回答", "第二个问题"]);
}

#[tokio::test]
async fn e2e_bracket_citations_in_the_answer() {
    let fx = fixture(vec![text_turn(&[
        "可以复习这篇：\n",
        &format!("[打家劫舍](course:{DP_ID})\n"),
        "然后自己动手写一遍。",
    ])]);

    let (outcome, _) = ask(&fx, "s1", "推荐一篇文章").await;
    let text = outcome.final_text().unwrap();

    let citations = parse_citations(text);
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].artifact_id, DP_ID);
    assert_eq!(citations[0].title, "打家劫舍");

    let parts = parse_text_parts(text);
    assert!(matches!(parts.first(), Some(TextPart::PlainText { .. })));
    assert!(parts.iter().any(|p| matches!(p, TextPart::Citation { .. })));

    // Bracket links are not the tag syntax, so nothing was materialized.
    assert!(fx.artifacts.list().await.unwrap().is_empty());
}

// ── E2E: gateway ─────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_gateway_streams_a_tool_run() {
    let fx = fixture(vec![
        tool_turn(&[("call_read", "read_article", serde_json::json!({"artifact_id": DP_ID}))]),
        answer_with_reference(),
    ]);
    let state = Arc::new(lectern_gateway::GatewayState::new(fx.orchestrator.clone()));
    let app = lectern_gateway::build_router(state, "http://localhost:5173");

    let body = serde_json::json!({"session_id": "web-1", "message": "讲讲打家劫舍"});
    let req = Request::builder()
        .method("POST")
        .uri("/v1/chat/stream")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&bytes);

    let order = [
        "event: run_started",
        "event: tool_call_start",
        "event: tool_call_end",
        "event: text_message",
        "event: artifact_list_updated",
        "event: run_finished",
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|name| text.find(name).unwrap_or_else(|| panic!("missing {name}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "out of order: {text}");

    // The materialized course is visible through the API.
    let req = Request::builder()
        .uri(format!("/v1/artifacts/{DP_ID}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let artifact: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(artifact["artifact_type"], "course");
    assert_eq!(artifact["title"], DP_TITLE);
}

// ── E2E: configuration ───────────────────────────────────────────────────

#[test]
fn e2e_config_selects_the_evaluator_toolset() {
    let config = AppConfig::from_toml_str(
        r#"
default_provider = "deepseek"
default_model = "deepseek-chat"

[agent]
toolset = "evaluator"
tool_error_mode = "capture"

[providers.deepseek]
api_key = "sk-test"
"#,
    )
    .unwrap();

    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let mut names = orchestrator.context().tools.names();
    names.sort();
    assert_eq!(
        names,
        vec!["write_candidate_titles", "write_comment", "write_introduction"]
    );
    assert_eq!(orchestrator.settings().model, "deepseek-chat");
}

#[test]
fn e2e_config_with_unknown_mode_is_rejected() {
    let config = AppConfig::from_toml_str(
        r#"
[agent]
session_policy = "sometimes"
"#,
    )
    .unwrap();

    let err = Orchestrator::from_config(&config).err().unwrap();
    assert!(err.to_string().contains("sometimes"));
}
