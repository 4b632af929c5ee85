//! `lectern agent`: Interactive or single-message tutoring chat.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use lectern_agent::{Orchestrator, RunRequest, RunStatus, clean_references, parse_citations, parse_references};
use lectern_config::AppConfig;
use lectern_core::event::{AgentEvent, EventSink};
use lectern_core::message::SessionId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

pub async fn run(message: Option<String>, session: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Local providers run without a key.
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    LECTERN_API_KEY      (generic)");
        eprintln!("    OPENROUTER_API_KEY   (OpenRouter)");
        eprintln!("    OPENAI_API_KEY       (OpenAI direct)");
        eprintln!("    DEEPSEEK_API_KEY     (DeepSeek)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let orchestrator = Orchestrator::from_config(&config)?;
    let session_id = SessionId::from(
        session.unwrap_or_else(|| format!("cli-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S"))),
    );

    if let Some(msg) = message {
        return ask(&orchestrator, &session_id, msg).await;
    }

    println!();
    println!("  Lectern: Interactive Mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Toolset:   {}", config.agent.toolset);
    println!("  Session:   {session_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' to quit. Ctrl+C stops the current answer.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        if let Err(e) = ask(&orchestrator, &session_id, line.to_string()).await {
            eprintln!("  [Error] {e}");
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// Run one message, streaming the answer to the terminal.
async fn ask(
    orchestrator: &Orchestrator,
    session_id: &SessionId,
    message: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let on_ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    println!();
    let result = orchestrator
        .execute(
            RunRequest::new(session_id.clone(), message),
            Arc::new(ConsoleSink::default()),
            cancel,
        )
        .await;
    on_ctrl_c.abort();
    let outcome = result?;
    println!();

    match outcome.status {
        RunStatus::Completed => {}
        RunStatus::IterationLimit => eprintln!("  [Stopped after {} model turns]", outcome.iterations),
        RunStatus::Cancelled => eprintln!("  [Cancelled]"),
    }

    if let Some(text) = outcome.final_text() {
        print_references(text);
    }
    Ok(())
}

fn print_references(text: &str) {
    let mut references = parse_references(text);
    if references.is_empty() {
        references = parse_citations(text);
    }
    if references.is_empty() {
        return;
    }

    println!();
    println!("  References:");
    for r in references {
        println!("    - [{}] {} ({})", r.reference_type, r.title, r.artifact_id);
    }
}

/// Prints run events to the terminal as they arrive.
#[derive(Default)]
struct ConsoleSink {
    reply: Mutex<ReplyBuffer>,
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: AgentEvent) {
        match event {
            AgentEvent::TextMessage { message_id, content } => {
                let shown = self
                    .reply
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(&message_id, &content);
                if !shown.is_empty() {
                    print!("{shown}");
                    let _ = std::io::stdout().flush();
                }
            }
            AgentEvent::ToolCallStart { tool_name, attributes, .. } => {
                let about = attributes
                    .get("title")
                    .or_else(|| attributes.get("tag"))
                    .and_then(|v| v.as_str())
                    .map(|s| format!(" ({s})"))
                    .unwrap_or_default();
                eprintln!("\n  [tool] {tool_name}{about} ...");
            }
            AgentEvent::ToolCallEnd { tool_name, .. } => {
                eprintln!("  [tool] {tool_name} done");
            }
            AgentEvent::ArtifactContentStart { title, .. } => {
                eprintln!("  [artifact] writing {title} ...");
            }
            AgentEvent::ArtifactListUpdated {
                artifact_id,
                title,
                artifact_type,
                ..
            } => {
                eprintln!("  [artifact] {title} ({artifact_type}, {artifact_id})");
            }
            AgentEvent::RunStarted
            | AgentEvent::RunFinished
            | AgentEvent::ArtifactContentChunk { .. }
            | AgentEvent::ArtifactContentComplete { .. } => {}
        }
    }
}

const OPEN_WRAPPER: &str = "<references>";

/// The text of the message being streamed, and how much of it is on screen.
#[derive(Debug, Default)]
struct ReplyBuffer {
    message_id: String,
    text: String,
    printed: usize,
}

impl ReplyBuffer {
    /// Append a fragment and return the part that has become printable.
    fn push(&mut self, message_id: &str, fragment: &str) -> String {
        if self.message_id != message_id {
            *self = Self {
                message_id: message_id.to_string(),
                ..Self::default()
            };
        }
        self.text.push_str(fragment);

        let shown = displayable(&self.text);
        let fresh = shown.get(self.printed..).unwrap_or_default().to_string();
        self.printed = self.printed.max(shown.len());
        fresh
    }
}

/// The reply without its references block, holding back a possibly
/// incomplete opening tag.
fn displayable(text: &str) -> String {
    let mut cleaned = clean_references(text);
    if let Some(pos) = cleaned.rfind('<')
        && OPEN_WRAPPER.starts_with(&cleaned[pos..])
    {
        cleaned.truncate(pos);
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(fragments: &[&str]) -> String {
        let mut buffer = ReplyBuffer::default();
        fragments.iter().map(|f| buffer.push("m1", f)).collect()
    }

    #[test]
    fn plain_reply_streams_through() {
        assert_eq!(stream(&["动态", "规划", "。"]), "动态规划。");
    }

    #[test]
    fn references_block_is_never_printed() {
        let shown = stream(&[
            "先看课程。",
            "<refer",
            "ences><reference><type>course</type>",
            "<artifactId>14-dp</artifactId><title>DP</title></reference>",
            "</references>",
        ]);
        assert_eq!(shown, "先看课程。");
    }

    #[test]
    fn text_after_the_block_still_shows() {
        let shown = stream(&["a <references><reference></reference></references>", " b"]);
        assert_eq!(shown, "a  b");
    }

    #[test]
    fn lone_angle_bracket_is_released() {
        assert_eq!(stream(&["1 <", " 2"]), "1 < 2");
    }

    #[test]
    fn new_message_starts_fresh() {
        let mut buffer = ReplyBuffer::default();
        assert_eq!(buffer.push("m1", "first"), "first");
        assert_eq!(buffer.push("m2", "second"), "second");
    }
}
