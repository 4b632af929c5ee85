//! Scripted provider for orchestrator tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use lectern_core::delta::{Delta, ToolCallChunk};
use lectern_core::error::ProviderError;
use lectern_core::provider::{DeltaStream, Provider, ProviderRequest};
use tokio::sync::mpsc;

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum Turn {
    /// Text fragments, one delta each
    Text(Vec<String>),
    /// A single tool call, streamed as two fragments
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    /// The stream yields an error
    Failure,
    /// Text fragments, after which the stream stays open without finishing
    Stalled(Vec<String>),
}

impl Turn {
    pub fn text(fragments: &[&str]) -> Self {
        Self::Text(fragments.iter().map(|f| f.to_string()).collect())
    }

    pub fn tool_call(id: &str, name: &str, arguments: &str) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    pub fn failure() -> Self {
        Self::Failure
    }

    pub fn stalled(fragments: &[&str]) -> Self {
        Self::Stalled(fragments.iter().map(|f| f.to_string()).collect())
    }

    fn deltas(self) -> Vec<Result<Delta, ProviderError>> {
        match self {
            Self::Text(fragments) | Self::Stalled(fragments) => {
                fragments.into_iter().map(|f| Ok(Delta::text(f))).collect()
            }
            Self::ToolCall { id, name, arguments } => {
                let split = (0..=arguments.len() / 2)
                    .rev()
                    .find(|i| arguments.is_char_boundary(*i))
                    .unwrap_or(0);
                let (head, tail) = arguments.split_at(split);
                vec![
                    Ok(Delta::tool_chunk(
                        ToolCallChunk::new(0).id(id).name(name).arguments(head),
                    )),
                    Ok(Delta::tool_chunk(ToolCallChunk::new(0).arguments(tail))),
                ]
            }
            Self::Failure => vec![Err(ProviderError::StreamInterrupted("scripted failure".into()))],
        }
    }
}

/// Replays one [`Turn`] per `stream` call and records every request.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Turn>>,
    requests: Mutex<Vec<ProviderRequest>>,
    stalled: Mutex<Vec<mpsc::Sender<Result<Delta, ProviderError>>>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
            stalled: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<DeltaStream, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))?;

        let stall = matches!(turn, Turn::Stalled(_));
        let deltas = turn.deltas();
        let (tx, rx) = mpsc::channel(deltas.len().max(1));
        for delta in deltas {
            tx.send(delta).await.ok();
        }
        if stall {
            self.stalled.lock().unwrap().push(tx);
        }
        Ok(rx)
    }
}
