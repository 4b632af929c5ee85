//! The run loop: `START → REASON ⇄ ACT → END`.
//!
//! One run answers one user message. `REASON` streams a model turn, emitting
//! text fragments as they arrive, then merges the turn into an assistant
//! message and materializes the artifacts it references. `ACT` executes the
//! tool calls of that message through the [`ToolCallInterceptor`]. The loop
//! alternates until a turn has no tool calls, the iteration cap is reached or
//! the run is cancelled.
//!
//! The session history is read once when the run starts and written once when
//! it ends. A failed run emits no `RUN_FINISHED` and writes nothing.

use std::sync::Arc;
use std::time::Duration;

use lectern_config::{AppConfig, CancelSave, ConfigError, SessionPolicy, ToolErrorMode};
use lectern_core::artifact::{Artifact, ArtifactRole, ArtifactStore, ArtifactType, CourseCatalog, NewArtifact};
use lectern_core::error::{Error, Result, StoreError};
use lectern_core::event::{AgentEvent, EventSink};
use lectern_core::message::{Message, Role, SessionId};
use lectern_core::provider::{Provider, ProviderRequest};
use lectern_core::session::SessionStore;
use lectern_core::tool::{ToolContext, ToolRegistry};
use lectern_memory::{FileCourseCatalog, InMemoryArtifactStore, InMemorySessionStore};
use lectern_providers::{ProviderRouter, build_from_config};
use lectern_tools::{ToolDeps, registry_for};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::guard::{RunPermit, SessionGuard};
use crate::interceptor::{AttributeResolver, RegistryDispatch, ToolCallInterceptor, ToolDispatch};
use crate::limits::RunWatchdog;
use crate::merge::ChunkMerger;
use crate::prompt;
use crate::reference::{Reference, ReferenceType, parse_references};

/// Run states. `End` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    Reason,
    Act,
    End,
}

/// What the step that just ran reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Started,
    Reasoned { tool_calls: bool },
    Acted { budget_left: bool },
    Cancelled,
}

/// The state machine of a run.
pub fn transition(state: RunState, signal: Signal) -> Result<RunState> {
    match (state, signal) {
        (RunState::Start, Signal::Started) => Ok(RunState::Reason),
        (RunState::Reason, Signal::Reasoned { tool_calls: true }) => Ok(RunState::Act),
        (RunState::Reason, Signal::Reasoned { tool_calls: false }) => Ok(RunState::End),
        (RunState::Act, Signal::Acted { budget_left: true }) => Ok(RunState::Reason),
        (RunState::Act, Signal::Acted { budget_left: false }) => Ok(RunState::End),
        (RunState::Start | RunState::Reason | RunState::Act, Signal::Cancelled) => Ok(RunState::End),
        (state, signal) => Err(Error::Internal(format!(
            "no transition from {state:?} on {signal:?}"
        ))),
    }
}

/// Collaborators shared by every run, built once per process.
#[derive(Clone)]
pub struct AgentContext {
    /// Used when a model key does not name another provider
    pub provider: Arc<dyn Provider>,
    pub router: Option<Arc<ProviderRouter>>,
    pub tools: Arc<ToolRegistry>,
    pub sessions: Arc<dyn SessionStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub courses: Arc<dyn CourseCatalog>,
}

/// Per-process run settings, usually taken from the `[agent]` config section.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Maximum `REASON` entries per run
    pub max_iterations: usize,
    pub tool_error_mode: ToolErrorMode,
    pub session_policy: SessionPolicy,
    pub cancel_save: CancelSave,
    pub system_prompt: String,
    pub run_timeout: Option<Duration>,
    pub tool_timeout: Option<Duration>,
}

impl RunSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            max_iterations: 25,
            tool_error_mode: ToolErrorMode::default(),
            session_policy: SessionPolicy::default(),
            cancel_save: CancelSave::default(),
            system_prompt: prompt::default_system_prompt(Default::default()).to_string(),
            run_timeout: None,
            tool_timeout: None,
        }
    }

    /// Read settings from config. Unknown mode strings are an error here.
    pub fn from_config(config: &AppConfig) -> std::result::Result<Self, ConfigError> {
        let agent = &config.agent;
        let toolset = agent.toolset()?;
        Ok(Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            max_iterations: agent.max_iterations,
            tool_error_mode: agent.tool_error_mode()?,
            session_policy: agent.session_policy()?,
            cancel_save: agent.cancel_save()?,
            system_prompt: prompt::system_prompt(agent.system_prompt.as_deref(), toolset),
            run_timeout: agent.run_timeout(),
            tool_timeout: agent.tool_timeout(),
        })
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tool_error_mode(mut self, mode: ToolErrorMode) -> Self {
        self.tool_error_mode = mode;
        self
    }

    pub fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.session_policy = policy;
        self
    }

    pub fn with_cancel_save(mut self, cancel_save: CancelSave) -> Self {
        self.cancel_save = cancel_save;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_run_timeout(mut self, limit: Option<Duration>) -> Self {
        self.run_timeout = limit;
        self
    }

    pub fn with_tool_timeout(mut self, limit: Option<Duration>) -> Self {
        self.tool_timeout = limit;
        self
    }
}

/// One user message for one session.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub session_id: SessionId,
    pub message: String,
    /// Model key overriding the configured model, e.g. `"deepseek/deepseek-chat"`
    pub model: Option<String>,
}

impl RunRequest {
    pub fn new(session_id: impl Into<SessionId>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The last model turn had no tool calls
    Completed,
    /// The iteration cap stopped the loop
    IterationLimit,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub session_id: SessionId,
    pub status: RunStatus,
    /// Number of `REASON` entries
    pub iterations: usize,
    /// The run's history as it stood at `END`
    pub messages: Vec<Message>,
    /// Whether the history was written back to the session store
    pub saved: bool,
}

impl RunOutcome {
    /// Content of the last assistant message.
    pub fn final_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}

/// Drives runs. Cheap to share behind an `Arc`.
pub struct Orchestrator {
    ctx: AgentContext,
    settings: RunSettings,
    guard: SessionGuard,
    dispatch: ToolCallInterceptor<RegistryDispatch>,
}

impl Orchestrator {
    pub fn new(ctx: AgentContext, settings: RunSettings) -> Self {
        let dispatch = ToolCallInterceptor::new(
            RegistryDispatch::new(ctx.tools.clone())
                .with_error_mode(settings.tool_error_mode)
                .with_tool_timeout(settings.tool_timeout),
            AttributeResolver::new(ctx.artifacts.clone(), ctx.courses.clone()),
        );
        Self {
            guard: SessionGuard::new(settings.session_policy),
            ctx,
            settings,
            dispatch,
        }
    }

    /// Wire up providers, stores and the configured toolset.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let settings = RunSettings::from_config(config).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        let toolset = config.agent.toolset().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let router = Arc::new(build_from_config(config));
        let (provider, model) = router.resolve(&config.default_model).ok_or_else(|| Error::Config {
            message: format!("provider '{}' is not configured", config.default_provider),
        })?;

        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let artifacts: Arc<dyn ArtifactStore> = Arc::new(InMemoryArtifactStore::new());
        let courses: Arc<dyn CourseCatalog> = Arc::new(FileCourseCatalog::new(config.courses.data_dir.clone()));
        let tools = registry_for(
            toolset,
            ToolDeps {
                courses: courses.clone(),
                artifacts: artifacts.clone(),
                provider: provider.clone(),
                model,
            },
        );
        info!(
            provider = %config.default_provider,
            model = %config.default_model,
            tools = tools.len(),
            "Agent ready"
        );

        let ctx = AgentContext {
            provider,
            router: Some(router),
            tools: Arc::new(tools),
            sessions,
            artifacts,
            courses,
        };
        Ok(Self::new(ctx, settings))
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Claim a session for a run, applying the session policy.
    pub async fn begin(&self, session_id: &SessionId) -> Result<RunPermit> {
        self.guard.acquire(session_id).await
    }

    /// Claim the session, then run.
    pub async fn execute(
        &self,
        request: RunRequest,
        events: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        let permit = self.begin(&request.session_id).await?;
        self.run(permit, request, events, cancel).await
    }

    /// Run one request on a claimed session.
    pub async fn run(
        &self,
        permit: RunPermit,
        request: RunRequest,
        events: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        if permit.session_id() != &request.session_id {
            return Err(Error::Internal(format!(
                "permit for session {} used for session {}",
                permit.session_id(),
                request.session_id
            )));
        }
        let session_id = request.session_id.clone();
        let result = self.drive(request, events, cancel).await;
        match &result {
            Ok(outcome) => info!(
                session_id = %session_id,
                status = ?outcome.status,
                iterations = outcome.iterations,
                saved = outcome.saved,
                "Run finished"
            ),
            Err(e) => warn!(session_id = %session_id, error = %e, "Run failed"),
        }
        drop(permit);
        result
    }

    fn resolve_model(&self, model_key: Option<&str>) -> (Arc<dyn Provider>, String) {
        let key = model_key.unwrap_or(&self.settings.model);
        self.ctx
            .router
            .as_ref()
            .and_then(|router| router.resolve(key))
            .unwrap_or_else(|| (self.ctx.provider.clone(), key.to_string()))
    }

    async fn drive(
        &self,
        request: RunRequest,
        events: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        let _watchdog = RunWatchdog::arm(self.settings.run_timeout, &cancel);
        let (provider, model) = match &request.model {
            Some(key) => self.resolve_model(Some(key)),
            None => (self.ctx.provider.clone(), self.settings.model.clone()),
        };
        let session_id = request.session_id;

        let (session, created) = self.ctx.sessions.get_or_create(&session_id).await?;
        let mut history = session.messages;
        // A session whose first run failed or was discarded is stored empty.
        if !history.iter().any(|m| m.role == Role::System) {
            history.push(Message::system(&self.settings.system_prompt));
        }
        history.push(Message::user(request.message));
        info!(session_id = %session_id, model = %model, new_session = created, "Run started");

        let tool_ctx = ToolContext::new(session_id.clone(), events.clone(), cancel.clone());
        let mut state = RunState::Start;
        let mut status = RunStatus::Completed;
        let mut iterations = 0;

        while state != RunState::End {
            let signal = match state {
                RunState::Start => {
                    events.emit(AgentEvent::RunStarted);
                    Signal::Started
                }
                RunState::Reason => {
                    iterations += 1;
                    debug!(session_id = %session_id, iteration = iterations, "Reasoning");
                    match self
                        .reason(provider.as_ref(), &model, &mut history, events.as_ref(), &cancel)
                        .await
                    {
                        Ok(tool_calls) => Signal::Reasoned { tool_calls },
                        Err(e) if e.is_cancelled() => Signal::Cancelled,
                        Err(e) => return Err(e),
                    }
                }
                RunState::Act => {
                    let calls = history
                        .last()
                        .map(|m| m.tool_calls.clone())
                        .unwrap_or_default();
                    match self.dispatch.dispatch(&calls, &tool_ctx).await {
                        Ok(responses) => {
                            history.extend(responses);
                            let budget_left = iterations < self.settings.max_iterations;
                            if !budget_left {
                                warn!(
                                    session_id = %session_id,
                                    max_iterations = self.settings.max_iterations,
                                    "Iteration cap reached, ending run"
                                );
                                status = RunStatus::IterationLimit;
                            }
                            Signal::Acted { budget_left }
                        }
                        Err(e) if e.is_cancelled() => Signal::Cancelled,
                        Err(e) => return Err(e),
                    }
                }
                RunState::End => break,
            };

            if signal == Signal::Cancelled {
                info!(session_id = %session_id, state = ?state, "Run cancelled");
                status = RunStatus::Cancelled;
            }
            let next = transition(state, signal)?;
            debug!(from = ?state, to = ?next, "State transition");
            state = next;
        }

        events.emit(AgentEvent::RunFinished);

        let saved = match (status, self.settings.cancel_save) {
            (RunStatus::Cancelled, CancelSave::Discard) => false,
            (RunStatus::Cancelled, CancelSave::Partial) => {
                drop_unanswered_tool_calls(&mut history);
                true
            }
            _ => true,
        };
        if saved {
            self.ctx
                .sessions
                .set_messages(&session_id, history.clone())
                .await?;
        }

        Ok(RunOutcome {
            session_id,
            status,
            iterations,
            messages: history,
            saved,
        })
    }

    /// Stream one model turn into `history`. Returns whether it asked for tools.
    async fn reason(
        &self,
        provider: &dyn Provider,
        model: &str,
        history: &mut Vec<Message>,
        events: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let message_id = short_id();
        let mut request = ProviderRequest::new(model, history.clone());
        request.temperature = self.settings.temperature;
        request.max_tokens = self.settings.max_tokens;
        request.tools = self.ctx.tools.definitions();

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            stream = provider.stream(request) => stream?,
        };

        let mut merger = ChunkMerger::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = stream.recv() => next,
            };
            let Some(delta) = next else { break };
            let delta = delta?;
            if !delta.content.is_empty() {
                events.emit(AgentEvent::TextMessage {
                    message_id: message_id.clone(),
                    content: delta.content.clone(),
                });
            }
            merger.push(delta);
        }

        let message = merger.finish(message_id);
        for reference in parse_references(&message.content) {
            self.materialize(&reference, events).await;
        }

        let tool_calls = message.has_tool_calls();
        history.push(message);
        Ok(tool_calls)
    }

    /// Make a referenced artifact available and announce it.
    async fn materialize(&self, reference: &Reference, events: &dyn EventSink) {
        let artifact = match reference.reference_type {
            ReferenceType::Course => self.materialize_course(reference).await,
            ReferenceType::MindMap | ReferenceType::SolutionCode => {
                self.ctx.artifacts.get(&reference.artifact_id).await
            }
        };
        match artifact {
            Ok(Some(artifact)) => events.emit(AgentEvent::ArtifactListUpdated {
                artifact_id: artifact.id,
                title: artifact.title,
                artifact_type: artifact.artifact_type,
                role: artifact.role,
            }),
            Ok(None) => warn!(
                artifact_id = %reference.artifact_id,
                reference_type = %reference.reference_type,
                "Referenced artifact not found, skipping"
            ),
            Err(e) => warn!(
                artifact_id = %reference.artifact_id,
                error = %e,
                "Could not materialize reference, skipping"
            ),
        }
    }

    async fn materialize_course(&self, reference: &Reference) -> std::result::Result<Option<Artifact>, StoreError> {
        let Some(course) = self.ctx.courses.get_course(&reference.artifact_id).await? else {
            return Ok(None);
        };
        let content = match self.ctx.courses.read_content(&course.artifact_id).await {
            Ok(content) => content,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let title = if course.title.is_empty() {
            reference.title.clone()
        } else {
            course.title
        };
        self.ctx
            .artifacts
            .create_with_id(
                &course.artifact_id,
                NewArtifact::new(title, ArtifactType::Course, ArtifactRole::Assistant, content),
            )
            .await
            .map(Some)
    }
}

/// An 8-character message id.
fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// A cancelled `ACT` leaves an assistant message whose tool calls have no
/// responses. Providers reject such a history, so it is not kept.
fn drop_unanswered_tool_calls(history: &mut Vec<Message>) {
    if history
        .last()
        .is_some_and(|m| m.role == Role::Assistant && m.has_tool_calls())
    {
        history.pop();
    }
}
