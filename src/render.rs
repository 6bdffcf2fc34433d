//! Render orchestration.
//!
//! A [`DisplayInstance`] owns one piece of content and drives it through
//! analysis, sanitizing, and the degradation cycle. Hosts with synchronous
//! backends call [`DisplayInstance::render`]; hosts that render elsewhere use
//! the ticket API ([`DisplayInstance::begin`] / [`DisplayInstance::complete`])
//! or [`DisplayInstance::render_async`].
//!
//! Every ticket carries the instance generation. Changing content or config,
//! retrying, or cancelling bumps the generation, so a late completion is
//! dropped without touching output, metrics, or callbacks.

use crate::analyzer::{analyze, Complexity, ContentAnalysis};
use crate::backend::markup::escape_html;
use crate::backend::BackendTable;
use crate::config::RenderConfig;
use crate::error::{panic_message, RenderError};
use crate::events::RenderEvent;
use crate::metrics::{self, MetricEvent, MetricsCollector};
use crate::sanitize::sanitize_with_hook;
use crate::strategy::machine::{
    AttemptRequest, ErrorInfo, RenderAttempt, RenderCycle, RenderState, Transition,
};
use crate::strategy::{initial_strategy, Strategy};
use serde::Serialize;
use std::future::{poll_fn, Future};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::task::Poll;

/// Result of a finished render cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutcome {
    /// Rendered HTML from a backend, or the placeholder for empty content.
    ///
    /// When `final_strategy` is [`Strategy::ErrorFallback`] this is the raw
    /// content as given, not escaped HTML; with `debug` on it is followed by
    /// an HTML diagnostics block. Escape it before inserting it as markup.
    pub output: String,
    pub final_strategy: Strategy,
    pub attempts: Vec<RenderAttempt>,
    pub analysis: ContentAnalysis,
}

impl RenderOutcome {
    /// Errors of the failed attempts, in order.
    pub fn errors(&self) -> impl Iterator<Item = &ErrorInfo> {
        self.attempts.iter().filter_map(|a| a.error_info.as_ref())
    }

    /// True when every attempt failed and the raw content is shown.
    pub fn is_fallback(&self) -> bool {
        self.final_strategy == Strategy::ErrorFallback
    }
}

/// An attempt handed out to a host, valid for one instance generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptTicket {
    generation: u64,
    request: AttemptRequest,
}

impl AttemptTicket {
    pub fn request(&self) -> &AttemptRequest {
        &self.request
    }

    pub fn strategy(&self) -> Strategy {
        self.request.strategy
    }

    pub fn content(&self) -> &str {
        &self.request.content
    }
}

/// What a host should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Render this attempt and hand the result to `complete`.
    Next(AttemptTicket),
    /// The cycle is finished.
    Done(RenderOutcome),
    /// The ticket belonged to an earlier generation and was ignored.
    Stale,
}

/// Shared render service: backends, metrics sink, and configuration.
#[derive(Debug, Clone)]
pub struct Renderer {
    backends: Arc<BackendTable>,
    metrics: Arc<MetricsCollector>,
    config: RenderConfig,
}

impl Renderer {
    /// Built-in backends reporting to the process-wide metrics.
    pub fn new(config: RenderConfig) -> Self {
        Self {
            backends: Arc::new(BackendTable::builtin()),
            metrics: metrics::global(),
            config,
        }
    }

    pub fn with_backends(mut self, backends: BackendTable) -> Self {
        self.backends = Arc::new(backends);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Create a display instance for `content`.
    pub fn instance(&self, content: impl Into<String>) -> DisplayInstance {
        DisplayInstance {
            content: content.into(),
            config: self.config.clone(),
            backends: Arc::clone(&self.backends),
            metrics: Arc::clone(&self.metrics),
            analysis: None,
            sanitized: None,
            cycle: None,
            generation: 0,
        }
    }

    /// Render `content` once with the configured backends.
    pub fn render(&self, content: &str) -> RenderOutcome {
        self.instance(content).render()
    }
}

/// Render `content` with the built-in backends and process-wide metrics.
pub fn render(content: &str, config: &RenderConfig) -> RenderOutcome {
    Renderer::new(config.clone()).render(content)
}

/// One piece of content and its render state.
pub struct DisplayInstance {
    content: String,
    config: RenderConfig,
    backends: Arc<BackendTable>,
    metrics: Arc<MetricsCollector>,
    analysis: Option<ContentAnalysis>,
    sanitized: Option<String>,
    cycle: Option<RenderCycle>,
    generation: u64,
}

impl DisplayInstance {
    /// Instance with the built-in backends and process-wide metrics.
    pub fn new(content: impl Into<String>, config: RenderConfig) -> Self {
        Renderer::new(config).instance(content)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current cycle state, if a cycle has started.
    pub fn state(&self) -> Option<&RenderState> {
        self.cycle.as_ref().map(RenderCycle::state)
    }

    /// Memoized analysis of the current content.
    pub fn analysis(&mut self) -> &ContentAnalysis {
        let content = &self.content;
        self.analysis.get_or_insert_with(|| analyze(content))
    }

    /// Memoized sanitized content.
    pub fn sanitized(&mut self) -> &str {
        if self.sanitized.is_none() {
            let analysis = self.analysis().clone();
            let repaired = sanitize_with_hook(
                &self.content,
                Some(&analysis),
                self.config.sanitizer_hook.as_ref(),
            );
            tracing::debug!(
                before = self.content.len(),
                after = repaired.len(),
                "content sanitized"
            );
            self.sanitized = Some(repaired);
        }
        self.sanitized.as_deref().unwrap_or_default()
    }

    /// Replace the content. Unchanged content keeps the current state.
    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        if content == self.content {
            return;
        }
        self.content = content;
        self.analysis = None;
        self.sanitized = None;
        self.invalidate();
    }

    pub fn set_config(&mut self, config: RenderConfig) {
        self.config = config;
        self.analysis = None;
        self.sanitized = None;
        self.invalidate();
    }

    /// Start over from the initial strategy.
    pub fn retry(&mut self) {
        self.invalidate();
    }

    /// Abandon the current cycle; outstanding tickets become stale.
    pub fn cancel(&mut self) {
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.cycle = None;
        self.generation += 1;
    }

    /// Hand out the next attempt, or the finished outcome.
    pub fn begin(&mut self) -> Progress {
        if self.content.trim().is_empty() {
            return Progress::Done(self.placeholder());
        }

        if self.cycle.is_none() {
            let sanitized = self.sanitized().to_string();
            let analysis = self.analysis().clone();
            let initial = initial_strategy(self.config.mode, Some(&analysis));
            tracing::debug!(
                strategy = %initial,
                complexity = ?analysis.complexity,
                "starting render cycle"
            );
            self.cycle = Some(RenderCycle::new(
                self.content.clone(),
                sanitized,
                initial,
                self.config.cycle_options(),
            ));
        }

        self.next_ticket()
    }

    /// Feed the result of a ticket rendered by the host.
    pub fn complete(
        &mut self,
        ticket: AttemptTicket,
        result: Result<String, RenderError>,
    ) -> Progress {
        self.finish_attempt(ticket, result, "external")
    }

    /// Drive the cycle to completion with the instance's backends.
    pub fn render(&mut self) -> RenderOutcome {
        let backends = Arc::clone(&self.backends);
        self.render_with(&backends)
    }

    /// Drive the cycle to completion with `backends`.
    pub fn render_with(&mut self, backends: &BackendTable) -> RenderOutcome {
        let mut progress = self.begin();
        loop {
            match progress {
                Progress::Next(ticket) => {
                    let strategy = ticket.strategy();
                    let result = backends.render(strategy, ticket.content(), &self.config.plugin);
                    let provider = backends
                        .get(strategy)
                        .map_or_else(|| "none".to_string(), |b| b.name().to_string());
                    progress = self.finish_attempt(ticket, result, &provider);
                }
                Progress::Done(outcome) => return outcome,
                Progress::Stale => return self.raw_outcome(),
            }
        }
    }

    /// Drive the cycle with an asynchronous backend, one `.await` per attempt.
    ///
    /// A panic while creating or polling an attempt's future counts as a
    /// failed attempt.
    pub async fn render_async<F, Fut>(&mut self, mut render_once: F) -> RenderOutcome
    where
        F: FnMut(AttemptRequest) -> Fut,
        Fut: Future<Output = Result<String, RenderError>>,
    {
        let mut progress = self.begin();
        loop {
            match progress {
                Progress::Next(ticket) => {
                    let request = ticket.request().clone();
                    let result =
                        match panic::catch_unwind(AssertUnwindSafe(|| render_once(request))) {
                            Ok(future) => {
                                let mut future = Box::pin(future);
                                poll_fn(|cx| {
                                    match panic::catch_unwind(AssertUnwindSafe(|| {
                                        future.as_mut().poll(cx)
                                    })) {
                                        Ok(poll) => poll,
                                        Err(payload) => Poll::Ready(Err(RenderError::Panicked(
                                            panic_message(payload.as_ref()),
                                        ))),
                                    }
                                })
                                .await
                            }
                            Err(payload) => {
                                Err(RenderError::Panicked(panic_message(payload.as_ref())))
                            }
                        };
                    progress = self.finish_attempt(ticket, result, "async");
                }
                Progress::Done(outcome) => return outcome,
                Progress::Stale => return self.raw_outcome(),
            }
        }
    }

    fn complexity(&self) -> Complexity {
        self.analysis
            .as_ref()
            .map_or(Complexity::Simple, |a| a.complexity)
    }

    fn next_ticket(&mut self) -> Progress {
        if self.cycle.is_none() {
            return Progress::Done(self.raw_outcome());
        }
        match self.cycle.as_mut().and_then(RenderCycle::next_attempt) {
            Some(request) => {
                let complexity = self.complexity();
                self.emit(&RenderEvent::AttemptStarted {
                    strategy: request.strategy,
                    attempt_number: request.attempt_number,
                    complexity,
                });
                Progress::Next(AttemptTicket {
                    generation: self.generation,
                    request,
                })
            }
            None => Progress::Done(self.outcome()),
        }
    }

    fn finish_attempt(
        &mut self,
        ticket: AttemptTicket,
        result: Result<String, RenderError>,
        provider: &str,
    ) -> Progress {
        if ticket.generation != self.generation {
            tracing::trace!(
                ticket = ticket.generation,
                current = self.generation,
                "stale render completion ignored"
            );
            return Progress::Stale;
        }
        let Some(cycle) = self.cycle.as_mut() else {
            return Progress::Stale;
        };

        let transition = cycle.resolve(result);
        let Some(attempt) = cycle.state().attempts.last().cloned() else {
            return Progress::Done(self.outcome());
        };
        let complexity = self.complexity();

        match transition {
            Transition::Completed => {
                self.metrics.record(MetricEvent::Render {
                    strategy: attempt.strategy,
                    complexity,
                    provider: provider.to_string(),
                    render_time_ms: attempt.render_time_ms,
                });
                notify(self.config.on_complete.as_ref(), &attempt);
                self.emit(&RenderEvent::Completed {
                    strategy: attempt.strategy,
                    attempts: attempt.attempt_number as usize,
                    render_time_ms: attempt.render_time_ms,
                });
                Progress::Done(self.outcome())
            }
            Transition::Retry { from, to } => {
                self.record_failure(&attempt, provider);
                tracing::debug!(
                    %from,
                    %to,
                    attempt = attempt.attempt_number,
                    "degrading render strategy"
                );
                self.emit(&RenderEvent::Degraded { from, to });
                self.next_ticket()
            }
            Transition::Fallback => {
                self.record_failure(&attempt, provider);
                self.metrics.record(MetricEvent::Fallback { complexity });
                tracing::warn!(
                    attempts = attempt.attempt_number,
                    "all render strategies failed; showing raw content"
                );
                self.emit(&RenderEvent::Fallback {
                    attempts: attempt.attempt_number as usize,
                });
                Progress::Done(self.outcome())
            }
            Transition::Ignored => Progress::Done(self.outcome()),
        }
    }

    fn record_failure(&self, attempt: &RenderAttempt, provider: &str) {
        let error = attempt.error_info.clone().unwrap_or_else(|| ErrorInfo {
            kind: "unknown".to_string(),
            message: String::new(),
        });
        tracing::debug!(
            strategy = %attempt.strategy,
            attempt = attempt.attempt_number,
            kind = %error.kind,
            error = %error.message,
            "render attempt failed"
        );
        self.metrics.record(MetricEvent::Error {
            strategy: attempt.strategy,
            provider: provider.to_string(),
            error_kind: error.kind.clone(),
        });
        notify(self.config.on_error.as_ref(), attempt);
        self.emit(&RenderEvent::AttemptFailed {
            strategy: attempt.strategy,
            attempt_number: attempt.attempt_number,
            error,
        });
    }

    fn emit(&self, event: &RenderEvent) {
        notify(self.config.on_event.as_ref(), event);
    }

    fn analysis_or_default(&self) -> ContentAnalysis {
        self.analysis
            .clone()
            .unwrap_or_else(|| analyze(&self.content))
    }

    fn outcome(&self) -> RenderOutcome {
        match self.cycle.as_ref().map(RenderCycle::state) {
            Some(state) => RenderOutcome {
                output: state
                    .final_output
                    .clone()
                    .unwrap_or_else(|| self.content.clone()),
                final_strategy: state.current_strategy,
                attempts: state.attempts.clone(),
                analysis: self.analysis_or_default(),
            },
            None => self.raw_outcome(),
        }
    }

    fn raw_outcome(&self) -> RenderOutcome {
        RenderOutcome {
            output: self.content.clone(),
            final_strategy: Strategy::ErrorFallback,
            attempts: Vec::new(),
            analysis: self.analysis_or_default(),
        }
    }

    fn placeholder(&self) -> RenderOutcome {
        RenderOutcome {
            output: format!(
                "<div class=\"{p}-content {p}-placeholder\">{}</div>",
                escape_html(&self.config.placeholder),
                p = self.config.plugin.class_prefix
            ),
            final_strategy: Strategy::Plaintext,
            attempts: Vec::new(),
            analysis: ContentAnalysis::empty(),
        }
    }
}

/// Invoke a caller callback, containing any panic.
fn notify<T: ?Sized>(callback: Option<&Arc<dyn Fn(&T) + Send + Sync>>, value: &T) {
    if let Some(callback) = callback {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(value))) {
            tracing::warn!(error = %panic_message(payload.as_ref()), "render callback panicked");
        }
    }
}
