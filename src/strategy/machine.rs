//! Progressive-degradation state machine for one render cycle.
//!
//! A [`RenderCycle`] hands out one [`AttemptRequest`] at a time and is fed
//! the backend's result through [`RenderCycle::resolve`]. Failures move the
//! cycle one strategy down until either an attempt succeeds, the retry budget
//! runs out, or there is no weaker strategy left, at which point the cycle
//! settles in [`Strategy::ErrorFallback`] and echoes the raw content.
//!
//! The cycle never calls a backend itself, so hosts with asynchronous
//! backends can suspend between `next_attempt` and `resolve`.

use super::{transform_for, Strategy};
use crate::error::RenderError;
use serde::Serialize;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Error details kept on a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

impl From<&RenderError> for ErrorInfo {
    fn from(error: &RenderError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// One pass of content through a backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderAttempt {
    pub strategy: Strategy,
    pub attempt_number: u32,
    /// Wall-clock start time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub success: bool,
    pub render_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
}

/// Progress of one render cycle.
///
/// `attempts.len()` never exceeds `max_retries + 1` and the strategies
/// across `attempts` never increase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderState {
    pub current_strategy: Strategy,
    pub attempts: Vec<RenderAttempt>,
    pub final_output: Option<String>,
    pub terminal: bool,
}

impl RenderState {
    fn new(strategy: Strategy) -> Self {
        Self {
            current_strategy: strategy,
            attempts: Vec::new(),
            final_output: None,
            terminal: false,
        }
    }

    /// Failed attempts, in order.
    pub fn errors(&self) -> impl Iterator<Item = &ErrorInfo> {
        self.attempts.iter().filter_map(|a| a.error_info.as_ref())
    }
}

/// What the backend should render next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRequest {
    pub content: String,
    pub strategy: Strategy,
    pub attempt_number: u32,
}

/// Outcome of feeding one result to the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The attempt succeeded; the cycle is done.
    Completed,
    /// The attempt failed and the next attempt runs at `to`.
    Retry { from: Strategy, to: Strategy },
    /// The attempt failed and no retry is allowed; raw content is shown.
    Fallback,
    /// The cycle was already terminal; nothing changed.
    Ignored,
}

/// Limits and presentation settings for a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOptions {
    pub max_retries: u32,
    pub transform_on_degrade: bool,
    /// Append a visible diagnostic block to fallback output.
    pub debug: bool,
    pub class_prefix: String,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
            transform_on_degrade: true,
            debug: false,
            class_prefix: "mg".to_string(),
        }
    }
}

/// State machine driving one content instance through degrading strategies.
#[derive(Debug, Clone)]
pub struct RenderCycle {
    raw: String,
    content: String,
    state: RenderState,
    options: CycleOptions,
    started: Option<(Instant, u64)>,
}

impl RenderCycle {
    /// Start a cycle for `raw` content, rendering `prepared` at `initial` first.
    pub fn new(
        raw: impl Into<String>,
        prepared: impl Into<String>,
        initial: Strategy,
        options: CycleOptions,
    ) -> Self {
        let initial = if initial.is_terminal() {
            Strategy::Plaintext
        } else {
            initial
        };

        Self {
            raw: raw.into(),
            content: prepared.into(),
            state: RenderState::new(initial),
            options,
            started: None,
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn into_state(self) -> RenderState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.terminal
    }

    /// Content the next attempt will receive.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Begin the next attempt, or `None` once the cycle is terminal.
    pub fn next_attempt(&mut self) -> Option<AttemptRequest> {
        if self.state.terminal {
            return None;
        }

        self.started = Some((Instant::now(), unix_millis()));

        Some(AttemptRequest {
            content: self.content.clone(),
            strategy: self.state.current_strategy,
            attempt_number: self.state.attempts.len() as u32 + 1,
        })
    }

    /// Feed the result of the attempt started by [`RenderCycle::next_attempt`].
    pub fn resolve(&mut self, result: Result<String, RenderError>) -> Transition {
        if self.state.terminal {
            return Transition::Ignored;
        }

        let (started, timestamp_ms) = self
            .started
            .take()
            .unwrap_or_else(|| (Instant::now(), unix_millis()));
        let render_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let strategy = self.state.current_strategy;
        let attempt_number = self.state.attempts.len() as u32 + 1;

        let result = match result {
            Ok(output) if output.trim().is_empty() => Err(RenderError::Backend(
                "backend produced empty output".to_string(),
            )),
            other => other,
        };

        match result {
            Ok(output) => {
                self.state.attempts.push(RenderAttempt {
                    strategy,
                    attempt_number,
                    timestamp_ms,
                    success: true,
                    render_time_ms,
                    error_info: None,
                });
                self.state.final_output = Some(output);
                self.state.terminal = true;
                Transition::Completed
            }
            Err(error) => {
                self.state.attempts.push(RenderAttempt {
                    strategy,
                    attempt_number,
                    timestamp_ms,
                    success: false,
                    render_time_ms,
                    error_info: Some(ErrorInfo::from(&error)),
                });

                let may_retry = self.state.attempts.len() as u32 <= self.options.max_retries;
                match strategy.degrade() {
                    Some(next) if may_retry => {
                        if self.options.transform_on_degrade {
                            self.content = transform_for(next, &self.content);
                        }
                        self.state.current_strategy = next;
                        Transition::Retry {
                            from: strategy,
                            to: next,
                        }
                    }
                    _ => {
                        self.state.current_strategy = Strategy::ErrorFallback;
                        self.state.final_output = Some(self.fallback_output());
                        self.state.terminal = true;
                        Transition::Fallback
                    }
                }
            }
        }
    }

    /// Drive the cycle to completion with a synchronous backend.
    pub fn run<F>(&mut self, mut render_once: F) -> &RenderState
    where
        F: FnMut(&AttemptRequest) -> Result<String, RenderError>,
    {
        while let Some(request) = self.next_attempt() {
            let result = render_once(&request);
            self.resolve(result);
        }
        &self.state
    }

    /// Raw content, plus the collected errors when debugging.
    fn fallback_output(&self) -> String {
        if !self.options.debug {
            return self.raw.clone();
        }

        let mut summary = format!(
            "Rendering failed after {} attempt(s); showing raw content.\n",
            self.state.attempts.len()
        );
        for attempt in &self.state.attempts {
            if let Some(error) = &attempt.error_info {
                summary.push_str(&format!(
                    "#{} {}: [{}] {}\n",
                    attempt.attempt_number, attempt.strategy, error.kind, error.message
                ));
            }
        }

        format!(
            "{}\n<pre class=\"{}-diagnostics\">{}</pre>",
            self.raw,
            self.options.class_prefix,
            escape_html(summary.trim_end())
        )
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
