//! Telemetry events emitted during a render cycle.

use crate::analyzer::Complexity;
use crate::strategy::machine::ErrorInfo;
use crate::strategy::Strategy;
use serde::Serialize;

/// One step of a render cycle, delivered to `RenderConfig::on_event`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RenderEvent {
    #[serde(rename_all = "camelCase")]
    AttemptStarted {
        strategy: Strategy,
        attempt_number: u32,
        complexity: Complexity,
    },
    #[serde(rename_all = "camelCase")]
    AttemptFailed {
        strategy: Strategy,
        attempt_number: u32,
        error: ErrorInfo,
    },
    Degraded { from: Strategy, to: Strategy },
    #[serde(rename_all = "camelCase")]
    Completed {
        strategy: Strategy,
        attempts: usize,
        render_time_ms: f64,
    },
    Fallback { attempts: usize },
}

impl RenderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RenderEvent::AttemptStarted { .. } => "attempt-started",
            RenderEvent::AttemptFailed { .. } => "attempt-failed",
            RenderEvent::Degraded { .. } => "degraded",
            RenderEvent::Completed { .. } => "completed",
            RenderEvent::Fallback { .. } => "fallback",
        }
    }
}
