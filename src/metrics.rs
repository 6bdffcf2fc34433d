//! Process-wide render metrics.
//!
//! Counters are atomics and histograms sit behind one mutex, so recording is
//! safe from any number of threads. Nothing is persisted and nothing resets
//! implicitly; [`MetricsCollector::reset`] exists for hosts and tests.

use crate::analyzer::Complexity;
use crate::strategy::Strategy;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Outcomes kept for trend analysis.
pub const RECENT_CAPACITY: usize = 1000;
/// Percentage points a window may differ from all-time and still be stable.
pub const TREND_TOLERANCE: f64 = 5.0;

lazy_static! {
    static ref GLOBAL: Arc<MetricsCollector> = Arc::new(MetricsCollector::new());
}

/// The process-wide collector.
pub fn global() -> Arc<MetricsCollector> {
    Arc::clone(&GLOBAL)
}

/// Create the process-wide collector now rather than on first use.
pub fn init() -> Arc<MetricsCollector> {
    global()
}

/// Something worth counting.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    /// A successful attempt.
    Render {
        strategy: Strategy,
        complexity: Complexity,
        provider: String,
        render_time_ms: f64,
    },
    /// A failed attempt.
    Error {
        strategy: Strategy,
        provider: String,
        error_kind: String,
    },
    /// A cycle that ended in raw-content fallback.
    Fallback { complexity: Complexity },
}

#[derive(Debug, Default)]
struct Histograms {
    strategy: BTreeMap<String, u64>,
    complexity: BTreeMap<String, u64>,
    provider: BTreeMap<String, u64>,
    error_kind: BTreeMap<String, u64>,
    recent: VecDeque<bool>,
}

impl Histograms {
    fn push_outcome(&mut self, success: bool) {
        if self.recent.len() == RECENT_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(success);
    }
}

fn bump(map: &mut BTreeMap<String, u64>, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}

fn complexity_key(complexity: Complexity) -> &'static str {
    match complexity {
        Complexity::None => "none",
        Complexity::Simple => "simple",
        Complexity::Moderate => "moderate",
        Complexity::Complex => "complex",
    }
}

/// Aggregated counts at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Successful attempts over all attempts, in percent.
    pub success_rate: f64,
    /// Mean milliseconds per successful attempt.
    pub average_render_time: f64,
    pub render_attempts: u64,
    pub render_errors: u64,
    pub fallbacks: u64,
    /// Attempts per strategy.
    pub strategy_usage: BTreeMap<String, u64>,
    /// Finished cycles per content complexity.
    pub complexity_distribution: BTreeMap<String, u64>,
    /// Attempts per backend provider.
    pub provider_usage: BTreeMap<String, u64>,
    pub error_kinds: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

/// Recent success rate against the all-time rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub recent_renders: usize,
    pub success_rate: f64,
    pub trend_direction: TrendDirection,
}

/// Thread-safe metrics accumulator.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    successes: AtomicU64,
    errors: AtomicU64,
    fallbacks: AtomicU64,
    render_time_us: AtomicU64,
    histograms: Mutex<Histograms>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: MetricEvent) {
        match event {
            MetricEvent::Render {
                strategy,
                complexity,
                provider,
                render_time_ms,
            } => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                let micros = (render_time_ms.max(0.0) * 1000.0).round() as u64;
                self.render_time_us.fetch_add(micros, Ordering::Relaxed);

                let mut h = self.histograms.lock();
                bump(&mut h.strategy, strategy.as_str());
                bump(&mut h.complexity, complexity_key(complexity));
                bump(&mut h.provider, &provider);
                h.push_outcome(true);
            }
            MetricEvent::Error {
                strategy,
                provider,
                error_kind,
            } => {
                self.errors.fetch_add(1, Ordering::Relaxed);

                let mut h = self.histograms.lock();
                bump(&mut h.strategy, strategy.as_str());
                bump(&mut h.provider, &provider);
                bump(&mut h.error_kind, &error_kind);
                h.push_outcome(false);
            }
            MetricEvent::Fallback { complexity } => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);

                let mut h = self.histograms.lock();
                bump(&mut h.complexity, complexity_key(complexity));
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let h = self.histograms.lock();
        let successes = self.successes.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let total = successes + errors;

        let success_rate = if total == 0 {
            0.0
        } else {
            successes as f64 / total as f64 * 100.0
        };
        let average_render_time = if successes == 0 {
            0.0
        } else {
            self.render_time_us.load(Ordering::Relaxed) as f64 / 1000.0 / successes as f64
        };

        MetricsSnapshot {
            success_rate,
            average_render_time,
            render_attempts: total,
            render_errors: errors,
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            strategy_usage: h.strategy.clone(),
            complexity_distribution: h.complexity.clone(),
            provider_usage: h.provider.clone(),
            error_kinds: h.error_kind.clone(),
        }
    }

    /// Compare the last `window` outcomes with the all-time success rate.
    pub fn trend(&self, window: usize) -> TrendSummary {
        let all_time = self.snapshot().success_rate;
        let h = self.histograms.lock();

        let recent_renders = window.min(h.recent.len());
        if recent_renders == 0 {
            return TrendSummary {
                recent_renders: 0,
                success_rate: 0.0,
                trend_direction: TrendDirection::Stable,
            };
        }

        let successes = h.recent.iter().rev().take(recent_renders).filter(|&&ok| ok).count();
        let success_rate = successes as f64 / recent_renders as f64 * 100.0;
        let delta = success_rate - all_time;
        let trend_direction = if delta > TREND_TOLERANCE {
            TrendDirection::Improving
        } else if delta < -TREND_TOLERANCE {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        };

        TrendSummary {
            recent_renders,
            success_rate,
            trend_direction,
        }
    }

    pub fn reset(&self) {
        let mut h = self.histograms.lock();
        *h = Histograms::default();
        self.successes.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.fallbacks.store(0, Ordering::Relaxed);
        self.render_time_us.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn success(ms: f64) -> MetricEvent {
        MetricEvent::Render {
            strategy: Strategy::Full,
            complexity: Complexity::Simple,
            provider: "full-html".to_string(),
            render_time_ms: ms,
        }
    }

    fn failure() -> MetricEvent {
        MetricEvent::Error {
            strategy: Strategy::Full,
            provider: "full-html".to_string(),
            error_kind: "math".to_string(),
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = MetricsCollector::new().snapshot();
        assert_eq!(snapshot.success_rate, 0.0);
        assert_eq!(snapshot.average_render_time, 0.0);
        assert_eq!(snapshot.render_attempts, 0);
    }

    #[test]
    fn test_success_rate_and_average() {
        let metrics = MetricsCollector::new();
        metrics.record(success(2.0));
        metrics.record(success(4.0));
        metrics.record(success(6.0));
        metrics.record(failure());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.success_rate, 75.0);
        assert_eq!(snapshot.average_render_time, 4.0);
        assert_eq!(snapshot.render_attempts, 4);
        assert_eq!(snapshot.render_errors, 1);
        assert_eq!(snapshot.strategy_usage.get("full"), Some(&4));
        assert_eq!(snapshot.provider_usage.get("full-html"), Some(&4));
        assert_eq!(snapshot.error_kinds.get("math"), Some(&1));
    }

    #[test]
    fn test_fallback_counts_complexity() {
        let metrics = MetricsCollector::new();
        metrics.record(MetricEvent::Fallback {
            complexity: Complexity::Complex,
        });
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fallbacks, 1);
        assert_eq!(snapshot.complexity_distribution.get("complex"), Some(&1));
        assert_eq!(snapshot.render_attempts, 0);
    }

    #[test]
    fn test_trend_directions() {
        let metrics = MetricsCollector::new();
        for _ in 0..10 {
            metrics.record(failure());
        }
        for _ in 0..10 {
            metrics.record(success(1.0));
        }

        let trend = metrics.trend(5);
        assert_eq!(trend.recent_renders, 5);
        assert_eq!(trend.success_rate, 100.0);
        assert_eq!(trend.trend_direction, TrendDirection::Improving);

        for _ in 0..10 {
            metrics.record(failure());
        }
        assert_eq!(metrics.trend(5).trend_direction, TrendDirection::Declining);
        assert_eq!(metrics.trend(1000).trend_direction, TrendDirection::Stable);
    }

    #[test]
    fn test_trend_without_data() {
        let trend = MetricsCollector::new().trend(10);
        assert_eq!(trend.recent_renders, 0);
        assert_eq!(trend.trend_direction, TrendDirection::Stable);
    }

    #[test]
    fn test_recent_ring_is_bounded() {
        let metrics = MetricsCollector::new();
        for _ in 0..(RECENT_CAPACITY + 50) {
            metrics.record(success(0.5));
        }
        assert_eq!(metrics.trend(usize::MAX).recent_renders, RECENT_CAPACITY);
    }

    #[test]
    fn test_reset() {
        let metrics = MetricsCollector::new();
        metrics.record(success(1.0));
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsCollector::new().snapshot());
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = serde_json::to_value(MetricsCollector::new().snapshot()).unwrap();
        assert!(json.get("successRate").is_some());
        assert!(json.get("averageRenderTime").is_some());
        assert!(json.get("strategyUsage").is_some());
    }
}
