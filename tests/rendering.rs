//! End-to-end render scenarios through the public API.

use mathguard::backend::BackendTable;
use mathguard::events::RenderEvent;
use mathguard::{
    analyze, sanitize, Complexity, ConfigError, DisplayInstance, MetricsCollector, Progress,
    RenderConfig, RenderError, RenderMode, Renderer, Strategy,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn hermetic(config: RenderConfig) -> (Renderer, Arc<MetricsCollector>) {
    let metrics = Arc::new(MetricsCollector::new());
    (Renderer::new(config).with_metrics(Arc::clone(&metrics)), metrics)
}

fn full_mode() -> RenderConfig {
    RenderConfig::builder().mode(RenderMode::Full).build().unwrap()
}

/// Fails above `Basic`, succeeds from `Basic` down.
fn basic_only() -> BackendTable {
    BackendTable::from_fn("scripted", |content, strategy, _| {
        if strategy > Strategy::Basic {
            Err(RenderError::Math(format!("cannot typeset at {}", strategy)))
        } else {
            Ok(format!("<p>{}</p>", content))
        }
    })
}

fn echo() -> BackendTable {
    BackendTable::from_fn("echo", |content, _, _| Ok(format!("<p>{}</p>", content)))
}

#[test]
fn test_sanitize_scenarios() {
    assert_eq!(sanitize("\\\\frac{1}{2}mv^2", None), "\\frac{1}{2}mv^2");
    assert_eq!(sanitize("text {unbalanced", None), "text {unbalanced}");

    let repaired = sanitize("$E=mc^2 and incomplete $formula", None);
    assert_eq!(repaired.matches('$').count() % 2, 0);
}

#[test]
fn test_full_failure_degrades_to_basic() {
    let (renderer, metrics) = hermetic(full_mode());
    let renderer = renderer.with_backends(basic_only());

    let outcome = renderer.render("Energy: $E = mc^2$");

    assert_eq!(outcome.final_strategy, Strategy::Basic);
    assert_eq!(outcome.attempts.len(), 3);
    assert_eq!(outcome.errors().count(), 2);
    assert!(!outcome.output.is_empty());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.render_attempts, 3);
    assert_eq!(snapshot.render_errors, 2);
    assert_eq!(snapshot.provider_usage.get("scripted"), Some(&3));
}

#[test]
fn test_degradation_transforms_content() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let backends = BackendTable::from_fn("recording", move |content, strategy, _| {
        log.lock().push((strategy, content.to_string()));
        if strategy > Strategy::Basic {
            Err(RenderError::Backend("offline".to_string()))
        } else {
            Ok(content.to_string())
        }
    });

    let (renderer, _) = hermetic(full_mode());
    renderer
        .with_backends(backends)
        .render("Area $$\\pi r^2$$ here");

    let seen = seen.lock();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], (Strategy::Full, "Area $$\\pi r^2$$ here".to_string()));
    assert_eq!(seen[1], (Strategy::Simplified, "Area $\\pi r^2$ here".to_string()));
    assert_eq!(seen[2], (Strategy::Basic, "Area \\pi r^2 here".to_string()));
}

#[test]
fn test_empty_content_shows_placeholder() {
    let analysis = analyze("");
    assert_eq!(analysis.complexity, Complexity::None);
    assert!(!analysis.has_math);
    assert!(!analysis.has_markdown);

    let (renderer, metrics) = hermetic(RenderConfig::default());
    let outcome = renderer.render("");

    assert!(outcome.output.contains("No content to display"));
    assert!(outcome.attempts.is_empty());
    assert_eq!(outcome.errors().count(), 0);
    assert_eq!(metrics.snapshot().render_attempts, 0);
}

#[test]
fn test_success_rate_matches_counts() {
    let successes = 7u64;
    let failures = 3u64;
    let metrics = Arc::new(MetricsCollector::new());

    let ok = Renderer::new(full_mode())
        .with_backends(echo())
        .with_metrics(Arc::clone(&metrics));
    let no_retry = RenderConfig::builder()
        .mode(RenderMode::Full)
        .max_retries(0)
        .build()
        .unwrap();
    let failing = Renderer::new(no_retry)
        .with_backends(BackendTable::from_fn("down", |_, _, _| {
            Err(RenderError::Backend("down".to_string()))
        }))
        .with_metrics(Arc::clone(&metrics));

    for i in 0..successes {
        ok.render(&format!("item {}", i));
    }
    for i in 0..failures {
        let outcome = failing.render(&format!("item {}", i));
        assert_eq!(outcome.final_strategy, Strategy::ErrorFallback);
    }

    let snapshot = metrics.snapshot();
    let expected = successes as f64 / (successes + failures) as f64 * 100.0;
    assert!((snapshot.success_rate - expected).abs() < 1e-9);
    assert_eq!(snapshot.fallbacks, failures);
}

#[test]
fn test_stale_completion_is_ignored() {
    let (renderer, metrics) = hermetic(full_mode());
    let mut display = renderer.instance("$x^2$");

    let ticket = match display.begin() {
        Progress::Next(ticket) => ticket,
        other => panic!("expected a ticket, got {:?}", other),
    };
    display.set_content("$y^2$");

    let progress = display.complete(ticket, Ok("<p>x</p>".to_string()));
    assert!(matches!(progress, Progress::Stale));
    assert!(display.state().is_none());
    assert_eq!(metrics.snapshot().render_attempts, 0);

    let outcome = display.render();
    assert!(outcome.output.contains("y^2"));
}

#[test]
fn test_cancel_makes_ticket_stale() {
    let completed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completed);
    let config = RenderConfig::builder()
        .on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let (renderer, _) = hermetic(config);
    let mut display = renderer.instance("text");

    let Progress::Next(ticket) = display.begin() else {
        panic!("expected a ticket");
    };
    display.cancel();

    assert!(matches!(display.complete(ticket, Ok("late".to_string())), Progress::Stale));
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

#[test]
fn test_render_async() {
    let (renderer, metrics) = hermetic(full_mode());
    let mut display = renderer.instance("Async $a+b$");

    let outcome = pollster::block_on(display.render_async(|request| async move {
        if request.strategy == Strategy::Full {
            Err(RenderError::Backend("typesetter still loading".to_string()))
        } else {
            Ok(format!("<p>{}</p>", request.content))
        }
    }));

    assert_eq!(outcome.final_strategy, Strategy::Simplified);
    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(metrics.snapshot().provider_usage.get("async"), Some(&2));
}

#[test]
fn test_events_follow_cycle() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let config = RenderConfig::builder()
        .mode(RenderMode::Full)
        .on_event(move |event: &RenderEvent| sink.lock().push(event.name()))
        .build()
        .unwrap();

    let (renderer, _) = hermetic(config);
    renderer.with_backends(basic_only()).render("$x$");

    assert_eq!(
        *events.lock(),
        vec![
            "attempt-started",
            "attempt-failed",
            "degraded",
            "attempt-started",
            "attempt-failed",
            "degraded",
            "attempt-started",
            "completed",
        ]
    );
}

#[test]
fn test_concurrent_renders_share_metrics() {
    let metrics = Arc::new(MetricsCollector::new());
    let renderer = Renderer::new(full_mode())
        .with_backends(echo())
        .with_metrics(Arc::clone(&metrics));

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let renderer = renderer.clone();
            scope.spawn(move || {
                for i in 0..25 {
                    renderer.render(&format!("worker {} item {} $x_{}$", worker, i, i));
                }
            });
        }
    });

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.render_attempts, 200);
    assert_eq!(snapshot.success_rate, 100.0);
}

#[test]
fn test_display_instance_defaults() {
    let mut display = DisplayInstance::new("plain", RenderConfig::default());
    assert_eq!(display.analysis().complexity, Complexity::Simple);
    assert_eq!(display.sanitized(), "plain");
}

#[test]
fn test_config_from_toml() {
    let config = RenderConfig::from_toml_str(
        r#"
mode = "safe"
max_retries = 2

[plugin]
class_prefix = "doc"
math_backend = "mathjax"
"#,
    )
    .unwrap();
    assert_eq!(config.mode, RenderMode::Safe);
    assert_eq!(config.max_retries, 2);
    assert_eq!(config.plugin.class_prefix, "doc");

    assert_eq!(
        RenderConfig::from_toml_str("max_retries = -1").unwrap_err(),
        ConfigError::NegativeRetries(-1)
    );
}
