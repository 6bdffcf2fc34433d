//! # mathguard
//!
//! A fault-tolerant rendering core for user-supplied Markdown with embedded
//! LaTeX math. Malformed input never breaks the display: content is analyzed,
//! repaired, and rendered through a chain of progressively more forgiving
//! strategies until something succeeds.
//!
//! ## Pipeline
//!
//! 1. **Analyze**: [`analyze`] classifies content by math and Markdown density
//!    and suggests a starting strategy.
//! 2. **Sanitize**: [`sanitize`] balances `$` delimiters and braces, closes
//!    unterminated constructs, and normalizes whitespace.
//! 3. **Render**: the strategy state machine tries `full`, then `simplified`,
//!    `basic`, and `plaintext`, ending in `error-fallback` which shows the raw
//!    content.
//! 4. **Measure**: every attempt is recorded in a [`MetricsCollector`].
//!
//! ## Quick Start
//!
//! ```rust
//! use mathguard::{render, RenderConfig, RenderMode, Strategy};
//!
//! let config = RenderConfig::builder().mode(RenderMode::Full).build().unwrap();
//! let outcome = render("The area is $\\pi r^2$.", &config);
//! assert!(outcome.output.contains("math inline"));
//! assert_ne!(outcome.final_strategy, Strategy::ErrorFallback);
//! ```
//!
//! Long-lived displays use a [`DisplayInstance`], which memoizes analysis and
//! sanitization and can be driven synchronously, asynchronously, or one
//! attempt at a time by an external host:
//!
//! ```rust
//! use mathguard::{Progress, RenderConfig, Renderer};
//!
//! let renderer = Renderer::new(RenderConfig::default());
//! let mut display = renderer.instance("$$\\frac{1}{2$$");
//!
//! let mut progress = display.begin();
//! while let Progress::Next(ticket) = progress {
//!     let result = Err(mathguard::RenderError::Backend("host renderer offline".into()));
//!     progress = display.complete(ticket, result);
//! }
//! assert!(matches!(progress, Progress::Done(_)));
//! ```
//!
//! ## Configuration
//!
//! [`RenderConfig`] is built with [`RenderConfig::builder`] or read from TOML:
//!
//! ```text
//! mode = "auto"          # auto | full | safe | math-optimized | plaintext
//! max_retries = 3
//! debug = false
//!
//! [plugin]
//! class_prefix = "mg"
//! math_backend = "katex" # katex | mathjax | mathml
//! ```
//!
//! ## FFI
//!
//! The library provides a C-compatible FFI returning JSON payloads. See the
//! `ffi` module documentation for details.
//!
//! ## Features
//!
//! - `mathml`: Enable MathML output in the full renderer (requires `latex2mathml` crate)
//! - `wasm`: Enable WebAssembly bindings (requires `wasm-bindgen`)

pub mod analyzer;
pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod render;
pub mod sanitize;
pub mod strategy;

// FFI module (always compiled for cdylib)
pub mod ffi;

// WASM module (only with feature)
#[cfg(feature = "wasm")]
pub mod wasm;

// Convenience re-exports
pub use analyzer::{analyze, Complexity, ContentAnalysis, RenderingStrategy};
pub use backend::{BackendTable, RenderBackend};
pub use config::{MathBackend, PluginConfig, RenderConfig, RenderMode, RenderSettings};
pub use error::{ConfigError, Error, RenderError, Result};
pub use events::RenderEvent;
pub use metrics::{MetricsCollector, MetricsSnapshot, TrendDirection, TrendSummary};
pub use render::{render, AttemptTicket, DisplayInstance, Progress, RenderOutcome, Renderer};
pub use sanitize::{sanitize, sanitize_with_hook, SanitizerHook};
pub use strategy::machine::{ErrorInfo, RenderAttempt, RenderState};
pub use strategy::Strategy;
