//! WebAssembly bindings for JavaScript/TypeScript.

#![cfg(feature = "wasm")]

use crate::analyzer::analyze;
use crate::config::{MathBackend, PluginConfig, RenderConfig, RenderMode};
use crate::error::ConfigError;
use crate::metrics;
use crate::render::render;
use crate::sanitize::sanitize;
use serde::Serialize;
use std::collections::BTreeMap;
use wasm_bindgen::prelude::*;

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsError::new(&e.to_string()))
}

/// Forward Rust panics to `console.error`.
#[wasm_bindgen(js_name = installPanicHook)]
pub fn install_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Analyze content and return `{ complexity, hasMath, ... }`.
#[wasm_bindgen(js_name = analyzeContent)]
pub fn analyze_content(input: &str) -> Result<JsValue, JsError> {
    to_js(&analyze(input))
}

/// Repair malformed math and Markdown.
#[wasm_bindgen(js_name = sanitizeContent)]
pub fn sanitize_content(input: &str) -> String {
    let analysis = analyze(input);
    sanitize(input, Some(&analysis))
}

/// Render content through the degradation chain.
///
/// Returns `{ output, finalStrategy, attempts, analysis }`.
#[wasm_bindgen(js_name = renderContent)]
pub fn render_content(input: &str, options: Option<RenderOptions>) -> Result<JsValue, JsError> {
    let config = options
        .map(|o| o.to_render_config())
        .transpose()?
        .unwrap_or_default();
    to_js(&render(input, &config))
}

/// Process-wide metrics snapshot.
#[wasm_bindgen(js_name = metricsSnapshot)]
pub fn metrics_snapshot() -> Result<JsValue, JsError> {
    to_js(&metrics::global().snapshot())
}

/// Configuration options for rendering.
#[wasm_bindgen]
pub struct RenderOptions {
    mode: String,
    max_retries: i32,
    debug: bool,
    math_backend: String,
    class_prefix: Option<String>,
    options: BTreeMap<String, String>,
}

#[wasm_bindgen]
impl RenderOptions {
    /// Create a new options object with defaults.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            mode: "auto".to_string(),
            max_retries: crate::config::DEFAULT_MAX_RETRIES as i32,
            debug: false,
            math_backend: "katex".to_string(),
            class_prefix: None,
            options: BTreeMap::new(),
        }
    }

    /// Set the mode: "auto", "full", "safe", "math-optimized", or "plaintext".
    #[wasm_bindgen(js_name = setMode)]
    pub fn set_mode(&mut self, mode: &str) {
        self.mode = mode.to_string();
    }

    #[wasm_bindgen(js_name = setMaxRetries)]
    pub fn set_max_retries(&mut self, max_retries: i32) {
        self.max_retries = max_retries;
    }

    #[wasm_bindgen(js_name = setDebug)]
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Set the math rendering backend: "katex", "mathjax", or "mathml".
    #[wasm_bindgen(js_name = setMathBackend)]
    pub fn set_math_backend(&mut self, backend: &str) {
        self.math_backend = backend.to_string();
    }

    #[wasm_bindgen(js_name = setClassPrefix)]
    pub fn set_class_prefix(&mut self, prefix: &str) {
        self.class_prefix = Some(prefix.to_string());
    }

    /// Copy string-valued entries of a plain object into the plugin options.
    #[wasm_bindgen(js_name = setPluginOptions)]
    pub fn set_plugin_options(&mut self, options: &js_sys::Object) {
        for entry in js_sys::Object::entries(options).iter() {
            let pair = js_sys::Array::from(&entry);
            if let (Some(key), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) {
                self.options.insert(key, value);
            }
        }
    }

    fn to_render_config(&self) -> Result<RenderConfig, JsError> {
        let mode: RenderMode = self
            .mode
            .parse()
            .map_err(|e: ConfigError| JsError::new(&e.to_string()))?;
        let math_backend: MathBackend = self
            .math_backend
            .parse()
            .map_err(|e: ConfigError| JsError::new(&e.to_string()))?;

        let mut plugin = PluginConfig {
            math_backend,
            options: self.options.clone(),
            ..PluginConfig::default()
        };
        if let Some(prefix) = &self.class_prefix {
            plugin.class_prefix = prefix.clone();
        }

        RenderConfig::builder()
            .mode(mode)
            .max_retries(i64::from(self.max_retries))
            .debug(self.debug)
            .plugin(plugin)
            .build()
            .map_err(|e| JsError::new(&e.to_string()))
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the library version.
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
