//! Render backends, one per strategy level.
//!
//! A backend turns content into display HTML or reports a [`RenderError`].
//! The state machine never calls a backend directly: hosts look one up in a
//! [`BackendTable`] for the attempt's strategy.

pub mod lexer;
pub(crate) mod markup;

mod basic;
mod full;
mod plaintext;
mod simplified;

pub use self::basic::BasicRenderer;
pub use self::full::FullRenderer;
pub use self::plaintext::PlaintextRenderer;
pub use self::simplified::SimplifiedRenderer;

use crate::config::PluginConfig;
use crate::error::{panic_message, RenderError};
use crate::strategy::Strategy;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

type RenderFn = dyn Fn(&str, Strategy, &PluginConfig) -> Result<String, RenderError> + Send + Sync;

/// A renderer serving one strategy level.
pub trait RenderBackend: Send + Sync {
    /// Provider name reported to metrics.
    fn name(&self) -> &str;

    /// Render `content` to display output.
    fn render(&self, content: &str, config: &PluginConfig) -> Result<String, RenderError>;
}

/// Create the built-in backend for a strategy.
///
/// `ErrorFallback` has no backend: its output is the raw content.
pub fn create_backend(strategy: Strategy) -> Option<Arc<dyn RenderBackend>> {
    match strategy {
        Strategy::Full => Some(Arc::new(FullRenderer::new())),
        Strategy::Simplified => Some(Arc::new(SimplifiedRenderer::new())),
        Strategy::Basic => Some(Arc::new(BasicRenderer::new())),
        Strategy::Plaintext => Some(Arc::new(PlaintextRenderer::new())),
        Strategy::ErrorFallback => None,
    }
}

/// Run `backend`, turning a panic into [`RenderError::Panicked`].
pub fn call_backend(
    backend: &dyn RenderBackend,
    content: &str,
    config: &PluginConfig,
) -> Result<String, RenderError> {
    match panic::catch_unwind(AssertUnwindSafe(|| backend.render(content, config))) {
        Ok(result) => result,
        Err(payload) => Err(RenderError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Strategy-to-backend lookup.
#[derive(Clone)]
pub struct BackendTable {
    full: Arc<dyn RenderBackend>,
    simplified: Arc<dyn RenderBackend>,
    basic: Arc<dyn RenderBackend>,
    plaintext: Arc<dyn RenderBackend>,
}

impl BackendTable {
    /// The built-in HTML renderers.
    pub fn builtin() -> Self {
        Self {
            full: Arc::new(FullRenderer::new()),
            simplified: Arc::new(SimplifiedRenderer::new()),
            basic: Arc::new(BasicRenderer::new()),
            plaintext: Arc::new(PlaintextRenderer::new()),
        }
    }

    /// Replace the backend for one level. `ErrorFallback` is ignored.
    pub fn with(mut self, strategy: Strategy, backend: Arc<dyn RenderBackend>) -> Self {
        match strategy {
            Strategy::Full => self.full = backend,
            Strategy::Simplified => self.simplified = backend,
            Strategy::Basic => self.basic = backend,
            Strategy::Plaintext => self.plaintext = backend,
            Strategy::ErrorFallback => {}
        }
        self
    }

    /// Serve every level with one closure that receives the strategy.
    pub fn from_fn<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&str, Strategy, &PluginConfig) -> Result<String, RenderError> + Send + Sync + 'static,
    {
        let render: Arc<RenderFn> = Arc::new(render);
        let name = name.into();
        let slot = |strategy| -> Arc<dyn RenderBackend> {
            Arc::new(FnBackend {
                name: name.clone(),
                strategy,
                render: Arc::clone(&render),
            })
        };

        Self {
            full: slot(Strategy::Full),
            simplified: slot(Strategy::Simplified),
            basic: slot(Strategy::Basic),
            plaintext: slot(Strategy::Plaintext),
        }
    }

    pub fn get(&self, strategy: Strategy) -> Option<&dyn RenderBackend> {
        match strategy {
            Strategy::Full => Some(self.full.as_ref()),
            Strategy::Simplified => Some(self.simplified.as_ref()),
            Strategy::Basic => Some(self.basic.as_ref()),
            Strategy::Plaintext => Some(self.plaintext.as_ref()),
            Strategy::ErrorFallback => None,
        }
    }

    /// Render through the backend for `strategy`, containing panics.
    pub fn render(
        &self,
        strategy: Strategy,
        content: &str,
        config: &PluginConfig,
    ) -> Result<String, RenderError> {
        match self.get(strategy) {
            Some(backend) => call_backend(backend, content, config),
            None => Err(RenderError::Unsupported(format!(
                "no backend for strategy {}",
                strategy
            ))),
        }
    }
}

impl Default for BackendTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for BackendTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendTable")
            .field("full", &self.full.name())
            .field("simplified", &self.simplified.name())
            .field("basic", &self.basic.name())
            .field("plaintext", &self.plaintext.name())
            .finish()
    }
}

struct FnBackend {
    name: String,
    strategy: Strategy,
    render: Arc<RenderFn>,
}

impl RenderBackend for FnBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, content: &str, config: &PluginConfig) -> Result<String, RenderError> {
        (self.render)(content, self.strategy, config)
    }
}
