use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::controller::HostDispatch;

/// Handle to a live, sandboxed script runtime instance.
///
/// Implemented by the host UI framework's glue (a web view, an embedded
/// interpreter, a test fake). The runtime is single-threaded and
/// cooperative; both operations suspend the caller, never the runtime's
/// own thread.
pub trait ScriptRuntime: Send + Sync {
    /// Inject a full document and evaluate it. Resolves once the
    /// document's loaded signal fires; an `Err` carries the runtime's
    /// failure message.
    fn load_document<'a>(
        &'a self,
        html: String,
        base_url: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>>;

    /// Evaluate a script expression in the already-loaded document.
    fn evaluate<'a>(
        &'a self,
        script: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>>;
}

/// Creates one fresh runtime per full load cycle.
///
/// The dispatch handle carries the session's call bridge and error
/// channel; the implementation wires it to whatever message channels the
/// concrete runtime exposes (the blocking entry point, the call message
/// handler, the error and loaded signals).
pub trait RuntimeFactory: Send + Sync {
    fn create(&self, dispatch: HostDispatch) -> Arc<dyn ScriptRuntime>;
}

/// A script-side error or rejection report, or a host callable failure.
#[derive(Debug, Clone, Default)]
pub struct ScriptError {
    pub message: String,
    pub source: String,
    pub line: u32,
    pub column: u32,
    pub stack: Option<String>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: source.into(),
            ..Default::default()
        }
    }
}

/// Single channel for everything that goes wrong inside a session:
/// script-side runtime errors, unhandled rejections, and asynchronous
/// callable failures all arrive here.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: ScriptError);
}

/// Default sink: structured log output.
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, error: ScriptError) {
        tracing::error!(
            message = %error.message,
            source = %error.source,
            line = error.line,
            column = error.column,
            stack = error.stack.as_deref().unwrap_or(""),
            "Script error"
        );
    }
}
