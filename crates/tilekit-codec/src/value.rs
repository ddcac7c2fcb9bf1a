use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::CallbackError;

/// A synchronous host callable invoked from script.
///
/// Receives the JSON-encoded argument array and returns the JSON-encoded
/// result, or `None` for void callables.
pub type BlockingFn =
    Arc<dyn Fn(&str) -> Result<Option<String>, CallbackError> + Send + Sync>;

/// An asynchronous host callable invoked from script.
///
/// Same argument/result convention as [`BlockingFn`], but the invocation is
/// dispatched on a separate task and the result is delivered back to the
/// script side once the future resolves.
pub type NonBlockingFn = Arc<
    dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<Option<String>, CallbackError>> + Send>>
        + Send
        + Sync,
>;

/// A host function embedded in a property tree.
///
/// Dispatch is by tag: blocking callables run synchronously on the thread
/// delivering the script runtime's call, non-blocking ones on a separate
/// task. Callables are never plain-data-serializable; the encoder replaces
/// them with session-scoped stub expressions.
#[derive(Clone)]
pub enum HostCallable {
    Blocking(BlockingFn),
    NonBlocking(NonBlockingFn),
}

impl fmt::Debug for HostCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCallable::Blocking(_) => f.write_str("HostCallable::Blocking(..)"),
            HostCallable::NonBlocking(_) => f.write_str("HostCallable::NonBlocking(..)"),
        }
    }
}

/// A structured value exchanged across the runtime boundary.
///
/// Objects are kept as a vector of key/value pairs so the encoded text
/// reproduces insertion order exactly; tests rely on that determinism.
#[derive(Debug, Clone)]
pub enum ScriptValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Array(Vec<ScriptValue>),
    Object(Vec<(String, ScriptValue)>),
    Callable(HostCallable),
}

impl ScriptValue {
    /// Build an object value from `(key, value)` pairs, preserving order.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ScriptValue)>,
    {
        ScriptValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build an array value.
    pub fn array<I: IntoIterator<Item = ScriptValue>>(elements: I) -> Self {
        ScriptValue::Array(elements.into_iter().collect())
    }

    /// Wrap a synchronous host function as a callable value.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<Option<String>, CallbackError> + Send + Sync + 'static,
    {
        ScriptValue::Callable(HostCallable::Blocking(Arc::new(f)))
    }

    /// Wrap an asynchronous host function as a callable value.
    pub fn non_blocking<F>(f: F) -> Self
    where
        F: Fn(String) -> Pin<Box<dyn Future<Output = Result<Option<String>, CallbackError>> + Send>>
            + Send
            + Sync
            + 'static,
    {
        ScriptValue::Callable(HostCallable::NonBlocking(Arc::new(f)))
    }

    /// Whether any callable occurs in this value, at any nesting depth.
    pub fn contains_callable(&self) -> bool {
        match self {
            ScriptValue::Callable(_) => true,
            ScriptValue::Array(elements) => elements.iter().any(ScriptValue::contains_callable),
            ScriptValue::Object(entries) => {
                entries.iter().any(|(_, v)| v.contains_callable())
            }
            _ => false,
        }
    }
}

/// Equality ignores callables: two callable values never compare equal,
/// mirroring function identity on the script side.
impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ScriptValue::String(a), ScriptValue::String(b)) => a == b,
            (ScriptValue::Number(a), ScriptValue::Number(b)) => a == b,
            (ScriptValue::Bool(a), ScriptValue::Bool(b)) => a == b,
            (ScriptValue::Null, ScriptValue::Null) => true,
            (ScriptValue::Array(a), ScriptValue::Array(b)) => a == b,
            (ScriptValue::Object(a), ScriptValue::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::String(value.to_owned())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        ScriptValue::String(value)
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        ScriptValue::Bool(value)
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        ScriptValue::Number(value)
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        ScriptValue::Number(value as f64)
    }
}

impl From<i32> for ScriptValue {
    fn from(value: i32) -> Self {
        ScriptValue::Number(f64::from(value))
    }
}

impl From<u32> for ScriptValue {
    fn from(value: u32) -> Self {
        ScriptValue::Number(f64::from(value))
    }
}

impl From<Vec<ScriptValue>> for ScriptValue {
    fn from(value: Vec<ScriptValue>) -> Self {
        ScriptValue::Array(value)
    }
}

impl<T: Into<ScriptValue>> From<Option<T>> for ScriptValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => ScriptValue::Null,
        }
    }
}

/// Context for encoding script values, allowing registration of host
/// callables.
///
/// The active session's call bridge implements this. Each registration
/// mints a fresh session-unique identifier and returns a stub expression
/// that, evaluated in the script runtime, calls back into the host.
pub trait EncodingContext {
    /// Register a synchronous host callable; returns its stub expression.
    fn register_blocking(&self, callback: BlockingFn) -> String;

    /// Register an asynchronous host callable; returns its stub expression.
    fn register_non_blocking(&self, callback: NonBlockingFn) -> String;
}
