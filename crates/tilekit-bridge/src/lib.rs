//! Bidirectional call bridge between host callables and a tilekit script
//! session.
//!
//! A [`CallBridge`] owns the per-session registries of blocking and
//! non-blocking host callables. Registering a callable (which happens while
//! the value codec encodes a binding's properties) mints a fresh,
//! epoch-tagged identifier and returns the stub expression the script side
//! evaluates to call back into the host.
//!
//! # Threading
//!
//! The bridge is `Send + Sync` and typically wrapped in `Arc`. Both
//! registries live behind one mutex, which is never held while a callable
//! runs. The script runtime is single-threaded, so at most one blocking
//! call can legitimately be in flight; a second concurrent arrival is a
//! protocol violation and is rejected.

pub mod bridge;
pub mod error;
pub mod id;

pub use bridge::{CallBridge, CompletionSink};
pub use error::CallDispatchError;
pub use id::{CallMode, CallbackId};
