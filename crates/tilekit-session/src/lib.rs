//! Session controller for tilekit.
//!
//! A session is one live script runtime instance displaying one component.
//! The controller owns the reload-vs-update decision: loading a binding
//! for the component already on screen re-encodes its properties and
//! invokes the in-document update entry point; loading a different
//! component (or updating a broken runtime) runs a full cycle — fresh call
//! bridge, asset precache, document injection — and supersedes the prior
//! session only once the replacement is ready.
//!
//! The script runtime itself is an external collaborator behind the
//! [`ScriptRuntime`] trait; tests drive the controller with a fake.

pub mod binding;
pub mod controller;
pub mod document;
pub mod error;
pub mod runtime;

pub use binding::{ComponentBinding, ComponentDescriptor, PrecacheAsset};
pub use controller::{HostDispatch, SessionController, SessionPhase};
pub use document::render_document;
pub use error::SessionError;
pub use runtime::{ErrorSink, RuntimeFactory, ScriptError, ScriptRuntime, TracingErrorSink};
