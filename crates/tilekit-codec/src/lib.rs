//! Script-value model and hybrid data/expression encoder for tilekit.
//!
//! A [`ScriptValue`] is a closed variant over the structured values a tile's
//! properties can take: strings, numbers, booleans, null, arrays, objects,
//! and host callables. The encoder renders a `ScriptValue` as a
//! script-literal expression the runtime can evaluate. Plain data encodes
//! structurally (standard JSON text, object keys in insertion order);
//! callables are registered through an [`EncodingContext`] and replaced by
//! the stub expression the context returns.
//!
//! # Quick start
//!
//! ```rust
//! use tilekit_codec::{encode, EncodingContext, ScriptValue, BlockingFn, NonBlockingFn};
//!
//! struct StubContext;
//!
//! impl EncodingContext for StubContext {
//!     fn register_blocking(&self, _callback: BlockingFn) -> String {
//!         "(function() {})".into()
//!     }
//!     fn register_non_blocking(&self, _callback: NonBlockingFn) -> String {
//!         "(async function() {})".into()
//!     }
//! }
//!
//! let props = ScriptValue::object([
//!     ("name", ScriptValue::from("Alice")),
//!     ("count", ScriptValue::from(42)),
//! ]);
//!
//! let text = encode(&props, &StubContext).unwrap();
//! assert_eq!(text, r#"{"name":"Alice","count":42}"#);
//! ```

pub mod encode;
pub mod error;
pub mod value;

pub use encode::{MAX_ENCODE_DEPTH, encode};
pub use error::{CallbackError, EncodeError};
pub use value::{BlockingFn, EncodingContext, HostCallable, NonBlockingFn, ScriptValue};
