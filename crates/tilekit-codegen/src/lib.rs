//! Schema-driven binding generator for tilekit components.
//!
//! Runs offline, at build time: the external bundler emits a manifest
//! describing every component's entry path, stylesheets, assets, and typed
//! property definitions; this crate turns that manifest into Rust source
//! with one typed constructor per component.
//!
//! A component whose properties are free of function types — at every
//! nesting depth — is *plain-data*: its generated struct serializes
//! through the default structural path. Any function-typed property makes
//! the component *hybrid*: the generator additionally emits an encode
//! routine that registers each callable with the session's call bridge
//! and splices the returned stub expression into the property literal.
//!
//! An unrecognized property-type tag fails generation; it is never
//! degraded to an untyped passthrough.

pub mod classify;
pub mod error;
pub mod generate;
pub mod imports;
pub mod schema;

pub use classify::{Classification, classify, normalize};
pub use error::GenerateError;
pub use generate::{generate, generate_component, sanitize_ident};
pub use imports::extract_relative_imports;
pub use schema::{ComponentSchema, Manifest, PropDefinition, PropType};
