use serde::Serialize;
use tilekit_codec::{EncodeError, EncodingContext, ScriptValue};

/// A bundled asset to load into the cache before the document is injected.
#[derive(Debug, Clone)]
pub struct PrecacheAsset {
    /// Bundle-relative path.
    pub path: String,
    pub content_type: String,
}

/// Identity of a deployable component module.
#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    /// Script entry path; doubles as the component identifier the
    /// reload-vs-update decision keys on.
    pub entry: String,
    pub styles: Vec<String>,
    /// Bare module specifier → resolved URL.
    pub import_map: Vec<(String, String)>,
    pub precache: Vec<PrecacheAsset>,
}

impl ComponentDescriptor {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            styles: Vec::new(),
            import_map: Vec::new(),
            precache: Vec::new(),
        }
    }

    pub fn component_id(&self) -> &str {
        &self.entry
    }
}

/// A component identity paired with a property-encoding closure.
///
/// Immutable once constructed; a property change produces a new binding
/// that supersedes this one through `SessionController::load`. Generated
/// typed constructors produce these; the constructors here cover
/// hand-written callers and tests.
pub struct ComponentBinding {
    descriptor: ComponentDescriptor,
    make_props: Box<dyn Fn(&dyn EncodingContext) -> Result<String, EncodeError> + Send + Sync>,
}

impl ComponentBinding {
    /// Binding with an explicit encoding closure (the hybrid path).
    pub fn new<F>(descriptor: ComponentDescriptor, make_props: F) -> Self
    where
        F: Fn(&dyn EncodingContext) -> Result<String, EncodeError> + Send + Sync + 'static,
    {
        Self {
            descriptor,
            make_props: Box::new(make_props),
        }
    }

    /// Binding over serializable properties: the default plain path, no
    /// callable registration.
    pub fn plain<P>(descriptor: ComponentDescriptor, props: P) -> Self
    where
        P: Serialize + Send + Sync + 'static,
    {
        Self::new(descriptor, move |_ctx| Ok(serde_json::to_string(&props)?))
    }

    /// Binding over a [`ScriptValue`] tree; callables in the tree register
    /// against the session's encoding context.
    pub fn from_value(descriptor: ComponentDescriptor, props: ScriptValue) -> Self {
        Self::new(descriptor, move |ctx| tilekit_codec::encode(&props, ctx))
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    pub fn encode_props(&self, ctx: &dyn EncodingContext) -> Result<String, EncodeError> {
        (self.make_props)(ctx)
    }
}

impl std::fmt::Debug for ComponentBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentBinding")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
