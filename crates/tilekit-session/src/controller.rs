use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use tilekit_bridge::{CallBridge, CompletionSink};
use tilekit_cache::{AssetCache, CacheEntry, PrecacheEntry};
use tilekit_codec::CallbackError;

use crate::binding::ComponentBinding;
use crate::document::render_document;
use crate::error::SessionError;
use crate::runtime::{ErrorSink, RuntimeFactory, ScriptError, ScriptRuntime, TracingErrorSink};

/// Observable controller state.
///
/// `Empty → Loading → Ready`, `Ready → Updating → Ready`, and any state
/// `→ Superseded` once the controller is torn down. A failed or abandoned
/// transition falls back to the phase it started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Empty,
    Loading,
    Ready,
    Updating,
    Superseded,
}

/// The dispatch surface a runtime's glue calls into when script-side code
/// invokes a stub or reports an error.
///
/// One per session; handed to [`RuntimeFactory::create`] so the glue can
/// wire it to the runtime's concrete channels. Cloning shares the same
/// session wiring.
#[derive(Clone)]
pub struct HostDispatch {
    inner: Arc<DispatchInner>,
}

struct DispatchInner {
    bridge: Arc<CallBridge>,
    errors: Arc<dyn ErrorSink>,
    runtime: OnceLock<Arc<dyn ScriptRuntime>>,
}

impl HostDispatch {
    fn new(bridge: Arc<CallBridge>, errors: Arc<dyn ErrorSink>) -> Self {
        Self {
            inner: Arc::new(DispatchInner {
                bridge,
                errors,
                runtime: OnceLock::new(),
            }),
        }
    }

    fn attach_runtime(&self, runtime: Arc<dyn ScriptRuntime>) {
        let _ = self.inner.runtime.set(runtime);
    }

    /// Synchronous entry point for blocking stub calls. Returns the
    /// JSON-encoded result, or `None` for void callables and rejected
    /// dispatches (a rejection is also reported through the error sink).
    pub fn handle_blocking_call(&self, id: &str, args_json: &str) -> Option<String> {
        match self.inner.bridge.dispatch_blocking(id, args_json) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(callback = id, error = %err, "Blocking call rejected");
                self.inner
                    .errors
                    .report(ScriptError::new(err.to_string(), "host"));
                None
            }
        }
    }

    /// Entry point for posted non-blocking stub messages. The callable's
    /// result is delivered back by resolving the pending promise keyed by
    /// `token` inside the runtime.
    pub fn handle_non_blocking_call(&self, id: &str, token: &str, args_json: &str) {
        let sink: Arc<dyn CompletionSink> = Arc::new(RuntimeCompletionSink {
            inner: self.inner.clone(),
        });
        if let Err(err) = self
            .inner
            .bridge
            .dispatch_non_blocking(id, token, args_json, sink)
        {
            tracing::warn!(callback = id, error = %err, "Non-blocking call rejected");
            self.inner
                .errors
                .report(ScriptError::new(err.to_string(), "host"));
        }
    }

    /// Script-side error and rejection reports.
    pub fn handle_error(&self, error: ScriptError) {
        self.inner.errors.report(error);
    }
}

/// Delivers non-blocking results by evaluating the completion script in
/// the session's runtime, closing the async round trip.
struct RuntimeCompletionSink {
    inner: Arc<DispatchInner>,
}

impl CompletionSink for RuntimeCompletionSink {
    fn deliver<'a>(
        &'a self,
        token: String,
        result: Result<Option<String>, CallbackError>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let Some(runtime) = self.inner.runtime.get() else {
                self.inner.errors.report(ScriptError::new(
                    "call completed before the runtime was attached",
                    "host",
                ));
                return;
            };
            let token_js = serde_json::to_string(&token).expect("token serializes");
            let script = match &result {
                Ok(Some(payload)) => {
                    format!("globalThis.__tilekit.completeCall({token_js}, {payload});")
                }
                Ok(None) => format!("globalThis.__tilekit.completeCall({token_js}, null);"),
                Err(err) => {
                    // Same channel as script-side runtime errors.
                    self.inner
                        .errors
                        .report(ScriptError::new(err.to_string(), "callback"));
                    let message_js =
                        serde_json::to_string(&err.to_string()).expect("message serializes");
                    format!("globalThis.__tilekit.failCall({token_js}, {message_js});")
                }
            };
            if let Err(message) = runtime.evaluate(script).await {
                self.inner.errors.report(ScriptError::new(
                    format!("failed to deliver call result: {message}"),
                    "host",
                ));
            }
        })
    }
}

struct Session {
    component_id: String,
    bridge: Arc<CallBridge>,
    runtime: Arc<dyn ScriptRuntime>,
    dispatch: HostDispatch,
}

/// Orchestrates (re)initialization of the script runtime.
///
/// Owns the asset cache and the epoch counter; decides per `load` whether
/// an in-place property update suffices or a full cycle is needed.
/// Exactly one session is current at a time. Load and update cycles are
/// serialized; abandoning one mid-flight publishes nothing.
pub struct SessionController {
    cache: Arc<AssetCache>,
    factory: Arc<dyn RuntimeFactory>,
    errors: Arc<dyn ErrorSink>,
    /// Directory holding the deployed component bundles.
    bundle_dir: PathBuf,
    epochs: AtomicU64,
    state: tokio::sync::Mutex<Option<Session>>,
    phase: StdMutex<SessionPhase>,
}

impl SessionController {
    pub fn new(
        cache: Arc<AssetCache>,
        factory: Arc<dyn RuntimeFactory>,
        bundle_dir: PathBuf,
    ) -> Self {
        Self {
            cache,
            factory,
            errors: Arc::new(TracingErrorSink),
            bundle_dir,
            epochs: AtomicU64::new(1),
            state: tokio::sync::Mutex::new(None),
            phase: StdMutex::new(SessionPhase::Empty),
        }
    }

    pub fn with_error_sink(mut self, errors: Arc<dyn ErrorSink>) -> Self {
        self.errors = errors;
        self
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().expect("phase lock poisoned")
    }

    pub async fn current_component(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.as_ref().map(|s| s.component_id.clone())
    }

    /// The live session's dispatch surface, for runtime glue that attaches
    /// after the fact.
    pub async fn current_dispatch(&self) -> Option<HostDispatch> {
        let state = self.state.lock().await;
        state.as_ref().map(|s| s.dispatch.clone())
    }

    /// Display `binding`, updating in place when it targets the component
    /// already on screen and reinitializing otherwise.
    ///
    /// The call resolves once the runtime signals completion; none of its
    /// effects are observable earlier. On failure the prior ready session
    /// is preserved untouched.
    pub async fn load(&self, binding: ComponentBinding, base_url: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;

        let same_component = state
            .as_ref()
            .is_some_and(|s| s.component_id == binding.descriptor().component_id());
        if same_component {
            let guard = PhaseGuard::arm(self, SessionPhase::Ready);
            self.set_phase(SessionPhase::Updating);
            let session = state.as_ref().expect("session checked above");
            match self.try_update(session, &binding).await {
                Ok(()) => {
                    guard.finish(SessionPhase::Ready);
                    return Ok(());
                }
                Err(err) => {
                    guard.finish(SessionPhase::Ready);
                    tracing::warn!(
                        component = %binding.descriptor().component_id(),
                        error = %err,
                        "In-place update failed; falling back to full reload"
                    );
                }
            }
        }

        let restore = if state.is_some() {
            SessionPhase::Ready
        } else {
            SessionPhase::Empty
        };
        let guard = PhaseGuard::arm(self, restore);
        self.set_phase(SessionPhase::Loading);

        match self.full_load(&mut state, binding, base_url).await {
            Ok(()) => {
                guard.finish(SessionPhase::Ready);
                Ok(())
            }
            Err(err) => Err(err), // guard restores the prior phase
        }
    }

    /// Tear down the current session. All of its callback registrations
    /// are dropped atomically; stale stub calls fail fast from here on.
    pub async fn supersede(&self) {
        let mut state = self.state.lock().await;
        if let Some(session) = state.take() {
            session.bridge.supersede();
            tracing::info!(component = %session.component_id, "Session superseded");
        }
        self.set_phase(SessionPhase::Superseded);
    }

    async fn try_update(
        &self,
        session: &Session,
        binding: &ComponentBinding,
    ) -> Result<(), SessionError> {
        let props = binding.encode_props(session.bridge.as_ref())?;
        tracing::debug!(component = %session.component_id, "Updating session in place");
        session
            .runtime
            .evaluate(format!("globalThis.__tilekit.update({props});"))
            .await
            .map_err(SessionError::UpdateFailed)
    }

    async fn full_load(
        &self,
        state: &mut Option<Session>,
        binding: ComponentBinding,
        base_url: &str,
    ) -> Result<(), SessionError> {
        let descriptor = binding.descriptor().clone();
        let component_id = descriptor.component_id().to_owned();

        let epoch = self.epochs.fetch_add(1, Ordering::SeqCst);
        let bridge = Arc::new(CallBridge::new(epoch));
        tracing::info!(component = %component_id, epoch, "Starting full load");

        // Precache bundled assets and reroute the base URL through the
        // cache's virtual scheme.
        let mut entries = Vec::new();
        for asset in &descriptor.precache {
            match CacheEntry::from_file(&self.bundle_dir, &asset.path, &asset.content_type) {
                Ok(entry) => {
                    let url = format!("{}/{}", base_url.trim_end_matches('/'), asset.path);
                    entries.push(PrecacheEntry::new(url, entry));
                }
                Err(err) => {
                    tracing::warn!(
                        asset = %asset.path,
                        error = %err,
                        "Bundled asset unavailable; requests will go upstream"
                    );
                }
            }
        }
        let routed_base = self.cache.precache(entries, base_url);

        let props = binding.encode_props(bridge.as_ref())?;
        let html = render_document(&descriptor, &props);

        let dispatch = HostDispatch::new(bridge.clone(), self.errors.clone());
        let runtime = self.factory.create(dispatch.clone());
        dispatch.attach_runtime(runtime.clone());

        runtime
            .load_document(html, routed_base)
            .await
            .map_err(SessionError::Load)?;

        // Publish. Only now does the prior session lose its registrations;
        // a failure or cancellation above leaves it fully usable.
        if let Some(prior) = state.take() {
            prior.bridge.supersede();
            tracing::info!(component = %prior.component_id, "Prior session superseded");
        }
        *state = Some(Session {
            component_id,
            bridge,
            runtime,
            dispatch,
        });
        Ok(())
    }

    fn set_phase(&self, phase: SessionPhase) {
        *self.phase.lock().expect("phase lock poisoned") = phase;
    }
}

/// Restores the phase it was armed with unless the transition finishes.
/// Dropping an in-flight `load` future trips the guard, so an abandoned
/// cycle never leaves the controller stuck in `Loading`/`Updating`.
struct PhaseGuard<'a> {
    controller: &'a SessionController,
    restore: SessionPhase,
    armed: bool,
}

impl<'a> PhaseGuard<'a> {
    fn arm(controller: &'a SessionController, restore: SessionPhase) -> Self {
        Self {
            controller,
            restore,
            armed: true,
        }
    }

    fn finish(mut self, phase: SessionPhase) {
        self.armed = false;
        self.controller.set_phase(phase);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.controller.set_phase(self.restore);
        }
    }
}
