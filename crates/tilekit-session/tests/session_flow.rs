//! End-to-end session controller tests against a fake script runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tilekit_cache::AssetCache;
use tilekit_codec::ScriptValue;
use tilekit_session::{
    ComponentBinding, ComponentDescriptor, ErrorSink, HostDispatch, PrecacheAsset,
    RuntimeFactory, ScriptError, ScriptRuntime, SessionController, SessionError, SessionPhase,
};
use tokio::sync::oneshot;

struct FakeRuntime {
    loads: Mutex<Vec<(String, String)>>,
    evals: Mutex<Vec<String>>,
    fail_load: AtomicBool,
    fail_eval: AtomicBool,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeRuntime {
    fn new() -> Self {
        Self {
            loads: Mutex::new(Vec::new()),
            evals: Mutex::new(Vec::new()),
            fail_load: AtomicBool::new(false),
            fail_eval: AtomicBool::new(false),
            gate: Mutex::new(None),
        }
    }

    fn loads(&self) -> Vec<(String, String)> {
        self.loads.lock().unwrap().clone()
    }

    fn evals(&self) -> Vec<String> {
        self.evals.lock().unwrap().clone()
    }
}

impl ScriptRuntime for FakeRuntime {
    fn load_document<'a>(
        &'a self,
        html: String,
        base_url: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>> {
        Box::pin(async move {
            let gate = self.gate.lock().unwrap().take();
            if let Some(rx) = gate {
                // Held open until the test fires the loaded signal.
                let _ = rx.await;
            }
            if self.fail_load.load(Ordering::SeqCst) {
                return Err("evaluation failed".into());
            }
            self.loads.lock().unwrap().push((html, base_url));
            Ok(())
        })
    }

    fn evaluate<'a>(
        &'a self,
        script: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail_eval.load(Ordering::SeqCst) {
                return Err("update entry point missing".into());
            }
            self.evals.lock().unwrap().push(script);
            Ok(())
        })
    }
}

#[derive(Default)]
struct FakeFactory {
    created: Mutex<Vec<Arc<FakeRuntime>>>,
    dispatches: Mutex<Vec<HostDispatch>>,
    fail_next_load: AtomicBool,
    gate_next: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeFactory {
    fn runtime(&self, index: usize) -> Arc<FakeRuntime> {
        self.created.lock().unwrap()[index].clone()
    }

    fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    fn dispatch(&self, index: usize) -> HostDispatch {
        self.dispatches.lock().unwrap()[index].clone()
    }
}

impl RuntimeFactory for FakeFactory {
    fn create(&self, dispatch: HostDispatch) -> Arc<dyn ScriptRuntime> {
        let runtime = Arc::new(FakeRuntime::new());
        if self.fail_next_load.swap(false, Ordering::SeqCst) {
            runtime.fail_load.store(true, Ordering::SeqCst);
        }
        if let Some(rx) = self.gate_next.lock().unwrap().take() {
            *runtime.gate.lock().unwrap() = Some(rx);
        }
        self.created.lock().unwrap().push(runtime.clone());
        self.dispatches.lock().unwrap().push(dispatch);
        runtime
    }
}

#[derive(Default)]
struct RecordingSink {
    errors: Mutex<Vec<ScriptError>>,
}

impl RecordingSink {
    fn messages(&self) -> Vec<String> {
        self.errors.lock().unwrap().iter().map(|e| e.message.clone()).collect()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: ScriptError) {
        self.errors.lock().unwrap().push(error);
    }
}

struct Fixture {
    controller: Arc<SessionController>,
    factory: Arc<FakeFactory>,
    sink: Arc<RecordingSink>,
    cache: Arc<AssetCache>,
    _bundle: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let bundle = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(bundle.path().join("Counter")).unwrap();
    std::fs::write(
        bundle.path().join("Counter/index.js"),
        b"export default () => null;",
    )
    .unwrap();

    let cache = Arc::new(AssetCache::new());
    let factory = Arc::new(FakeFactory::default());
    let sink = Arc::new(RecordingSink::default());
    let controller = Arc::new(
        SessionController::new(
            cache.clone(),
            factory.clone(),
            bundle.path().to_path_buf(),
        )
        .with_error_sink(sink.clone()),
    );
    Fixture {
        controller,
        factory,
        sink,
        cache,
        _bundle: bundle,
    }
}

fn counter_descriptor() -> ComponentDescriptor {
    ComponentDescriptor {
        entry: "./Counter/index.js".into(),
        styles: vec![],
        import_map: vec![("react".into(), "https://esm.sh/react@19".into())],
        precache: vec![PrecacheAsset {
            path: "Counter/index.js".into(),
            content_type: "application/javascript".into(),
        }],
    }
}

fn counter_binding(count: i32) -> ComponentBinding {
    ComponentBinding::from_value(
        counter_descriptor(),
        ScriptValue::object([
            ("count", ScriptValue::from(count)),
            ("increment", ScriptValue::blocking(|_| Ok(None))),
        ]),
    )
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn first_load_publishes_ready_and_precaches_the_bundle() {
    let fx = fixture();
    assert_eq!(fx.controller.phase(), SessionPhase::Empty);

    fx.controller
        .load(counter_binding(1), "https://cdn.example/bundle")
        .await
        .unwrap();

    assert_eq!(fx.controller.phase(), SessionPhase::Ready);
    assert_eq!(
        fx.controller.current_component().await.as_deref(),
        Some("./Counter/index.js")
    );

    assert_eq!(fx.factory.created_count(), 1);
    let loads = fx.factory.runtime(0).loads();
    assert_eq!(loads.len(), 1);
    let (html, base) = &loads[0];
    assert!(html.contains("\"count\":1"));
    assert!(html.contains("prompt('blocking_1_0'"));
    assert_eq!(base, "tile-cache://https://cdn.example/bundle");

    // The bundled entry is now served from the cache.
    assert!(
        fx.cache
            .lookup("https://cdn.example/bundle/Counter/index.js")
            .is_some()
    );
}

#[tokio::test]
async fn reloading_the_same_component_takes_the_update_path() {
    let fx = fixture();
    fx.controller
        .load(counter_binding(1), "https://cdn.example/bundle")
        .await
        .unwrap();
    fx.controller
        .load(counter_binding(2), "https://cdn.example/bundle")
        .await
        .unwrap();

    // Same runtime instance, no second document injected.
    assert_eq!(fx.factory.created_count(), 1);
    let evals = fx.factory.runtime(0).evals();
    assert_eq!(evals.len(), 1);
    assert!(evals[0].starts_with("globalThis.__tilekit.update({\"count\":2,"));
    assert_eq!(fx.controller.phase(), SessionPhase::Ready);

    // Both encodes registered against the same epoch; old and new
    // identifiers dispatch alike until the session is superseded.
    let dispatch = fx.controller.current_dispatch().await.unwrap();
    assert!(dispatch.handle_blocking_call("blocking_1_0", "[]").is_none());
    assert!(fx.sink.messages().is_empty());
    assert!(dispatch.handle_blocking_call("blocking_1_1", "[]").is_none());
    assert!(fx.sink.messages().is_empty());
}

#[tokio::test]
async fn loading_a_different_component_reinitializes_and_invalidates() {
    let fx = fixture();
    fx.controller
        .load(counter_binding(1), "https://cdn.example/bundle")
        .await
        .unwrap();
    let dispatch_a = fx.factory.dispatch(0);

    let other = ComponentBinding::from_value(
        ComponentDescriptor::new("./Hello/index.js"),
        ScriptValue::object([("who", ScriptValue::from("Bob"))]),
    );
    fx.controller
        .load(other, "https://cdn.example/bundle")
        .await
        .unwrap();

    assert_eq!(fx.factory.created_count(), 2);
    assert_eq!(
        fx.controller.current_component().await.as_deref(),
        Some("./Hello/index.js")
    );

    // Every identifier registered by the first session now fails fast.
    assert!(dispatch_a.handle_blocking_call("blocking_1_0", "[]").is_none());
    let messages = fx.sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("does not belong to the current session"));
}

#[tokio::test]
async fn update_failure_falls_back_to_a_full_reload() {
    let fx = fixture();
    fx.controller
        .load(counter_binding(1), "https://cdn.example/bundle")
        .await
        .unwrap();

    fx.factory
        .runtime(0)
        .fail_eval
        .store(true, Ordering::SeqCst);

    fx.controller
        .load(counter_binding(2), "https://cdn.example/bundle")
        .await
        .unwrap();

    // The broken runtime was replaced rather than left inconsistent.
    assert_eq!(fx.factory.created_count(), 2);
    assert_eq!(fx.controller.phase(), SessionPhase::Ready);
    let (html, _) = &fx.factory.runtime(1).loads()[0];
    assert!(html.contains("\"count\":2"));

    // The replacement runs on a fresh epoch; the old session's ids are
    // gone.
    let dispatch = fx.controller.current_dispatch().await.unwrap();
    assert!(dispatch.handle_blocking_call("blocking_2_0", "[]").is_none());
    assert!(fx.sink.messages().is_empty());
    let dispatch_a = fx.factory.dispatch(0);
    dispatch_a.handle_blocking_call("blocking_1_0", "[]");
    assert!(!fx.sink.messages().is_empty());
}

#[tokio::test]
async fn a_failed_load_preserves_the_prior_ready_session() {
    let fx = fixture();
    fx.controller
        .load(counter_binding(1), "https://cdn.example/bundle")
        .await
        .unwrap();

    fx.factory.fail_next_load.store(true, Ordering::SeqCst);
    let other = ComponentBinding::from_value(
        ComponentDescriptor::new("./Hello/index.js"),
        ScriptValue::object([("who", ScriptValue::from("Bob"))]),
    );
    let err = fx
        .controller
        .load(other, "https://cdn.example/bundle")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Load(_)));

    // Prior session untouched: still current, still dispatching.
    assert_eq!(fx.controller.phase(), SessionPhase::Ready);
    assert_eq!(
        fx.controller.current_component().await.as_deref(),
        Some("./Counter/index.js")
    );
    let dispatch = fx.controller.current_dispatch().await.unwrap();
    dispatch.handle_blocking_call("blocking_1_0", "[]");
    assert!(fx.sink.messages().is_empty());
}

#[tokio::test]
async fn a_cancelled_load_publishes_nothing() {
    let fx = fixture();
    let (tx, rx) = oneshot::channel();
    *fx.factory.gate_next.lock().unwrap() = Some(rx);

    let controller = fx.controller.clone();
    let task = tokio::spawn(async move {
        controller
            .load(counter_binding(1), "https://cdn.example/bundle")
            .await
    });

    let controller = fx.controller.clone();
    wait_until(move || controller.phase() == SessionPhase::Loading).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    let controller = fx.controller.clone();
    wait_until(move || controller.phase() == SessionPhase::Empty).await;
    assert!(fx.controller.current_component().await.is_none());

    // The late completion signal lands nowhere.
    let _ = tx.send(());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(fx.controller.phase(), SessionPhase::Empty);
    assert!(fx.controller.current_component().await.is_none());

    // The controller is still usable afterwards.
    fx.controller
        .load(counter_binding(3), "https://cdn.example/bundle")
        .await
        .unwrap();
    assert_eq!(fx.controller.phase(), SessionPhase::Ready);
}

#[tokio::test]
async fn non_blocking_results_are_delivered_back_into_the_runtime() {
    let fx = fixture();
    let binding = ComponentBinding::from_value(
        counter_descriptor(),
        ScriptValue::object([(
            "onFetch",
            ScriptValue::non_blocking(|_args| Box::pin(async { Ok(Some("\"done\"".to_owned())) })),
        )]),
    );
    fx.controller
        .load(binding, "https://cdn.example/bundle")
        .await
        .unwrap();

    let dispatch = fx.controller.current_dispatch().await.unwrap();
    dispatch.handle_non_blocking_call("nonblocking_1_0", "t0", "[]");

    let runtime = fx.factory.runtime(0);
    wait_until(move || {
        runtime
            .evals()
            .iter()
            .any(|s| s == "globalThis.__tilekit.completeCall(\"t0\", \"done\");")
    })
    .await;
    assert!(fx.sink.messages().is_empty());
}

#[tokio::test]
async fn async_callable_failures_reach_the_error_channel_and_the_caller() {
    let fx = fixture();
    let binding = ComponentBinding::from_value(
        counter_descriptor(),
        ScriptValue::object([(
            "onFetch",
            ScriptValue::non_blocking(|_args| {
                Box::pin(async { Err(tilekit_codec::CallbackError::new("fetch refused")) })
            }),
        )]),
    );
    fx.controller
        .load(binding, "https://cdn.example/bundle")
        .await
        .unwrap();

    let dispatch = fx.controller.current_dispatch().await.unwrap();
    dispatch.handle_non_blocking_call("nonblocking_1_0", "t1", "[]");

    let runtime = fx.factory.runtime(0);
    wait_until(move || {
        runtime
            .evals()
            .iter()
            .any(|s| s.contains("failCall(\"t1\", \"fetch refused\")"))
    })
    .await;
    let messages = fx.sink.messages();
    assert!(messages.iter().any(|m| m.contains("fetch refused")));
}

#[tokio::test]
async fn superseding_tears_down_the_current_session() {
    let fx = fixture();
    fx.controller
        .load(counter_binding(1), "https://cdn.example/bundle")
        .await
        .unwrap();
    let dispatch = fx.controller.current_dispatch().await.unwrap();

    fx.controller.supersede().await;
    assert_eq!(fx.controller.phase(), SessionPhase::Superseded);
    assert!(fx.controller.current_component().await.is_none());

    dispatch.handle_blocking_call("blocking_1_0", "[]");
    assert!(!fx.sink.messages().is_empty());
}
