use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tilekit_codec::{BlockingFn, CallbackError, EncodingContext, NonBlockingFn};

use crate::error::CallDispatchError;
use crate::id::{CallMode, CallbackId};

/// Receives the outcome of a non-blocking call and delivers it back to the
/// waiting script-side caller.
///
/// This is the extension point that closes the async round trip: the
/// session wires in a sink that resolves (or rejects) the pending promise
/// keyed by `token` inside the script runtime. Callable failures reach the
/// sink too, so they surface on the same channel as script-side errors
/// instead of being dropped.
pub trait CompletionSink: Send + Sync {
    fn deliver<'a>(
        &'a self,
        token: String,
        result: Result<Option<String>, CallbackError>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

struct BridgeState {
    superseded: bool,
    next_seq: u64,
    blocking: HashMap<u64, BlockingFn>,
    non_blocking: HashMap<u64, NonBlockingFn>,
    /// The script runtime is single-threaded; while a blocking call runs,
    /// no second one can legitimately arrive.
    blocking_in_flight: bool,
}

/// Per-session registry of host callables and the dispatch surface the
/// script runtime's glue calls into.
///
/// Identifiers are epoch-tagged: the session controller allocates a fresh
/// epoch per session, and dispatch rejects identifiers minted under any
/// other epoch (or after [`CallBridge::supersede`]) with
/// [`CallDispatchError::SessionSuperseded`]. Registering the same host
/// callable twice yields two independent identifiers; re-registration
/// happens every time properties are encoded, so no deduplication is
/// attempted.
pub struct CallBridge {
    epoch: u64,
    state: Mutex<BridgeState>,
}

impl CallBridge {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            state: Mutex::new(BridgeState {
                superseded: false,
                next_seq: 0,
                blocking: HashMap::new(),
                non_blocking: HashMap::new(),
                blocking_in_flight: false,
            }),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_superseded(&self) -> bool {
        self.state.lock().expect("bridge lock poisoned").superseded
    }

    /// Drop both registries atomically and refuse all further dispatches.
    ///
    /// In-flight stubs holding identifiers from this bridge fail fast with
    /// [`CallDispatchError::SessionSuperseded`] from now on.
    pub fn supersede(&self) {
        let mut state = self.state.lock().expect("bridge lock poisoned");
        state.superseded = true;
        state.blocking.clear();
        state.non_blocking.clear();
        tracing::debug!(epoch = self.epoch, "Call bridge superseded");
    }

    /// Invoke a blocking callable synchronously and return its JSON result.
    ///
    /// Runs on whatever thread delivers the script runtime's dispatch; a
    /// slow callable stalls the runtime's single thread, so long-running
    /// work belongs on the non-blocking path.
    pub fn dispatch_blocking(
        &self,
        id: &str,
        args_json: &str,
    ) -> Result<Option<String>, CallDispatchError> {
        let id = self.parse_current(id, CallMode::Blocking)?;

        let callback = {
            let mut state = self.lock_current(id)?;
            let callback = state
                .blocking
                .get(&id.seq)
                .cloned()
                .ok_or(CallDispatchError::SessionSuperseded(id))?;
            if state.blocking_in_flight {
                return Err(CallDispatchError::ReentrantBlockingCall(id));
            }
            state.blocking_in_flight = true;
            callback
        };

        tracing::debug!(callback = %id, "Dispatching blocking call");
        let result = callback(args_json);

        self.state
            .lock()
            .expect("bridge lock poisoned")
            .blocking_in_flight = false;

        result.map_err(|source| {
            tracing::warn!(callback = %id, error = %source, "Blocking callback failed");
            CallDispatchError::CallbackFailed { id, source }
        })
    }

    /// Dispatch a non-blocking callable on a separate task.
    ///
    /// `token` identifies the script-side pending promise. The callable's
    /// outcome — success or failure — is handed to `sink` once the future
    /// resolves; the dispatch itself returns as soon as the task is
    /// spawned, without blocking the runtime's thread.
    pub fn dispatch_non_blocking(
        &self,
        id: &str,
        token: &str,
        args_json: &str,
        sink: Arc<dyn CompletionSink>,
    ) -> Result<(), CallDispatchError> {
        let id = self.parse_current(id, CallMode::NonBlocking)?;

        let callback = {
            let state = self.lock_current(id)?;
            state
                .non_blocking
                .get(&id.seq)
                .cloned()
                .ok_or(CallDispatchError::SessionSuperseded(id))?
        };

        tracing::debug!(callback = %id, token, "Dispatching non-blocking call");
        let token = token.to_owned();
        let args = args_json.to_owned();
        tokio::spawn(async move {
            let result = callback(args).await;
            if let Err(source) = &result {
                tracing::warn!(callback = %id, error = %source, "Non-blocking callback failed");
            }
            sink.deliver(token, result).await;
        });
        Ok(())
    }

    fn parse_current(&self, id: &str, mode: CallMode) -> Result<CallbackId, CallDispatchError> {
        let parsed: CallbackId = id
            .parse()
            .map_err(|()| CallDispatchError::InvalidIdentifier(id.to_owned()))?;
        if parsed.mode != mode {
            return Err(CallDispatchError::InvalidIdentifier(id.to_owned()));
        }
        Ok(parsed)
    }

    fn lock_current(
        &self,
        id: CallbackId,
    ) -> Result<std::sync::MutexGuard<'_, BridgeState>, CallDispatchError> {
        let state = self.state.lock().expect("bridge lock poisoned");
        if state.superseded || id.epoch != self.epoch {
            return Err(CallDispatchError::SessionSuperseded(id));
        }
        Ok(state)
    }

    fn mint(&self, mode: CallMode) -> (CallbackId, std::sync::MutexGuard<'_, BridgeState>) {
        let mut state = self.state.lock().expect("bridge lock poisoned");
        let seq = state.next_seq;
        state.next_seq += 1;
        (
            CallbackId {
                epoch: self.epoch,
                mode,
                seq,
            },
            state,
        )
    }
}

impl EncodingContext for CallBridge {
    fn register_blocking(&self, callback: BlockingFn) -> String {
        let (id, mut state) = self.mint(CallMode::Blocking);
        if state.superseded {
            tracing::warn!(callback = %id, "Registration on a superseded bridge; stub will never dispatch");
        } else {
            state.blocking.insert(id.seq, callback);
        }
        drop(state);
        tracing::debug!(callback = %id, "Registered blocking callback");
        blocking_stub(&id)
    }

    fn register_non_blocking(&self, callback: NonBlockingFn) -> String {
        let (id, mut state) = self.mint(CallMode::NonBlocking);
        if state.superseded {
            tracing::warn!(callback = %id, "Registration on a superseded bridge; stub will never dispatch");
        } else {
            state.non_blocking.insert(id.seq, callback);
        }
        drop(state);
        tracing::debug!(callback = %id, "Registered non-blocking callback");
        non_blocking_stub(&id)
    }
}

/// Stub for a blocking callable: a synchronous round trip through the
/// runtime's single-argument host entry point, JSON args in, JSON result
/// out.
fn blocking_stub(id: &CallbackId) -> String {
    format!(
        "((...args) => {{\n\
         \tconst result = prompt('{id}', JSON.stringify(args));\n\
         \treturn result ? JSON.parse(result) : undefined;\n\
         }})"
    )
}

/// Stub for a non-blocking callable: posts the call keyed by a fresh token
/// and awaits the pending promise the host resolves through the completion
/// sink.
fn non_blocking_stub(id: &CallbackId) -> String {
    format!(
        "((...args) => new Promise((resolve, reject) => {{\n\
         \tconst token = globalThis.__tilekit.nextToken();\n\
         \tglobalThis.__tilekit.pending.set(token, {{ resolve, reject }});\n\
         \tglobalThis.__tilekit.post({{ callbackId: '{id}', token: token, args: JSON.stringify(args) }});\n\
         }}))"
    )
}
