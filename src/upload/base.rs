//! Upload base - state, progress accounting and event dispatch
//!
//! Drivers move bytes; the base only keeps books. Every byte mutation
//! recomputes progress and notifies progress listeners, state changes are
//! de-duplicated, and listeners run synchronously in subscription order.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::UploadOptions;
use crate::error::UploadResult;
use crate::form::FormInput;

use super::response::UploadResponse;

/// Lifecycle of a single upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    New,
    Started,
    Successful,
    Failed,
    /// Only reachable through the browser driver
    Aborted,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Started => "started",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed | Self::Aborted)
    }
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type StateListener = Arc<dyn Fn(&UploadBase, UploadState) + Send + Sync>;
pub type ProgressListener = Arc<dyn Fn(&UploadBase, f64) + Send + Sync>;
pub type ErrorListener = Arc<dyn Fn(&UploadBase) + Send + Sync>;

/// Event kinds a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    State,
    Progress,
    Error,
}

/// A subscription: the event kind together with its callback.
///
/// Identity is the callback's `Arc`; keep a clone to unsubscribe later.
#[derive(Clone)]
pub enum Listener {
    State(StateListener),
    Progress(ProgressListener),
    Error(ErrorListener),
}

impl Listener {
    pub fn state(f: impl Fn(&UploadBase, UploadState) + Send + Sync + 'static) -> Self {
        Self::State(Arc::new(f))
    }

    pub fn progress(f: impl Fn(&UploadBase, f64) + Send + Sync + 'static) -> Self {
        Self::Progress(Arc::new(f))
    }

    pub fn error(f: impl Fn(&UploadBase) + Send + Sync + 'static) -> Self {
        Self::Error(Arc::new(f))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::State(_) => EventKind::State,
            Self::Progress(_) => EventKind::Progress,
            Self::Error(_) => EventKind::Error,
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Listener::{:?}", self.kind())
    }
}

#[derive(Default)]
struct Listeners {
    state: Vec<StateListener>,
    progress: Vec<ProgressListener>,
    error: Vec<ErrorListener>,
}

fn add_unique<T: ?Sized>(set: &mut Vec<Arc<T>>, listener: Arc<T>) {
    if !set.iter().any(|l| Arc::ptr_eq(l, &listener)) {
        set.push(listener);
    }
}

fn remove<T: ?Sized>(set: &mut Vec<Arc<T>>, listener: &Arc<T>) {
    set.retain(|l| !Arc::ptr_eq(l, listener));
}

#[derive(Debug)]
struct Counters {
    state: UploadState,
    uploaded_bytes: u64,
    total_bytes: u64,
}

/// Shared bookkeeping for every driver
pub struct UploadBase {
    form: FormInput,
    url: String,
    headers: Vec<(String, String)>,
    method: String,
    with_credentials: bool,
    counters: Mutex<Counters>,
    listeners: Mutex<Listeners>,
}

impl std::fmt::Debug for UploadBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadBase")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("counters", &*self.lock_counters())
            .finish()
    }
}

impl UploadBase {
    /// Validate options and start in the `new` state
    pub fn new(options: UploadOptions) -> UploadResult<Self> {
        options.validate()?;

        let method = options.method_or_default().to_string();
        Ok(Self {
            form: options.form,
            url: options.url,
            headers: options.headers,
            method,
            with_credentials: options.with_credentials,
            counters: Mutex::new(Counters {
                state: UploadState::New,
                uploaded_bytes: 0,
                total_bytes: 0,
            }),
            listeners: Mutex::new(Listeners::default()),
        })
    }

    pub fn form(&self) -> &FormInput {
        &self.form
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Whether the caller supplied a header, compared case-insensitively
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn with_credentials(&self) -> bool {
        self.with_credentials
    }

    pub fn state(&self) -> UploadState {
        self.lock_counters().state
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.lock_counters().uploaded_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.lock_counters().total_bytes
    }

    /// Current upload progress. A float between 0 and 1.
    ///
    /// Reads 0 while the total is unknown, even if bytes were already counted.
    pub fn progress(&self) -> f64 {
        let counters = self.lock_counters();
        ratio(counters.uploaded_bytes, counters.total_bytes)
    }

    /// Subscribe a listener; subscribing the same listener twice is a no-op
    pub fn on(&self, listener: Listener) {
        let mut listeners = self.lock_listeners();
        match listener {
            Listener::State(l) => add_unique(&mut listeners.state, l),
            Listener::Progress(l) => add_unique(&mut listeners.progress, l),
            Listener::Error(l) => add_unique(&mut listeners.error, l),
        }
    }

    /// Unsubscribe a listener; unknown listeners are ignored
    pub fn off(&self, listener: &Listener) {
        let mut listeners = self.lock_listeners();
        match listener {
            Listener::State(l) => remove(&mut listeners.state, l),
            Listener::Progress(l) => remove(&mut listeners.progress, l),
            Listener::Error(l) => remove(&mut listeners.error, l),
        }
    }

    pub(crate) fn set_uploaded_bytes(&self, value: u64) {
        self.lock_counters().uploaded_bytes = value;
        self.emit_progress();
    }

    pub(crate) fn increase_uploaded_bytes(&self, delta: u64) {
        {
            let mut counters = self.lock_counters();
            counters.uploaded_bytes = counters.uploaded_bytes.saturating_add(delta);
        }
        self.emit_progress();
    }

    pub(crate) fn set_total_bytes(&self, value: u64) {
        self.lock_counters().total_bytes = value;
        self.emit_progress();
    }

    pub(crate) fn set_state(&self, value: UploadState) {
        let old = {
            let mut counters = self.lock_counters();
            std::mem::replace(&mut counters.state, value)
        };
        if old != value {
            debug!("Upload state {} -> {} ({})", old, value, self.url);
            self.emit_state(value);
        }
    }

    /// Move `new` to `started`; any other state is left alone
    pub(crate) fn mark_started(&self) {
        let changed = {
            let mut counters = self.lock_counters();
            if counters.state == UploadState::New {
                counters.state = UploadState::Started;
                true
            } else {
                false
            }
        };
        if changed {
            debug!("Upload state new -> started ({})", self.url);
            self.emit_state(UploadState::Started);
        }
    }

    /// Apply absolute transport progress unless the upload already settled.
    ///
    /// The terminal check and the counter update share one lock, so progress
    /// reported late by a transport never moves the counters after `aborted`
    /// or `failed`. Emits like `set_total_bytes` followed by
    /// `set_uploaded_bytes`. Returns false when the update was dropped.
    pub(crate) fn apply_transfer_progress(&self, loaded: u64, total: u64) -> bool {
        let emitted = {
            let mut counters = self.lock_counters();
            if counters.state.is_terminal() {
                return false;
            }
            let mut emitted = Vec::with_capacity(2);
            if counters.total_bytes != total {
                counters.total_bytes = total;
                emitted.push(ratio(counters.uploaded_bytes, total));
            }
            counters.uploaded_bytes = loaded;
            emitted.push(ratio(loaded, total));
            emitted
        };
        for progress in emitted {
            self.dispatch_progress(progress);
        }
        true
    }

    pub(crate) fn emit_error(&self) {
        let snapshot = self.lock_listeners().error.clone();
        for listener in snapshot {
            listener(self);
        }
    }

    fn emit_state(&self, state: UploadState) {
        let snapshot = self.lock_listeners().state.clone();
        for listener in snapshot {
            listener(self, state);
        }
    }

    fn emit_progress(&self) {
        self.dispatch_progress(self.progress());
    }

    fn dispatch_progress(&self, progress: f64) {
        let snapshot = self.lock_listeners().progress.clone();
        for listener in snapshot {
            listener(self, progress);
        }
    }

    fn lock_counters(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn ratio(uploaded: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        uploaded as f64 / total as f64
    }
}

/// Capability shared by every upload driver
pub trait Uploader: Send + Sync {
    /// Bookkeeping shared with listeners
    fn base(&self) -> &UploadBase;

    /// Start the upload and return its outcome.
    ///
    /// Work a driver can do without waiting happens in this call rather than
    /// on first poll, so `abort` right after `upload` reaches the transport.
    /// Call at most once per instance.
    fn upload(&self) -> BoxFuture<'_, UploadResult<UploadResponse>>;

    /// Cancel the transfer if the driver supports it.
    /// Safe to call in any state.
    fn abort(&self);

    fn state(&self) -> UploadState {
        self.base().state()
    }

    fn progress(&self) -> f64 {
        self.base().progress()
    }

    fn uploaded_bytes(&self) -> u64 {
        self.base().uploaded_bytes()
    }

    fn total_bytes(&self) -> u64 {
        self.base().total_bytes()
    }

    fn on(&self, listener: Listener) {
        self.base().on(listener)
    }

    fn off(&self, listener: &Listener) {
        self.base().off(listener)
    }
}
