use crate::signal::CompletionSignal;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

/// Lifecycle of a request log record.
///
/// Monotonic: `Unstarted → Started → Done`, never backward. `Done` is
/// permanent and gates every mutation except the documented serialization
/// format exception (see `RequestLog::set_serialization_format`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Unstarted,
    Started,
    Done,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Unstarted => "unstarted",
            LifecycleState::Started => "started",
            LifecycleState::Done => "done",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const UNSTARTED: u8 = 0;
const STARTED: u8 = 1;
const DONE: u8 = 2;

/// Shared completion state machine every record kind embeds.
///
/// One atomic state word carries the whole lifecycle; transitions are
/// compare-and-set (start) or swap (done), so exactly one of N racing
/// callers performs each transition and the rest observe a clean loss —
/// no lost updates, no partially applied transitions.
///
/// The attribute bag is internally synchronized: pipeline writers and the
/// diagnostics reader may race freely.
pub struct LogCore {
    state: AtomicU8,
    start_time_millis: AtomicI64,
    attrs: DashMap<String, Value>,
}

impl LogCore {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(UNSTARTED),
            start_time_millis: AtomicI64::new(0),
            attrs: DashMap::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        match self.state.load(Ordering::Acquire) {
            UNSTARTED => LifecycleState::Unstarted,
            STARTED => LifecycleState::Started,
            _ => LifecycleState::Done,
        }
    }

    /// Attempt `Unstarted → Started`. Returns whether THIS call performed
    /// the transition; under N concurrent callers exactly one sees `true`.
    ///
    /// The winning call also records the start timestamp (UTC unix millis).
    pub fn try_start(&self) -> bool {
        let won = self
            .state
            .compare_exchange(UNSTARTED, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.start_time_millis
                .store(Utc::now().timestamp_millis(), Ordering::Release);
            tracing::trace!("record started");
        }
        won
    }

    pub fn is_started(&self) -> bool {
        self.state.load(Ordering::Acquire) >= STARTED
    }

    /// Pure state read; true once the record is frozen.
    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    /// Attempt `Started → Done` (or the degenerate `Unstarted → Done` for a
    /// record that was never started). Idempotent: only the first completing
    /// call returns `true`; no transition ever leaves `Done`.
    pub fn mark_done(&self) -> bool {
        self.state.swap(DONE, Ordering::AcqRel) != DONE
    }

    /// UTC unix millis of the start transition; `0` while unstarted.
    pub fn start_time_millis(&self) -> i64 {
        self.start_time_millis.load(Ordering::Acquire)
    }

    /// Insert or overwrite an attribute. Silently dropped once done — late
    /// racing writers are expected and benign, not an error.
    pub fn set_attr(&self, key: impl Into<String>, value: Value) {
        if self.is_done() {
            tracing::trace!("attribute write after done dropped");
            return;
        }
        self.attrs.insert(key.into(), value);
    }

    pub fn attr(&self, key: &str) -> Option<Value> {
        self.attrs.get(key).map(|entry| entry.value().clone())
    }

    /// Point-in-time snapshot of stored attributes whose key passes
    /// `filter`. Finite, restartable, never mutates, and never holds map
    /// locks across caller code.
    pub fn attrs(&self, filter: impl Fn(&str) -> bool) -> Vec<(String, Value)> {
        self.attrs
            .iter()
            .filter(|entry| filter(entry.key()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Lifecycle half of the diagnostic line: state, then start timestamp
    /// (`<unset>` before the start transition). Must never panic.
    pub(crate) fn append_summary(&self, buf: &mut String) {
        let _ = write!(buf, "state={}", self.state());
        let start = self.start_time_millis();
        if start > 0 {
            let _ = write!(buf, ", start={start}");
        } else {
            buf.push_str(", start=<unset>");
        }
    }
}

impl Default for LogCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability interface a record kind plugs into the shared [`LogCore`]:
/// field formatting, attribute filtering, and parent linkage. One state
/// machine, many record kinds — no inheritance tree.
pub trait RecordKind {
    fn core(&self) -> &LogCore;

    /// Append kind-specific fields to the diagnostic line, after the
    /// lifecycle summary. Must not panic for unset fields.
    fn append_fields(&self, buf: &mut String);

    /// Whether `key` may appear in attribute enumeration and diagnostics.
    fn include_attr(&self, _key: &str) -> bool {
        true
    }

    /// Completion handle of the ancestor record, for kinds that nest inside
    /// another record (retries, decorated calls). Root kinds return `None`.
    fn parent_signal(&self) -> Option<&CompletionSignal> {
        None
    }

    fn is_done(&self) -> bool {
        self.core().is_done()
    }

    /// Freeze the record. Idempotent under concurrent calls; the one call
    /// that performs the transition also fires the parent's completion
    /// signal when this kind is linked to an ancestor.
    fn mark_done(&self) {
        if self.core().mark_done() {
            if let Some(signal) = self.parent_signal() {
                signal.signal();
            }
            tracing::debug!("record done");
        }
    }

    fn set_attr(&self, key: impl Into<String>, value: Value) {
        self.core().set_attr(key, value);
    }

    /// Attributes passing both the kind's own [`include_attr`] policy and
    /// the caller's `filter`.
    ///
    /// [`include_attr`]: RecordKind::include_attr
    fn attrs(&self, filter: impl Fn(&str) -> bool) -> Vec<(String, Value)> {
        self.core()
            .attrs(|key| self.include_attr(key) && filter(key))
    }

    /// One-line diagnostic summary: lifecycle summary first, then the
    /// kind's fields in their fixed order.
    fn diagnostics(&self) -> String {
        let mut buf = String::with_capacity(128);
        buf.push('{');
        self.core().append_summary(&mut buf);
        self.append_fields(&mut buf);
        buf.push('}');
        buf
    }
}
