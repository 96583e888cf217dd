use crossbeam_channel::{Receiver, Sender, bounded};

/// Create a linked completion signal/watcher pair.
///
/// A nested (child) record holds the [`CompletionSignal`] end and fires it
/// exactly once, when the child transitions to done; whoever owns the parent
/// record holds the [`CompletionWatcher`] end. Root records hold neither.
pub fn completion_pair() -> (CompletionSignal, CompletionWatcher) {
    let (tx, rx) = bounded(1);
    (CompletionSignal { tx }, CompletionWatcher { rx })
}

/// One-shot completion notification a child record propagates upward.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    tx: Sender<()>,
}

impl CompletionSignal {
    /// Fire the signal. Idempotent and never blocks: repeat calls (or calls
    /// racing a full channel) are dropped.
    pub fn signal(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Observer end of a completion signal.
#[derive(Debug, Clone)]
pub struct CompletionWatcher {
    rx: Receiver<()>,
}

impl CompletionWatcher {
    /// Whether the signal has fired and not yet been consumed by [`wait`].
    ///
    /// [`wait`]: CompletionWatcher::wait
    pub fn is_signalled(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Block until the signal fires, consuming it. Returns immediately if it
    /// already fired, or if every signal end was dropped unsignalled.
    pub fn wait(&self) {
        let _ = self.rx.recv();
    }
}
