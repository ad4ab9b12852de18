//! Completion signal handed out by status reporters.

use tokio::sync::oneshot;

/// Resolves once a reporter has published its final observation.
///
/// Dropping the [`CompletionNotifier`] also resolves the signal, so a
/// reporter task that exits early can never leave an episode hanging.
#[derive(Debug)]
pub struct CompletionSignal {
    rx: oneshot::Receiver<()>,
    done: bool,
}

/// Sending half of a [`CompletionSignal`].
#[derive(Debug)]
pub struct CompletionNotifier {
    tx: oneshot::Sender<()>,
}

impl CompletionSignal {
    pub fn channel() -> (CompletionNotifier, CompletionSignal) {
        let (tx, rx) = oneshot::channel();
        (CompletionNotifier { tx }, CompletionSignal { rx, done: false })
    }

    /// A signal that is already resolved.
    pub fn completed() -> Self {
        let (notifier, signal) = Self::channel();
        notifier.complete();
        signal
    }

    /// Non-blocking check.
    pub fn is_complete(&mut self) -> bool {
        if !self.done {
            self.done = !matches!(self.rx.try_recv(), Err(oneshot::error::TryRecvError::Empty));
        }
        self.done
    }

    pub async fn wait(self) {
        if self.done {
            return;
        }
        // A closed channel counts as completion.
        let _ = self.rx.await;
    }
}

impl CompletionNotifier {
    pub fn complete(self) {
        let _ = self.tx.send(());
    }
}
