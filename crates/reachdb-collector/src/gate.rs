//! One-shot barrier that holds collection back until startup work finishes.

use reachdb_core::CollectContext;
use tokio::sync::oneshot;

/// The waiting half. Consumed by the first wait.
#[derive(Debug)]
pub struct StartupGate {
    rx: Option<oneshot::Receiver<()>>,
}

/// The releasing half, handed to whatever must finish before collection.
#[derive(Debug)]
pub struct GateOpener {
    tx: oneshot::Sender<()>,
}

impl StartupGate {
    #[must_use]
    pub fn new() -> (GateOpener, Self) {
        let (tx, rx) = oneshot::channel();
        (GateOpener { tx }, Self { rx: Some(rx) })
    }

    /// A gate with nothing to wait for.
    #[must_use]
    pub fn ready() -> Self {
        Self { rx: None }
    }

    /// Waits until the gate is opened or its opener is dropped.
    ///
    /// Returns `false` if `ctx` is cancelled first.
    pub async fn wait(self, ctx: &CollectContext) -> bool {
        let Some(rx) = self.rx else {
            return true;
        };

        tokio::select! {
            biased;
            () = ctx.cancelled() => false,
            released = rx => {
                match released {
                    Ok(()) => tracing::debug!("startup gate opened"),
                    Err(_) => tracing::warn!(
                        "startup gate released without being opened; collecting anyway"
                    ),
                }
                true
            }
        }
    }
}

impl GateOpener {
    pub fn open(self) {
        // The receiver may already be gone if collection shut down first.
        let _ = self.tx.send(());
    }
}
