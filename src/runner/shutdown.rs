use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancellation handle shared by every runner
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Ask every holder of this handle to stop
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `trigger` has been called on any clone
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // sender lives as long as self, so this only returns on trigger
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
