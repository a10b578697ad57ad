use tokio::sync::broadcast;

/// Trust-material lifecycle events, published when a document class is
/// replaced so dependent material can be re-fetched in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustEvent {
    RulesUpdated,
    IssuersUpdated,
}

/// Broadcast bus connecting the stores. Subscribers that lag simply miss
/// events; every event is a hint to re-check state, not a data carrier.
#[derive(Debug, Clone)]
pub struct TrustEventBus {
    tx: broadcast::Sender<TrustEvent>,
}

impl TrustEventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn publish(&self, event: TrustEvent) {
        // A send error only means there is no subscriber right now.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrustEvent> {
        self.tx.subscribe()
    }
}

impl Default for TrustEventBus {
    fn default() -> Self {
        Self::new()
    }
}
