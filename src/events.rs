use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CheckoutStarted { session_id: String },
    CheckoutUpdated { session_id: String },
    CheckoutCompleted { session_id: String, order_id: String },
    CheckoutCanceled { session_id: String },
    PaymentFailed { session_id: String, order_id: String, reason: String },
}

#[derive(Clone)]
pub struct EventSender {
    tx: tokio::sync::mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: tokio::sync::mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: Event) -> Result<(), anyhow::Error> {
        self.tx.send(event).await?;
        Ok(())
    }
}
