use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BatchCreated {
        batch_id: i64,
        batch_code: String,
        volume_liters: f64,
        expiry_date: DateTime<Utc>,
    },
    BatchConsumed {
        batch_id: i64,
        qty: f64,
        order_id: Option<String>,
        available_liters: f64,
    },
    BatchReserved {
        batch_id: i64,
        reservation_id: i64,
        reserved_qty: f64,
        purpose: Option<String>,
    },
    ReservationReleased {
        batch_id: i64,
        reservation_id: i64,
        reserved_qty: f64,
    },
    BatchDeleted {
        batch_id: i64,
    },
}

/// Drains the event channel and logs each event. Runs until every sender
/// has been dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::BatchCreated {
                batch_id,
                batch_code,
                volume_liters,
                expiry_date,
            } => {
                info!(
                    batch_id,
                    batch_code,
                    volume_liters,
                    expiry_date = %expiry_date,
                    "Batch created"
                );
            }
            Event::BatchConsumed {
                batch_id,
                qty,
                order_id,
                available_liters,
            } => {
                info!(
                    batch_id,
                    qty,
                    order_id = order_id.as_deref().unwrap_or("-"),
                    available_liters,
                    "Batch consumed"
                );
            }
            Event::BatchReserved {
                batch_id,
                reservation_id,
                reserved_qty,
                ..
            } => {
                info!(batch_id, reservation_id, reserved_qty, "Batch reserved");
            }
            Event::ReservationReleased {
                batch_id,
                reservation_id,
                reserved_qty,
            } => {
                info!(
                    batch_id,
                    reservation_id, reserved_qty, "Reservation released"
                );
            }
            Event::BatchDeleted { batch_id } => {
                info!(batch_id, "Batch soft-deleted");
            }
        }
    }
    warn!("Event channel closed; event processor shutting down");
}
