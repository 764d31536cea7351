pub mod batches;
pub mod reservations;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{BatchService, ReservationService};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Container wiring every service to the shared pool and event channel.
#[derive(Clone)]
pub struct AppServices {
    pub batches: Arc<BatchService>,
    pub reservations: Arc<ReservationService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            batches: Arc::new(BatchService::new(db_pool.clone(), event_sender.clone())),
            reservations: Arc::new(ReservationService::new(db_pool, event_sender)),
        }
    }
}
