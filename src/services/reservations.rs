use crate::{
    db::DbPool,
    entities::{
        batch::Entity as Batch,
        batch_reservation::{self, Entity as BatchReservation},
        consumption_record::{self, Entity as ConsumptionRecord},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::BatchLedger,
};
use chrono::Utc;
use sea_orm::{Set, TransactionError, TransactionTrait, *};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ReservationService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ReservationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Places a reservation against a batch's free volume.
    ///
    /// Runs under the batch row lock, the same lock consumption takes, so
    /// a reservation and a consumption can never both be admitted against
    /// the same liters. The check is against free volume: active
    /// reservations count against it, released ones do not.
    pub async fn reserve(
        &self,
        batch_id: i64,
        qty: f64,
        purpose: Option<String>,
    ) -> Result<batch_reservation::Model, ServiceError> {
        if !qty.is_finite() || qty <= 0.0 {
            return Err(ServiceError::ValidationError(format!(
                "Reservation qty must be positive, got {}",
                qty
            )));
        }

        let db = self.db_pool.as_ref();

        let reservation = db
            .transaction::<_, batch_reservation::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let batch = Batch::find_by_id(batch_id)
                        .lock_exclusive()
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or(ServiceError::BatchNotFound(batch_id))?;

                    if batch.is_deleted() {
                        return Err(ServiceError::BatchDeleted(batch_id));
                    }
                    if batch.is_expired() {
                        return Err(ServiceError::BatchExpired {
                            batch_id,
                            expiry_date: batch.expiry_date,
                        });
                    }

                    let consumptions = ConsumptionRecord::find()
                        .filter(consumption_record::Column::BatchId.eq(batch_id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let reservations = BatchReservation::find()
                        .filter(batch_reservation::Column::BatchId.eq(batch_id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let free =
                        BatchLedger::new(&batch, &consumptions, &reservations).free_liters();

                    if qty > free {
                        return Err(ServiceError::InsufficientVolume {
                            batch_id,
                            available: free,
                            requested: qty,
                        });
                    }

                    let reservation = batch_reservation::ActiveModel {
                        batch_id: Set(batch_id),
                        reserved_qty: Set(qty),
                        purpose: Set(purpose),
                        reserved_at: Set(Utc::now()),
                        released_at: Set(None),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    info!(
                        batch_id,
                        reservation_id = reservation.id,
                        qty,
                        free_after = free - qty,
                        "Reserved batch volume"
                    );

                    Ok(reservation)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send(Event::BatchReserved {
                batch_id,
                reservation_id: reservation.id,
                reserved_qty: reservation.reserved_qty,
                purpose: reservation.purpose.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(reservation)
    }

    /// Releases a reservation, returning its volume to the batch's free
    /// pool. Only the reservation row is locked; the batch lock is not
    /// needed because a release never shrinks free volume. Releasing an
    /// already-released reservation is rejected, and the second caller
    /// gets a conflict rather than a silent success.
    pub async fn release(
        &self,
        reservation_id: i64,
    ) -> Result<batch_reservation::Model, ServiceError> {
        let db = self.db_pool.as_ref();

        let released = db
            .transaction::<_, batch_reservation::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let reservation = BatchReservation::find_by_id(reservation_id)
                        .lock_exclusive()
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or(ServiceError::ReservationNotFound(reservation_id))?;

                    if !reservation.is_active() {
                        return Err(ServiceError::AlreadyReleased(reservation_id));
                    }

                    let mut active: batch_reservation::ActiveModel = reservation.into();
                    active.released_at = Set(Some(Utc::now()));
                    let released = active.update(txn).await.map_err(ServiceError::db_error)?;

                    info!(
                        reservation_id,
                        batch_id = released.batch_id,
                        qty = released.reserved_qty,
                        "Released reservation"
                    );

                    Ok(released)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send(Event::ReservationReleased {
                batch_id: released.batch_id,
                reservation_id: released.id,
                reserved_qty: released.reserved_qty,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(released)
    }

    /// All reservations placed against a batch, active and released,
    /// newest first. Soft-deleted batches keep their history readable.
    pub async fn list_for_batch(
        &self,
        batch_id: i64,
    ) -> Result<Vec<batch_reservation::Model>, ServiceError> {
        let db = self.db_pool.as_ref();

        Batch::find_by_id(batch_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or(ServiceError::BatchNotFound(batch_id))?;

        BatchReservation::find()
            .filter(batch_reservation::Column::BatchId.eq(batch_id))
            .order_by_desc(batch_reservation::Column::ReservedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }
}
