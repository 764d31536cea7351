use crate::{
    db::DbPool,
    entities::{
        batch::{self, Entity as Batch},
        batch_reservation::{self, Entity as BatchReservation},
        consumption_record::{self, Entity as ConsumptionRecord},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::{BatchCode, BatchLedger},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{error::SqlErr, Set, TransactionError, TransactionTrait, *};
use std::sync::Arc;
use tracing::info;

/// Input for registering a newly received batch.
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub batch_code: BatchCode,
    /// Defaults to the current time when not given.
    pub received_at: Option<DateTime<Utc>>,
    pub shelf_life_days: i32,
    pub volume_liters: f64,
    pub fat_percent: f64,
}

/// A batch together with its derived volume figures. The figures are
/// computed from the ledger tables at read time, never stored.
#[derive(Debug, Clone)]
pub struct BatchDetails {
    pub batch: batch::Model,
    pub available_liters: f64,
    pub reserved_liters: f64,
    pub free_liters: f64,
}

/// Result of a successful consumption.
#[derive(Debug, Clone)]
pub struct ConsumptionOutcome {
    pub record: consumption_record::Model,
    pub batch: batch::Model,
    pub available_liters: f64,
}

#[derive(Clone)]
pub struct BatchService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl BatchService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Registers a new batch. The expiry date is fixed here as
    /// `received_at + shelf_life_days` and never recomputed afterwards.
    pub async fn create_batch(&self, input: NewBatch) -> Result<BatchDetails, ServiceError> {
        validate_new_batch(&input)?;

        let db = self.db_pool.as_ref();
        let now = Utc::now();
        let received_at = input.received_at.unwrap_or(now);
        let expiry_date = received_at + Duration::days(i64::from(input.shelf_life_days));

        let active = batch::ActiveModel {
            batch_code: Set(input.batch_code.to_string()),
            received_at: Set(received_at),
            shelf_life_days: Set(input.shelf_life_days),
            expiry_date: Set(expiry_date),
            volume_liters: Set(input.volume_liters),
            fat_percent: Set(input.fat_percent),
            version: Set(1),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let created = active.insert(db).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                ServiceError::DuplicateBatchCode(input.batch_code.to_string())
            } else {
                ServiceError::db_error(e)
            }
        })?;

        info!(
            batch_id = created.id,
            batch_code = %created.batch_code,
            volume_liters = created.volume_liters,
            "Registered new batch"
        );

        self.event_sender
            .send(Event::BatchCreated {
                batch_id: created.id,
                batch_code: created.batch_code.clone(),
                volume_liters: created.volume_liters,
                expiry_date: created.expiry_date,
            })
            .await
            .map_err(ServiceError::EventError)?;

        let volume = created.volume_liters;
        Ok(BatchDetails {
            batch: created,
            available_liters: volume,
            reserved_liters: 0.0,
            free_liters: volume,
        })
    }

    /// Fetches a single batch with its derived volumes. Soft-deleted
    /// batches are hidden unless `include_deleted` is set.
    pub async fn get_batch(
        &self,
        batch_id: i64,
        include_deleted: bool,
    ) -> Result<BatchDetails, ServiceError> {
        let db = self.db_pool.as_ref();

        let batch = Batch::find_by_id(batch_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or(ServiceError::BatchNotFound(batch_id))?;

        if batch.is_deleted() && !include_deleted {
            return Err(ServiceError::BatchNotFound(batch_id));
        }

        load_details(db, batch).await
    }

    /// Lists non-deleted batches, most recently created first, with
    /// derived volumes. Id breaks ties between same-instant creations.
    pub async fn list_batches(
        &self,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<BatchDetails>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let total = Batch::find()
            .filter(batch::Column::DeletedAt.is_null())
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;

        let batches = Batch::find()
            .filter(batch::Column::DeletedAt.is_null())
            .order_by_desc(batch::Column::CreatedAt)
            .order_by_desc(batch::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut details = Vec::with_capacity(batches.len());
        for batch in batches {
            details.push(load_details(db, batch).await?);
        }
        Ok((details, total))
    }

    /// Batches expiring within the next `days` days that still have
    /// volume left. Batches consumed down to zero are omitted even when
    /// their expiry falls inside the window. The window has no lower
    /// bound: already-expired batches with remaining volume are included.
    pub async fn near_expiry(&self, days: i64) -> Result<Vec<BatchDetails>, ServiceError> {
        let db = self.db_pool.as_ref();
        let horizon = Utc::now() + Duration::days(days);

        let batches = Batch::find()
            .filter(batch::Column::DeletedAt.is_null())
            .filter(batch::Column::ExpiryDate.lte(horizon))
            .order_by_asc(batch::Column::ExpiryDate)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut details = Vec::new();
        for batch in batches {
            let d = load_details(db, batch).await?;
            if d.available_liters > 0.0 {
                details.push(d);
            }
        }
        Ok(details)
    }

    /// Consumes `qty` liters from a batch.
    ///
    /// The batch row is locked for the duration of the transaction, so
    /// concurrent consumers serialize and each sees the ledger left by
    /// the previous one. Checks run in a fixed order: existence, then
    /// deletion, then expiry, then volume.
    pub async fn consume(
        &self,
        batch_id: i64,
        qty: f64,
        order_id: Option<String>,
    ) -> Result<ConsumptionOutcome, ServiceError> {
        if !qty.is_finite() || qty <= 0.0 {
            return Err(ServiceError::ValidationError(format!(
                "Consumption qty must be positive, got {}",
                qty
            )));
        }

        let db = self.db_pool.as_ref();

        let outcome = db
            .transaction::<_, ConsumptionOutcome, ServiceError>(move |txn| {
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

                    // Available volume is recomputed under the lock so it
                    // reflects every previously committed consumption.
                    let consumptions = ConsumptionRecord::find()
                        .filter(consumption_record::Column::BatchId.eq(batch_id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    let available = BatchLedger::new(&batch, &consumptions, &[]).available_liters();

                    if qty > available {
                        return Err(ServiceError::InsufficientVolume {
                            batch_id,
                            available,
                            requested: qty,
                        });
                    }

                    let now = Utc::now();
                    let record = consumption_record::ActiveModel {
                        batch_id: Set(batch_id),
                        qty: Set(qty),
                        order_id: Set(order_id),
                        consumed_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let mut active: batch::ActiveModel = batch.clone().into();
                    active.version = Set(batch.version + 1);
                    active.updated_at = Set(now);
                    let updated = active.update(txn).await.map_err(ServiceError::db_error)?;

                    info!(
                        batch_id,
                        qty,
                        available_after = available - qty,
                        "Consumed from batch"
                    );

                    Ok(ConsumptionOutcome {
                        record,
                        batch: updated,
                        available_liters: available - qty,
                    })
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send(Event::BatchConsumed {
                batch_id: outcome.batch.id,
                qty: outcome.record.qty,
                order_id: outcome.record.order_id.clone(),
                available_liters: outcome.available_liters,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(outcome)
    }

    /// Marks a batch deleted. Deliberately takes no batch lock: a consume
    /// racing with the delete may commit against the batch in its final
    /// moments, which is accepted.
    pub async fn soft_delete(&self, batch_id: i64) -> Result<batch::Model, ServiceError> {
        let db = self.db_pool.as_ref();

        let batch = Batch::find_by_id(batch_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or(ServiceError::BatchNotFound(batch_id))?;

        if batch.is_deleted() {
            return Err(ServiceError::AlreadyDeleted(batch_id));
        }

        let now = Utc::now();
        let mut active: batch::ActiveModel = batch.into();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        let deleted = active.update(db).await.map_err(ServiceError::db_error)?;

        info!(batch_id, "Soft-deleted batch");

        self.event_sender
            .send(Event::BatchDeleted { batch_id })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(deleted)
    }
}

fn validate_new_batch(input: &NewBatch) -> Result<(), ServiceError> {
    if !input.volume_liters.is_finite() || input.volume_liters <= 0.0 {
        return Err(ServiceError::ValidationError(format!(
            "volume_liters must be positive, got {}",
            input.volume_liters
        )));
    }
    if !input.fat_percent.is_finite() || !(0.0..=100.0).contains(&input.fat_percent) {
        return Err(ServiceError::ValidationError(format!(
            "fat_percent must be between 0 and 100, got {}",
            input.fat_percent
        )));
    }
    if !(1..=30).contains(&input.shelf_life_days) {
        return Err(ServiceError::ValidationError(format!(
            "shelf_life_days must be between 1 and 30, got {}",
            input.shelf_life_days
        )));
    }
    Ok(())
}

/// Computes the derived volumes for a batch outside any lock. Values may
/// be stale by the time the caller sees them; mutating paths recompute
/// under the batch lock instead.
pub(crate) async fn load_details<C: ConnectionTrait>(
    conn: &C,
    batch: batch::Model,
) -> Result<BatchDetails, ServiceError> {
    let consumptions = ConsumptionRecord::find()
        .filter(consumption_record::Column::BatchId.eq(batch.id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let reservations = BatchReservation::find()
        .filter(batch_reservation::Column::BatchId.eq(batch.id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let ledger = BatchLedger::new(&batch, &consumptions, &reservations);
    let available_liters = ledger.available_liters();
    let reserved_liters = ledger.reserved_liters();
    let free_liters = ledger.free_liters();

    Ok(BatchDetails {
        batch,
        available_liters,
        reserved_liters,
        free_liters,
    })
}
