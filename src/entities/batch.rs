use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique business key, format SCH-YYYYMMDD-XXXX. The uniqueness
    /// constraint covers soft-deleted rows as well.
    #[sea_orm(unique)]
    pub batch_code: String,
    pub received_at: DateTime<Utc>,
    pub shelf_life_days: i32,
    /// Fixed at creation as received_at + shelf_life_days; never recomputed.
    pub expiry_date: DateTime<Utc>,
    #[sea_orm(column_type = "Double")]
    pub volume_liters: f64,
    #[sea_orm(column_type = "Double")]
    pub fat_percent: f64,
    /// Incremented on every consumption; read-side change counter only,
    /// write serialization comes from the row lock.
    pub version: i32,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::consumption_record::Entity")]
    ConsumptionRecords,
    #[sea_orm(has_many = "super::batch_reservation::Entity")]
    BatchReservations,
}

impl Related<super::consumption_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsumptionRecords.def()
    }
}

impl Related<super::batch_reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchReservations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// True once `expiry_date` lies strictly in the past (UTC comparison).
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expiry_date
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn batch(expiry: DateTime<Utc>, deleted: Option<DateTime<Utc>>) -> Model {
        let now = Utc::now();
        Model {
            id: 1,
            batch_code: "SCH-20251204-0001".into(),
            received_at: now,
            shelf_life_days: 7,
            expiry_date: expiry,
            volume_liters: 100.0,
            fat_percent: 3.5,
            version: 1,
            deleted_at: deleted,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn expiry_is_strictly_after_expiry_date() {
        assert!(batch(Utc::now() - Duration::seconds(1), None).is_expired());
        assert!(!batch(Utc::now() + Duration::days(1), None).is_expired());
    }

    #[test]
    fn deleted_flag_follows_deleted_at() {
        assert!(!batch(Utc::now(), None).is_deleted());
        assert!(batch(Utc::now(), Some(Utc::now())).is_deleted());
    }
}
