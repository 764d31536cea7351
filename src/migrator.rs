use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_batches_tables::Migration),
            Box::new(m20240101_000002_create_batch_reservations_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_batches_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_batches_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create batches table aligned with entities::batch::Model
            manager
                .create_table(
                    Table::create()
                        .table(Batches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Batches::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Batches::BatchCode).string().not_null())
                        .col(
                            ColumnDef::new(Batches::ReceivedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Batches::ExpiryDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Batches::ShelfLifeDays).integer().not_null())
                        .col(ColumnDef::new(Batches::VolumeLiters).double().not_null())
                        .col(ColumnDef::new(Batches::FatPercent).double().not_null())
                        .col(
                            ColumnDef::new(Batches::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Batches::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Batches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Batches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // The unique index covers soft-deleted rows too, so a code can
            // never be reused even after its batch is deleted.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batches_batch_code")
                        .table(Batches::Table)
                        .col(Batches::BatchCode)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batches_received_at")
                        .table(Batches::Table)
                        .col(Batches::ReceivedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batches_expiry_date")
                        .table(Batches::Table)
                        .col(Batches::ExpiryDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batches_deleted_at")
                        .table(Batches::Table)
                        .col(Batches::DeletedAt)
                        .to_owned(),
                )
                .await?;

            // Create consumption_records table aligned with
            // entities::consumption_record::Model
            manager
                .create_table(
                    Table::create()
                        .table(ConsumptionRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConsumptionRecords::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsumptionRecords::BatchId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ConsumptionRecords::Qty).double().not_null())
                        .col(ColumnDef::new(ConsumptionRecords::OrderId).string().null())
                        .col(
                            ColumnDef::new(ConsumptionRecords::ConsumedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_consumption_records_batch_id")
                                .from(ConsumptionRecords::Table, ConsumptionRecords::BatchId)
                                .to(Batches::Table, Batches::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_consumption_records_batch_id")
                        .table(ConsumptionRecords::Table)
                        .col(ConsumptionRecords::BatchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_consumption_records_order_id")
                        .table(ConsumptionRecords::Table)
                        .col(ConsumptionRecords::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_consumption_records_consumed_at")
                        .table(ConsumptionRecords::Table)
                        .col(ConsumptionRecords::ConsumedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ConsumptionRecords::Table).to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(Batches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Batches {
        Table,
        Id,
        BatchCode,
        ReceivedAt,
        ExpiryDate,
        ShelfLifeDays,
        VolumeLiters,
        FatPercent,
        Version,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ConsumptionRecords {
        Table,
        Id,
        BatchId,
        Qty,
        OrderId,
        ConsumedAt,
    }
}

mod m20240101_000002_create_batch_reservations_table {
    use super::m20240101_000001_create_batches_tables::Batches;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_batch_reservations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create batch_reservations table aligned with
            // entities::batch_reservation::Model
            manager
                .create_table(
                    Table::create()
                        .table(BatchReservations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BatchReservations::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BatchReservations::BatchId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BatchReservations::ReservedQty)
                                .double()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BatchReservations::Purpose).string().null())
                        .col(
                            ColumnDef::new(BatchReservations::ReservedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BatchReservations::ReleasedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_batch_reservations_batch_id")
                                .from(BatchReservations::Table, BatchReservations::BatchId)
                                .to(Batches::Table, Batches::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batch_reservations_batch_id")
                        .table(BatchReservations::Table)
                        .col(BatchReservations::BatchId)
                        .to_owned(),
                )
                .await?;

            // Active reservations are the ones with released_at IS NULL;
            // the index keeps the free-volume query cheap.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batch_reservations_released_at")
                        .table(BatchReservations::Table)
                        .col(BatchReservations::ReleasedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BatchReservations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BatchReservations {
        Table,
        Id,
        BatchId,
        ReservedQty,
        Purpose,
        ReservedAt,
        ReleasedAt,
    }
}

// Database migration CLI runner
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    let result = Migrator::up(&db, None).await;

    match result {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
