pub mod batch;
pub mod batch_reservation;
pub mod consumption_record;
