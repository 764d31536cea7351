pub mod batches;
pub mod reservations;

pub use batches::BatchService;
pub use reservations::ReservationService;
