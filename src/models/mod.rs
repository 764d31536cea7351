pub mod batch_code;
pub mod ledger;

pub use batch_code::BatchCode;
pub use ledger::BatchLedger;
