pub mod chargeback;
pub mod date_range;
pub mod errors;
pub mod settlement;
pub mod sync_result;
