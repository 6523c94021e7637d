//! Application layer: batch reconciliation and the multi-region run.
//!
//! `reconciliation` and `chargebacks` turn fetched provider records into
//! ledger updates. `region_job` composes fetch and reconcile for one region
//! and always resolves to a result. `coordinator` fans jobs out over a
//! bounded pool and folds their results.

pub mod chargebacks;
pub mod coordinator;
pub mod reconciliation;
pub mod region_job;

pub use chargebacks::{ChargebackOutcome, ChargebackProcessor};
pub use coordinator::MultiRegionCoordinator;
pub use reconciliation::{ReconciliationEngine, ReconciliationOutcome};
pub use region_job::RegionSyncJob;
