//! Domain types shared by the storage layer and the HTTP API.

pub mod money;
pub mod types;

pub use money::AmountError;
pub use types::{Donation, HealthStatus, ImpactSummary, Program};
