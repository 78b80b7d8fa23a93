//! HTTP surface of the TMS Foundation portal.

pub mod api;
pub mod problem;
pub mod router;
pub mod seeding;
pub mod summary;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

pub use router::{app_router, AppState};
