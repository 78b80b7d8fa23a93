use thiserror::Error;

use tms_portal_core::types::ImpactSummary;
use tms_portal_storage::{Database, DonationError, ProgramError};

/// Computes the impact summary from three independent aggregate queries.
///
/// The queries do not share a transaction, so concurrent writes may produce a
/// snapshot that mixes before and after states.
pub async fn build_impact_summary(database: &Database) -> Result<ImpactSummary, SummaryError> {
    let donations = database.donations();

    let total_amount = donations.total_amount().await?;
    let donation_count = donations.count().await?;
    let active_programs = database.programs().count_active().await?;

    Ok(ImpactSummary {
        total_amount,
        donation_count,
        active_programs,
    })
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("failed to aggregate donations: {0}")]
    Donation(#[from] DonationError),
    #[error("failed to count programs: {0}")]
    Program(#[from] ProgramError),
}
