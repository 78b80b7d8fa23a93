use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::money;

/// Label shown in place of a blank donor name.
pub const ANONYMOUS_DONOR: &str = "Anonymous";

/// Longest accepted program name, in characters.
pub const PROGRAM_NAME_MAX_LEN: usize = 255;
/// Longest accepted program category, in characters.
pub const PROGRAM_CATEGORY_MAX_LEN: usize = 100;
/// Longest accepted donor name, in characters.
pub const DONOR_NAME_MAX_LEN: usize = 255;

/// A charitable program donations can be directed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Program {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub is_active: bool,
    pub start_date: Option<NaiveDate>,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A single donation, carrying the program it supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Donation {
    pub id: i64,
    pub program: Program,
    #[serde(serialize_with = "money::serialize")]
    pub amount: Decimal,
    pub donor_name: String,
    pub created_at: DateTime<Utc>,
}

impl Donation {
    /// Returns the donor name, or [`ANONYMOUS_DONOR`] when none was recorded.
    pub fn donor_display(&self) -> &str {
        if self.donor_name.is_empty() {
            ANONYMOUS_DONOR
        } else {
            &self.donor_name
        }
    }
}

impl fmt::Display for Donation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.donor_display(),
            money::format_fixed(self.amount)
        )
    }
}

/// Aggregate snapshot over all donations and programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactSummary {
    #[serde(serialize_with = "money::serialize")]
    pub total_amount: Decimal,
    pub donation_count: u64,
    pub active_programs: u64,
}

impl Default for ImpactSummary {
    fn default() -> Self {
        Self {
            total_amount: Decimal::ZERO,
            donation_count: 0,
            active_programs: 0,
        }
    }
}

/// Body returned by the liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

impl HealthStatus {
    pub const fn ok() -> Self {
        Self { status: "ok" }
    }
}
