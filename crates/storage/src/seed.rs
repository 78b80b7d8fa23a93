//! Demo fixtures: wipes both tables and loads a fixed set of programs and donations.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::{Database, DonationError, NewDonation, NewProgram, ProgramError};

struct ProgramFixture {
    name: &'static str,
    category: &'static str,
    description: &'static str,
}

struct DonationFixture {
    program: usize,
    amount_cents: i64,
    donor_name: &'static str,
}

const PROGRAMS: [ProgramFixture; 3] = [
    ProgramFixture {
        name: "Education for All",
        category: "Education",
        description: "Providing books and uniforms.",
    },
    ProgramFixture {
        name: "Clean Water Initiative",
        category: "Health",
        description: "Installing water filters in villages.",
    },
    ProgramFixture {
        name: "Youth Skill Development",
        category: "Livelihood",
        description: "Vocational training for youth.",
    },
];

// `program` indexes into PROGRAMS.
const DONATIONS: [DonationFixture; 5] = [
    DonationFixture {
        program: 0,
        amount_cents: 500_000,
        donor_name: "Amit Sharma",
    },
    DonationFixture {
        program: 0,
        amount_cents: 250_000,
        donor_name: "Priya Singh",
    },
    DonationFixture {
        program: 1,
        amount_cents: 1_000_000,
        donor_name: "Rahul Verma",
    },
    DonationFixture {
        program: 2,
        amount_cents: 750_000,
        donor_name: "Anjali Gupta",
    },
    DonationFixture {
        program: 1,
        amount_cents: 150_000,
        donor_name: "Anonymous",
    },
];

/// Counts of rows removed and inserted by a seed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub donations_deleted: u64,
    pub programs_deleted: u64,
    pub programs: usize,
    pub donations: usize,
}

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to seed programs: {0}")]
    Program(#[from] ProgramError),
    #[error("failed to seed donations: {0}")]
    Donation(#[from] DonationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Replaces all data with the demo fixtures.
///
/// Donations are removed before programs. Everything runs in one transaction,
/// so a failure leaves the previous contents in place. `progress` receives a
/// human readable line at each step.
pub async fn seed_demo_data<F>(
    database: &Database,
    mut progress: F,
) -> Result<SeedReport, SeedError>
where
    F: FnMut(&str),
{
    let programs_repo = database.programs();
    let donations_repo = database.donations();
    let mut tx = database.begin().await?;

    progress("Cleaning old data...");
    let donations_deleted = donations_repo.delete_all(&mut tx).await?;
    let programs_deleted = programs_repo.delete_all(&mut tx).await?;
    info!(
        stage = "seed",
        donations_deleted, programs_deleted, "cleared existing data"
    );

    progress("Creating programs...");
    let mut program_ids = Vec::with_capacity(PROGRAMS.len());
    for fixture in &PROGRAMS {
        let program = NewProgram::new(fixture.name, fixture.category)
            .with_description(fixture.description);
        let created = programs_repo.insert(&mut tx, &program).await?;
        program_ids.push(created.id);
    }

    progress("Creating donations...");
    for fixture in &DONATIONS {
        let donation = NewDonation::new(
            program_ids[fixture.program],
            Decimal::new(fixture.amount_cents, 2),
            fixture.donor_name,
        );
        donations_repo.insert(&mut tx, &donation).await?;
    }

    tx.commit().await?;
    progress("Success! Database populated.");
    info!(
        stage = "seed",
        programs = PROGRAMS.len(),
        donations = DONATIONS.len(),
        "demo data loaded"
    );

    Ok(SeedReport {
        donations_deleted,
        programs_deleted,
        programs: PROGRAMS.len(),
        donations: DONATIONS.len(),
    })
}
