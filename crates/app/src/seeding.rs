use std::io::{self, Write};

use thiserror::Error;

use tms_portal_storage::{seed_demo_data, Database, SeedError, SeedReport};

#[derive(Debug, Error)]
pub enum SeedCommandError {
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error("failed to write seed progress: {0}")]
    Output(#[from] io::Error),
}

/// Runs the demo seed, writing one progress line per step to `out` and nothing else.
pub async fn run_seed<W: Write>(
    database: &Database,
    out: &mut W,
) -> Result<SeedReport, SeedCommandError> {
    let mut written: io::Result<()> = Ok(());
    let report = seed_demo_data(database, |line| {
        if written.is_ok() {
            written = writeln!(out, "{line}");
        }
    })
    .await?;
    written?;
    out.flush()?;
    Ok(report)
}
