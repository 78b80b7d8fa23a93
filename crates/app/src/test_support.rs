use tempfile::TempDir;
use tms_portal_storage::Database;

/// Opens a migrated database in a fresh temporary directory.
///
/// The directory must outlive the database handle.
pub async fn setup_database() -> (Database, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("portal.db").display());
    let database = Database::connect(&url).await.expect("connect");
    database.run_migrations().await.expect("migrations");
    (database, dir)
}
