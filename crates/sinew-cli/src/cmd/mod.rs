//! Command handlers for the `sw` binary.

pub mod audit;
pub mod check;
pub mod completions;
pub mod init;
pub mod repair;
pub mod report;
pub mod schema;

use sinew_core::config::ProjectConfig;
use sinew_core::error::ErrorCode;
use sinew_core::store::sqlite::SqliteStore;

use crate::output::{CliError, OutputMode, render_error};

/// Open the configured store, refusing to create it implicitly.
///
/// Read-side commands go through here so a typo'd path fails with a clear
/// machine code instead of silently auditing an empty database.
pub(crate) fn open_existing_store(
    config: &ProjectConfig,
    output: OutputMode,
) -> anyhow::Result<SqliteStore> {
    if !config.store.path.exists() {
        render_error(
            output,
            &CliError::from_code(
                ErrorCode::NotInitialized,
                config.store.path.display().to_string(),
            ),
        )?;
        anyhow::bail!("store not initialized");
    }
    SqliteStore::open(&config.store.path)
}
