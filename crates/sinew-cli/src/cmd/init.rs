//! `sw init` — create the store database and a starter config.

use std::io::Write;
use std::path::Path;

use clap::Args;
use serde::Serialize;

use sinew_core::config::{CONFIG_FILE_NAME, ProjectConfig};
use sinew_core::store::sqlite::SqliteStore;

use crate::output::{OutputMode, pretty_kv, render};

/// Arguments for `sw init`.
#[derive(Args, Debug, Default)]
pub struct InitArgs {}

#[derive(Debug, Serialize)]
struct InitOutput {
    ok: bool,
    store_path: String,
    config_path: String,
    config_created: bool,
}

/// Execute `sw init`.
pub fn run_init(
    _args: &InitArgs,
    output: OutputMode,
    config: &ProjectConfig,
    cwd: &Path,
) -> anyhow::Result<()> {
    let _store = SqliteStore::open(&config.store.path)?;

    let config_path = cwd.join(CONFIG_FILE_NAME);
    let config_created = if config_path.exists() {
        false
    } else {
        let starter = toml::to_string_pretty(&ProjectConfig::default())?;
        std::fs::write(&config_path, starter)?;
        true
    };

    let payload = InitOutput {
        ok: true,
        store_path: config.store.path.display().to_string(),
        config_path: config_path.display().to_string(),
        config_created,
    };

    render(output, &payload, |p, w| {
        pretty_kv(w, "store", &p.store_path)?;
        pretty_kv(w, "config", &p.config_path)?;
        if p.config_created {
            writeln!(w, "wrote starter {CONFIG_FILE_NAME}")?;
        }
        Ok(())
    })
}
