//! `sw report` — display the last persisted full-schema audit.

use clap::Args;

use sinew_core::audit::load_last_report;
use sinew_core::config::ProjectConfig;
use sinew_core::render::write_audit_report;

use crate::cmd::open_existing_store;
use crate::output::{CliError, OutputMode, render, render_error};

/// Arguments for `sw report`.
#[derive(Args, Debug, Default)]
pub struct ReportArgs {}

/// Execute `sw report`.
pub fn run_report(
    _args: &ReportArgs,
    output: OutputMode,
    config: &ProjectConfig,
) -> anyhow::Result<()> {
    let store = open_existing_store(config, output)?;

    let Some(report) = load_last_report(&store)? else {
        render_error(
            output,
            &CliError::with_details(
                "no audit report persisted yet",
                "run `sw audit` to produce one",
                "no_report",
            ),
        )?;
        anyhow::bail!("no report");
    };

    render(output, &report, |r, w| write_audit_report(r, w))
}
