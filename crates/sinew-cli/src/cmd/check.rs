//! `sw check` — run the integrity checker and print findings.

use clap::Args;

use sinew_core::check::checker::{CheckOptions, CheckSummary, IntegrityChecker};
use sinew_core::config::ProjectConfig;
use sinew_core::error::ErrorCode;
use sinew_core::render::{summary_rows, write_table, write_totals};
use sinew_core::schema::Registry;

use crate::cmd::open_existing_store;
use crate::output::{CliError, OutputMode, pretty_section, render, render_error};

/// Arguments for `sw check`.
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Check only this relationship (default: the whole schema).
    pub relationship: Option<String>,

    /// Maximum sources enumerated per relationship.
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Execute `sw check`.
pub fn run_check(
    args: &CheckArgs,
    output: OutputMode,
    registry: &Registry,
    config: &ProjectConfig,
) -> anyhow::Result<()> {
    let store = open_existing_store(config, output)?;
    let checker = IntegrityChecker::new(registry, &store);
    let opts = CheckOptions {
        limit: args.limit.unwrap_or(config.audit.limit),
    };

    let summary: CheckSummary = match &args.relationship {
        Some(name) => {
            let Some(report) = checker.check_relationship(name, &opts) else {
                render_error(
                    output,
                    &CliError::from_code(ErrorCode::UnknownRelationship, name.clone()),
                )?;
                anyhow::bail!("unknown relationship");
            };
            // Reuse the summary shape so all output modes stay uniform.
            CheckSummary::fold(vec![report])
        }
        None => checker.check_all(&opts),
    };

    render(output, &summary, |s, w| {
        write_totals(s, w)?;
        if s.total_issues > 0 {
            pretty_section(w, "issues")?;
            write_table(&summary_rows(s), w)?;
        }
        Ok(())
    })
}
