//! `sw repair` — repair detected integrity issues, optionally as a dry run.

use std::io::Write;

use clap::Args;
use serde::Serialize;

use sinew_core::config::ProjectConfig;
use sinew_core::error::ErrorCode;
use sinew_core::repair::{RepairEngine, RepairOptions, RepairReport};
use sinew_core::schema::Registry;

use crate::cmd::open_existing_store;
use crate::output::{CliError, OutputMode, render, render_error};

/// Arguments for `sw repair`.
#[derive(Args, Debug, Default)]
pub struct RepairArgs {
    /// Repair only this relationship (default: the whole schema).
    pub relationship: Option<String>,

    /// Decide every fix but skip the writes.
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum sources enumerated per relationship.
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RepairOutput {
    dry_run: bool,
    repaired: usize,
    failed: usize,
    reports: Vec<RepairReport>,
}

/// Execute `sw repair`.
pub fn run_repair(
    args: &RepairArgs,
    output: OutputMode,
    registry: &Registry,
    config: &ProjectConfig,
) -> anyhow::Result<()> {
    let store = open_existing_store(config, output)?;
    let engine = RepairEngine::new(registry, &store);
    let opts = RepairOptions {
        dry_run: args.dry_run,
        limit: args.limit.unwrap_or(config.audit.limit),
    };

    let reports: Vec<RepairReport> = match &args.relationship {
        Some(name) => {
            let Some(report) = engine.repair_relationship(name, &opts) else {
                render_error(
                    output,
                    &CliError::from_code(ErrorCode::UnknownRelationship, name.clone()),
                )?;
                anyhow::bail!("unknown relationship");
            };
            vec![report]
        }
        None => engine.repair_all(&opts),
    };

    let payload = RepairOutput {
        dry_run: opts.dry_run,
        repaired: reports.iter().map(|r| r.repaired.len()).sum(),
        failed: reports.iter().map(|r| r.failed.len()).sum(),
        reports,
    };

    render(output, &payload, |p, w| {
        let prefix = if p.dry_run { "would repair" } else { "repaired" };
        writeln!(w, "{prefix} {} issue(s), {} failed", p.repaired, p.failed)?;
        for report in &p.reports {
            for entry in &report.repaired {
                writeln!(
                    w,
                    "  {} {} {} {:?}",
                    report.relationship, entry.issue.kind, entry.issue.source, entry.action
                )?;
            }
            for entry in &report.failed {
                writeln!(
                    w,
                    "  {} {} {} FAILED: {}",
                    report.relationship, entry.issue.kind, entry.issue.source, entry.reason
                )?;
            }
        }
        Ok(())
    })
}
