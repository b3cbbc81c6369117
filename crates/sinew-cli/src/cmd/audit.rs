//! `sw audit` — the scheduled full-schema run.
//!
//! Checks every forward relationship, persists the report under the
//! well-known state key, and notifies sinks when issues were found. An
//! operator cron invoking this weekly is the expected trigger.

use clap::Args;

use sinew_core::audit::{AuditSink, LogSink, run_audit};
use sinew_core::check::checker::CheckOptions;
use sinew_core::config::ProjectConfig;
use sinew_core::render::write_audit_report;
use sinew_core::schema::Registry;

use crate::cmd::open_existing_store;
use crate::output::{OutputMode, render};

/// Arguments for `sw audit`.
#[derive(Args, Debug, Default)]
pub struct AuditArgs {
    /// Maximum sources enumerated per relationship.
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Execute `sw audit`.
pub fn run_audit_cmd(
    args: &AuditArgs,
    output: OutputMode,
    registry: &Registry,
    config: &ProjectConfig,
) -> anyhow::Result<()> {
    let store = open_existing_store(config, output)?;
    let opts = CheckOptions {
        limit: args.limit.unwrap_or(config.audit.limit),
    };

    let log_sink = LogSink;
    let sinks: [&dyn AuditSink; 1] = [&log_sink];
    let report = run_audit(registry, &store, &opts, &sinks)?;

    render(output, &report, |r, w| write_audit_report(r, w))
}
