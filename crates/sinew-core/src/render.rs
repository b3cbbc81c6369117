//! Report-to-text rendering.
//!
//! Pure presentation: turns checker and audit results into tabular rows and
//! summary blocks for administrative surfaces. No storage access, no
//! mutation — the same report always renders the same text.

use std::io::{self, Write};

use serde::Serialize;

use crate::audit::AuditReport;
use crate::check::checker::CheckSummary;
use crate::check::issue::Issue;

/// Shared width for human-facing separators.
pub const RULE_WIDTH: usize = 72;

/// One table row for an administrative surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    /// Severity label.
    pub severity: String,
    /// Relationship the issue belongs to.
    pub relationship: String,
    /// Source entity, `type:id`.
    pub source: String,
    /// Related id, or `-` when the issue is not about one id.
    pub related: String,
    /// Human message.
    pub message: String,
}

impl ReportRow {
    fn from_issue(issue: &Issue) -> Self {
        Self {
            severity: issue.severity.to_string(),
            relationship: issue.relationship.clone(),
            source: issue.source.to_string(),
            related: issue
                .related
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
            message: issue.message.clone(),
        }
    }
}

/// Column headers, in the same order as [`ReportRow`] fields.
pub const ROW_HEADERS: [&str; 5] = ["severity", "relationship", "source", "related", "message"];

/// Flatten a summary into table rows, in report order.
#[must_use]
pub fn summary_rows(summary: &CheckSummary) -> Vec<ReportRow> {
    summary.issues().map(ReportRow::from_issue).collect()
}

/// Write a horizontal separator.
///
/// # Errors
///
/// Propagates writer failure.
pub fn rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = RULE_WIDTH)
}

/// Write rows as an aligned table with a header line.
///
/// # Errors
///
/// Propagates writer failure.
pub fn write_table(rows: &[ReportRow], w: &mut dyn Write) -> io::Result<()> {
    let mut widths: Vec<usize> = ROW_HEADERS.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row_cells(row).into_iter().enumerate() {
            // The message column stays unpadded; it is last.
            if i < widths.len() - 1 {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    write_row(w, &widths, &ROW_HEADERS.map(ToString::to_string))?;
    for row in rows {
        write_row(w, &widths, &row_cells(row))?;
    }
    Ok(())
}

fn row_cells(row: &ReportRow) -> [String; 5] {
    [
        row.severity.clone(),
        row.relationship.clone(),
        row.source.clone(),
        row.related.clone(),
        row.message.clone(),
    ]
}

fn write_row(w: &mut dyn Write, widths: &[usize], cells: &[String; 5]) -> io::Result<()> {
    for (i, cell) in cells.iter().enumerate() {
        if i + 1 == cells.len() {
            writeln!(w, "{cell}")?;
        } else {
            write!(w, "{cell:<width$}  ", width = widths[i])?;
        }
    }
    Ok(())
}

/// Write the totals block for a summary.
///
/// # Errors
///
/// Propagates writer failure.
pub fn write_totals(summary: &CheckSummary, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{} issue(s): {} error(s), {} warning(s), {} info",
        summary.total_issues, summary.errors, summary.warnings, summary.info
    )?;
    for report in &summary.relationships {
        if report.issues_count > 0 {
            writeln!(
                w,
                "  {}: {} of {} source(s) affected issues={}",
                report.relationship,
                report
                    .issues
                    .iter()
                    .map(|i| &i.source)
                    .collect::<std::collections::HashSet<_>>()
                    .len(),
                report.sources_count,
                report.issues_count
            )?;
        }
    }
    Ok(())
}

/// Render a persisted audit report: header, totals, and the issue table.
///
/// # Errors
///
/// Propagates writer failure.
pub fn write_audit_report(report: &AuditReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "audit of {}", report.generated_at.to_rfc3339())?;
    writeln!(w, "fingerprint {}", report.fingerprint)?;
    rule(w)?;
    write_totals(&report.summary, w)?;
    if report.summary.total_issues > 0 {
        rule(w)?;
        write_table(&summary_rows(&report.summary), w)?;
    }
    Ok(())
}
