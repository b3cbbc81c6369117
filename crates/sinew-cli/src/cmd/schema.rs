//! `sw schema` — inspect and validate the relationship schema.
//!
//! Subcommands:
//! - `sw schema list` — table of registered definitions
//! - `sw schema show <name>` — one definition in full
//! - `sw schema validate` — local rules plus inverse pairing for every definition

use std::io::Write;

use clap::{Args, Subcommand};
use serde::Serialize;

use sinew_core::error::ErrorCode;
use sinew_core::schema::{Registry, RelationshipDef};

use crate::output::{CliError, OutputMode, pretty_rule, render, render_error};

#[derive(Args, Debug)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaCommand,
}

#[derive(Subcommand, Debug)]
pub enum SchemaCommand {
    #[command(about = "List registered relationship definitions")]
    List(SchemaListArgs),

    #[command(about = "Show one definition in full")]
    Show(SchemaShowArgs),

    #[command(about = "Validate every definition, including inverse pairing")]
    Validate(SchemaValidateArgs),
}

/// Arguments for `sw schema list`.
#[derive(Args, Debug, Default)]
pub struct SchemaListArgs {
    /// Also list the derived reverse views.
    #[arg(long)]
    pub views: bool,
}

/// Arguments for `sw schema show`.
#[derive(Args, Debug)]
pub struct SchemaShowArgs {
    /// Definition name.
    pub name: String,
}

/// Arguments for `sw schema validate`.
#[derive(Args, Debug, Default)]
pub struct SchemaValidateArgs {}

#[derive(Debug, Serialize)]
struct DefRow {
    name: String,
    cardinality: String,
    source: String,
    target: String,
    storage: String,
    storage_key: Option<String>,
    bidirectional: bool,
    queryable: bool,
}

impl DefRow {
    fn from_def(def: &RelationshipDef) -> Self {
        Self {
            name: def.name.clone(),
            cardinality: def.cardinality.to_string(),
            source: def.source.tags().join("|"),
            target: def.target.describe(),
            storage: def.storage.to_string(),
            storage_key: def.storage_key.clone(),
            bidirectional: def.bidirectional,
            queryable: def.queryable,
        }
    }
}

#[derive(Debug, Serialize)]
struct SchemaListOutput {
    definitions: Vec<DefRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reverse_views: Vec<sinew_core::schema::ReverseView>,
}

/// Execute `sw schema list`.
pub fn run_list(args: &SchemaListArgs, output: OutputMode, registry: &Registry) -> anyhow::Result<()> {
    let payload = SchemaListOutput {
        definitions: registry.all().map(DefRow::from_def).collect(),
        reverse_views: if args.views {
            registry.reverse_views()
        } else {
            Vec::new()
        },
    };

    render(output, &payload, |p, w| {
        for row in &p.definitions {
            writeln!(
                w,
                "{:<24} {:<13} {:>10} -> {:<16} {} {}",
                row.name,
                row.cardinality,
                row.source,
                row.target,
                row.storage,
                row.storage_key.as_deref().unwrap_or("-"),
            )?;
        }
        if !p.reverse_views.is_empty() {
            pretty_rule(w)?;
            for view in &p.reverse_views {
                writeln!(w, "{:<30} (reverse of {})", view.exposed_name, view.forward)?;
            }
        }
        Ok(())
    })
}

/// Execute `sw schema show`.
pub fn run_show(args: &SchemaShowArgs, output: OutputMode, registry: &Registry) -> anyhow::Result<()> {
    let Some(def) = registry.get(&args.name) else {
        render_error(
            output,
            &CliError::from_code(ErrorCode::UnknownRelationship, args.name.clone()),
        )?;
        anyhow::bail!("unknown relationship");
    };

    render(output, def, |d, w| {
        let json = serde_json::to_string_pretty(d)?;
        writeln!(w, "{json}")?;
        Ok(())
    })
}

#[derive(Debug, Serialize)]
struct ValidateRow {
    name: String,
    valid: bool,
    errors: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ValidateOutput {
    ok: bool,
    results: Vec<ValidateRow>,
}

/// Execute `sw schema validate`.
pub fn run_validate(
    _args: &SchemaValidateArgs,
    output: OutputMode,
    registry: &Registry,
) -> anyhow::Result<()> {
    let results: Vec<ValidateRow> = registry
        .validate_all()
        .into_iter()
        .map(|(name, v)| ValidateRow {
            name,
            valid: v.valid,
            errors: v.errors,
        })
        .collect();
    let ok = results.iter().all(|r| r.valid);
    let payload = ValidateOutput { ok, results };

    render(output, &payload, |p, w| {
        for row in &p.results {
            if row.valid {
                writeln!(w, "ok    {}", row.name)?;
            } else {
                writeln!(w, "FAIL  {}", row.name)?;
                for error in &row.errors {
                    writeln!(w, "        {error}")?;
                }
            }
        }
        Ok(())
    })?;

    if !ok {
        render_error(
            output,
            &CliError::from_code(ErrorCode::InvalidDefinition, "one or more definitions failed"),
        )?;
        anyhow::bail!("schema validation failed");
    }
    Ok(())
}
