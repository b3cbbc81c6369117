#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sinew_core::config::ProjectConfig;
use sinew_core::schema::defaults;

use output::{OutputMode, resolve_output_mode};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "sinew: relationship schema and integrity engine",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Override the store database path from config.
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Create the store database and a starter config",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    sw init\n\n    # Emit machine-readable output\n    sw init --json"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        about = "Inspect and validate the relationship schema",
        after_help = "EXAMPLES:\n    # List all definitions\n    sw schema list\n\n    # Include derived reverse views\n    sw schema list --views\n\n    # Validate definitions and inverse pairing\n    sw schema validate"
    )]
    Schema(cmd::schema::SchemaArgs),

    #[command(
        about = "Run the integrity checker",
        after_help = "EXAMPLES:\n    # Check the whole schema\n    sw check\n\n    # Check one relationship with a tighter budget\n    sw check event_to_dj --limit 50"
    )]
    Check(cmd::check::CheckArgs),

    #[command(
        about = "Repair detected integrity issues",
        after_help = "EXAMPLES:\n    # See what would change\n    sw repair --dry-run\n\n    # Repair one relationship\n    sw repair event_to_dj"
    )]
    Repair(cmd::repair::RepairArgs),

    #[command(
        about = "Run the scheduled full-schema audit (persists the report)",
        after_help = "EXAMPLES:\n    # Full audit, e.g. from cron\n    sw audit --json"
    )]
    Audit(cmd::audit::AuditArgs),

    #[command(
        about = "Show the last persisted audit report",
        after_help = "EXAMPLES:\n    sw report"
    )]
    Report(cmd::report::ReportArgs),

    #[command(about = "Generate shell completions")]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Project config from the working directory upward, falling back to the
/// user-level config directory, then to defaults.
fn load_config(cwd: &std::path::Path) -> anyhow::Result<ProjectConfig> {
    if ProjectConfig::discover(cwd).is_some() {
        return ProjectConfig::load_or_default(cwd);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let user_config = config_dir.join("sinew").join(sinew_core::config::CONFIG_FILE_NAME);
        if user_config.is_file() {
            return ProjectConfig::load(&user_config);
        }
    }
    Ok(ProjectConfig::default())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = resolve_output_mode(cli.format, cli.json);

    let cwd = std::env::current_dir()?;
    let mut config = load_config(&cwd)?;
    if let Some(store_path) = &cli.store {
        config.store.path.clone_from(store_path);
    }
    tracing::debug!(store = %config.store.path.display(), "config resolved");

    // The registry is built once here and passed by handle to every command.
    // Collaborator crates would extend the builder before `build()`.
    let registry = defaults::registry();

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &config, &cwd),
        Commands::Schema(args) => match &args.command {
            cmd::schema::SchemaCommand::List(list_args) => {
                cmd::schema::run_list(list_args, output, &registry)
            }
            cmd::schema::SchemaCommand::Show(show_args) => {
                cmd::schema::run_show(show_args, output, &registry)
            }
            cmd::schema::SchemaCommand::Validate(validate_args) => {
                cmd::schema::run_validate(validate_args, output, &registry)
            }
        },
        Commands::Check(args) => cmd::check::run_check(args, output, &registry, &config),
        Commands::Repair(args) => cmd::repair::run_repair(args, output, &registry, &config),
        Commands::Audit(args) => cmd::audit::run_audit_cmd(args, output, &registry, &config),
        Commands::Report(args) => cmd::report::run_report(args, output, &config),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args, &mut command)
        }
    }
}
