//! `sw completions` — shell completion scripts.

use clap::Args;
use clap_complete::Shell;

/// Arguments for `sw completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Execute `sw completions`.
pub fn run_completions(args: &CompletionsArgs, cmd: &mut clap::Command) -> anyhow::Result<()> {
    let bin_name = cmd.get_name().to_string();
    clap_complete::generate(args.shell, cmd, bin_name, &mut std::io::stdout());
    Ok(())
}
