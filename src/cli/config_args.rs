//! Arguments for the read-only `config` subcommand.

use clap::Args;

/// Configuration inspection arguments.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Print the config file path instead of its contents
    #[arg(long)]
    pub path: bool,

    /// Dot-separated key to look up (e.g. `general.default_backend`);
    /// prints the whole configuration when omitted
    pub key: Option<String>,
}
