//! Clap derive structures for the `prefixmover` CLI.
//!
//! Defines the command tree, global flags, and shared types. Prefix values
//! stay strings here and are parsed by the command handlers.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// prefixmover -- evacuate tailnet devices from IPv4 prefixes
#[derive(Debug, Parser)]
#[command(
    name = "prefixmover",
    version,
    about = "Move tailnet devices out of IPv4 prefixes",
    long_about = "Moves every tailnet device whose primary IPv4 address lies inside one of\n\
        the given prefixes onto a random free address elsewhere in the\n\
        carrier-grade NAT block (100.64.0.0/10), or inside explicit destination\n\
        prefixes.\n\n\
        Credentials come from TAILSCALE_API_KEY / TAILSCALE_TAILNET, the config\n\
        file, or the system keyring.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Tailnet name
    #[arg(long, short = 't', env = "TAILSCALE_TAILNET", global = true)]
    pub tailnet: Option<String>,

    /// Tailscale API key
    #[arg(long, env = "TAILSCALE_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Control plane base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true, alias = "silent")]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Move devices out of the given prefixes
    #[command(alias = "move")]
    Evacuate(EvacuateArgs),

    /// Show the address pool new addresses are drawn from (offline)
    Pool(PoolArgs),

    /// List the devices an evacuation would move
    #[command(alias = "dev")]
    Devices(DevicesArgs),

    /// Inspect configuration and store credentials
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PrefixArgs {
    /// Prefixes to evacuate (comma-separated or repeated)
    #[arg(
        long = "prefixes",
        short = 'p',
        value_delimiter = ',',
        required = true,
        num_args = 1..,
        value_name = "CIDR"
    )]
    pub prefixes: Vec<String>,
}

#[derive(Debug, Args)]
pub struct DestinationArgs {
    /// Draw new addresses only from these prefixes
    #[arg(long = "to", value_delimiter = ',', num_args = 1.., value_name = "CIDR")]
    pub to: Vec<String>,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EvacuateArgs {
    #[command(flatten)]
    pub prefixes: PrefixArgs,

    #[command(flatten)]
    pub destinations: DestinationArgs,

    /// Attempts per device when the chosen address is already in use
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Keep reassigning the remaining devices after a failure
    #[arg(long)]
    pub continue_on_error: bool,

    /// Pick addresses but change nothing
    #[arg(long, short = 'n')]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct PoolArgs {
    #[command(flatten)]
    pub prefixes: PrefixArgs,

    #[command(flatten)]
    pub destinations: DestinationArgs,
}

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(flatten)]
    pub prefixes: PrefixArgs,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration (API key redacted)
    Show,

    /// Store the API key for the tailnet in the system keyring
    SetKey,

    /// Print the config file path
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
