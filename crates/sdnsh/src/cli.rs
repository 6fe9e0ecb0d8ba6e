//! Clap derive structures for the `sdnsh` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Only
//! clap types appear here so the build script can include this file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sdnsh -- command shell for SDN controllers
#[derive(Debug, Parser)]
#[command(
    name = "sdnsh",
    version,
    about = "Query and configure an SDN controller from the command line",
    long_about = "Runs single shell operations against a controller's REST model API:\n\
        table and detail views, running-config, tab completion, argument\n\
        validation and user-data storage.",
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
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "SDNSH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller as host:port or http(s) URL (overrides profile)
    #[arg(long, short = 'c', env = "SDNSH_CONTROLLER", global = true)]
    pub controller: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "SDNSH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Force the netvirt feature on or off for running-config
    #[arg(long, global = true)]
    pub netvirt: Option<bool>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Show compound-key helper fields in detail views
    #[arg(long, global = true)]
    pub debug: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Shell-style fixed-width table (default)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
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
    /// Show rows of an object type as a table or detail view
    #[command(alias = "sh")]
    Show(ShowArgs),

    /// Show the configuration that recreates the controller's current state
    #[command(alias = "rc")]
    RunningConfig(RunningConfigArgs),

    /// List tab-completion candidates for a partial word
    Complete(CompleteArgs),

    /// Check a value against an argument type
    Validate(ValidateArgs),

    /// Manage versioned user-data files stored on the controller
    #[command(alias = "ud")]
    UserData(UserDataArgs),

    /// List the display formats known to the formatter
    Formats,

    /// Manage the sdnsh configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SHOW
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Object type (e.g. switches, host, flow-entry)
    pub obj_type: String,

    /// Filters as field=value; a trailing `*` matches a prefix
    pub filters: Vec<String>,

    /// Display format (defaults to the object type)
    #[arg(long, short = 'f')]
    pub format: Option<String>,

    /// Column view within the format
    #[arg(long, default_value = "default")]
    pub view: String,

    /// Render each row as a detail block instead of a table
    #[arg(long, short = 'd')]
    pub detail: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RUNNING-CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RunningConfigArgs {
    /// Section (or unique prefix) and optional object id
    pub words: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompleteArgs {
    #[command(subcommand)]
    pub command: CompleteCommand,
}

#[derive(Debug, Subcommand)]
pub enum CompleteCommand {
    /// Values of an object type's field
    Field {
        obj_type: String,
        field: String,
        /// Partial word (may be empty)
        #[arg(default_value = "")]
        text: String,
        /// Constrain candidates to rows matching field=value
        #[arg(long = "where")]
        filters: Vec<String>,
    },

    /// Values for a field taken from another object type
    From {
        obj_type: String,
        field: String,
        /// `obj-type` or `obj-type|field` supplying the values
        other: String,
        #[arg(default_value = "")]
        text: String,
    },

    /// Running-config section names
    RunningConfig {
        #[arg(default_value = "")]
        text: String,
    },

    /// Interface names of a switch, with range syntax
    Interfaces {
        /// Switch dpid or alias
        switch: String,
        #[arg(default_value = "")]
        text: String,
    },

    /// Saved configuration names
    Config {
        #[arg(default_value = "")]
        text: String,
    },

    /// Log names served by each reachable controller node
    Logs {
        #[arg(default_value = "")]
        text: String,
    },

    /// Static flow action syntax (works offline)
    FlowActions {
        #[arg(default_value = "")]
        text: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VALIDATE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Argument type
    pub kind: ValueKind,

    /// Value to check
    pub value: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ValueKind {
    Identifier,
    Cidr,
    Netmask,
    InverseNetmask,
    Ip,
    Mac,
    Dpid,
    Date,
    Duration,
    /// Switch dpid or alias known to the controller
    Switch,
    /// Host mac or alias known to the controller
    Host,
    /// Resolvable host name or ip address
    Address,
    /// Configuration source or destination
    Config,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  USER DATA
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct UserDataArgs {
    #[command(subcommand)]
    pub command: UserDataCommand,
}

#[derive(Debug, Subcommand)]
pub enum UserDataCommand {
    /// List stored files
    #[command(alias = "ls", disable_version_flag = true)]
    List {
        /// Only names starting with this prefix
        name: Option<String>,
        /// latest, all, or a version number
        #[arg(long, default_value = "latest")]
        version: String,
    },

    /// Print a stored file
    Get {
        name: String,
    },

    /// Store a local file as the next version of NAME
    Set {
        name: String,
        /// File to upload ("-" reads stdin)
        file: PathBuf,
    },

    /// Delete a stored file
    #[command(alias = "rm")]
    Delete {
        name: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Show the effective configuration
    Show,

    /// Create or update a profile
    Init {
        /// Controller as host:port or http(s) URL
        #[arg(long)]
        controller: String,
        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,
    },

    /// List configured profiles
    Profiles,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
