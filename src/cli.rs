use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "branchbox",
    version,
    about = "Isolated per-branch development environments"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Use a specific config file
    #[arg(short = 'c', long = "config", global = true, env = "BRANCHBOX_CONFIG")]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create (or resume) the environment for a branch of a repository
    Create {
        /// Branch to check out
        branch: String,
        /// Repository path (defaults to the current directory)
        #[arg(long)]
        repo: Option<PathBuf>,
    },
    /// Create an environment for a new branch based on an existing one
    Branch {
        /// Source environment name
        environment: String,
        /// Name of the new branch
        new_branch: String,
    },
    /// Start a stopped environment
    Start {
        /// Environment name
        environment: String,
    },
    /// Stop a running environment
    Stop {
        /// Environment name
        environment: String,
    },
    /// List environments
    #[command(alias = "ls")]
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Serve the HTTP API
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
