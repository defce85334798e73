//! CLI module for service-commons
//!
//! Provides command-line interface parsing for the commons-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// commons-server - demo service for the service-commons startup wiring
#[derive(Parser, Debug)]
#[command(
    name = "commons-server",
    version,
    about = "Demo service for JWT bearer authentication and OpenAPI wiring",
    long_about = "Runs a small service wired with JWT bearer authentication, named\n\
                  authorization policies, optional CORS and OpenAPI documentation.\n\n\
                  Run without arguments to start the server.",
    after_help = "EXAMPLES:\n    \
                  commons-server                                  # Start the server (reads commons.toml)\n    \
                  commons-server serve --cors --policy Admin      # Enable CORS and an Admin policy\n    \
                  commons-server token --subject alice -p Admin   # Issue a token pair\n    \
                  commons-server check-token <TOKEN>              # Validate a token"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "commons.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve(ServeArgs),

    /// Issue an access/refresh token pair signed with the configured key
    Token {
        /// Subject (`sub` claim) of the tokens
        #[arg(short, long)]
        subject: String,

        /// Permission claim values; repeat for several
        #[arg(short, long = "permission")]
        permissions: Vec<String>,
    },

    /// Validate a token and print its claims
    CheckToken {
        /// The encoded JWT
        token: String,
    },

    /// Show the loaded configuration with secrets masked
    Config,
}

/// Options for `serve`
#[derive(clap::Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Disable JWT bearer authentication
    #[arg(long)]
    pub no_jwt: bool,

    /// Enable permissive CORS
    #[arg(long)]
    pub cors: bool,

    /// Authorization policy names; repeat for several
    #[arg(short, long = "policy")]
    pub policies: Vec<String>,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
