use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// mirror-admin: operator console for the mirror service
#[derive(Parser)]
#[command(name = "mirror-admin", version, about)]
pub struct Cli {
    /// Base URL of the mirror service
    #[arg(long, global = true, env = "MIRROR_ADMIN_URL")]
    pub server: Option<String>,

    /// Answer yes to every confirmation prompt
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(short, long)]
        username: Option<String>,
        /// Read from MIRROR_ADMIN_PASSWORD or prompted when omitted
        #[arg(long, env = "MIRROR_ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// One-time code, prompted when 2FA is enabled and this is omitted
        #[arg(long)]
        otp: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// Show whether a session is active
    Status,

    /// Inspect and edit the service configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Browse and manage the remote file store
    Files {
        #[command(subcommand)]
        command: FilesCommands,
    },

    /// Manage the IP blacklist
    Blacklist {
        #[command(subcommand)]
        command: BlacklistCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current configuration
    Show,
    /// Set a scalar field, e.g. `config set server_port 8080`
    Set { field: String, value: String },
    /// Manage the launcher list
    Launcher {
        #[command(subcommand)]
        command: LauncherCommands,
    },
    /// Change the admin password (prompted when omitted)
    Password { value: Option<String> },
    /// Set the upstream API token (prompted when omitted)
    GithubToken { value: Option<String> },
    /// Two-factor authentication
    #[command(name = "2fa")]
    TwoFactor {
        #[arg(value_enum)]
        action: TwoFactorAction,
    },
}

#[derive(Subcommand)]
pub enum LauncherCommands {
    /// Append a launcher
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        source_url: String,
        #[arg(long)]
        repo_selector: Option<String>,
    },
    /// Remove the launcher at a position shown by `config show`
    Rm { index: usize },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TwoFactorAction {
    Enable,
    Disable,
    Regenerate,
}

#[derive(Subcommand)]
pub enum FilesCommands {
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
    },
    /// Download a file
    Get {
        path: String,
        /// Directory to save into
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Upload a local file into a remote directory
    Put {
        file: PathBuf,
        #[arg(default_value = "")]
        dir: String,
    },
    /// Delete a file or directory
    Rm { path: String },
    /// Interactive browser
    Browse {
        #[arg(default_value = "")]
        path: String,
    },
}

#[derive(Subcommand)]
pub enum BlacklistCommands {
    /// List blocked addresses
    Ls,
    /// Block an address
    Add {
        ip: String,
        #[arg(short, long, default_value = "")]
        reason: String,
    },
    /// Unblock an address
    Rm { ip: String },
}
