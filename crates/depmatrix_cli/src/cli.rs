//! Command-line surface.

use clap::{Args, Parser, Subcommand};
use depmatrix_core::{AttributeId, HistoryEntryId, MatrixId, UserId, UserRole};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "depmatrix",
    version,
    about = "Manage triangular attribute dependency matrices"
)]
pub struct Cli {
    /// SQLite database file [env: DEPMATRIX_DB]
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Directory for rolling log files [env: DEPMATRIX_LOG_DIR]
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error [env: DEPMATRIX_LOG_LEVEL]
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Session token printed by `login`
    #[arg(long, global = true, env = "DEPMATRIX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the first admin account (only while no admin exists)
    InitAdmin(AccountArgs),
    /// Create a regular user account
    Register(AccountArgs),
    /// Log in and print a session token
    Login(LoginArgs),
    /// Revoke the current session token
    Logout,
    /// Show the user behind the current token
    Whoami,
    /// User administration (admin)
    #[command(subcommand)]
    Users(UserCommands),
    /// Matrix commands
    #[command(subcommand)]
    Matrix(MatrixCommands),
    /// Change history (admin)
    #[command(subcommand)]
    History(HistoryCommands),
}

#[derive(Debug, Args)]
pub struct AccountArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "DEPMATRIX_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long, env = "DEPMATRIX_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Subcommand)]
pub enum UserCommands {
    /// List all users
    List {
        #[arg(long)]
        json: bool,
    },
    /// Change a user's role
    SetRole { user_id: UserId, role: UserRole },
}

#[derive(Debug, Subcommand)]
pub enum MatrixCommands {
    /// List matrices
    List {
        #[arg(long)]
        json: bool,
    },
    /// Create a matrix (admin)
    Create(CreateMatrixArgs),
    /// Print a matrix with its totals
    Show {
        id: MatrixId,
        #[arg(long)]
        json: bool,
    },
    /// Unlock a matrix with its access keyword
    Unlock {
        id: MatrixId,
        #[arg(long)]
        keyword: String,
    },
    /// Flip one upper-triangle cell
    Toggle {
        id: MatrixId,
        row: AttributeId,
        column: AttributeId,
    },
    /// Record a submission snapshot
    Submit { id: MatrixId },
    /// Add an attribute row and its mirrored column (admin)
    AddAttribute {
        id: MatrixId,
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        /// Explicit attribute id; defaults to max + 1
        #[arg(long)]
        attribute_id: Option<AttributeId>,
    },
    /// Remove an attribute and its dependencies (admin)
    RemoveAttribute { id: MatrixId, attribute_id: AttributeId },
    /// Rename an attribute (admin)
    RenameAttribute {
        id: MatrixId,
        attribute_id: AttributeId,
        #[arg(long)]
        name: String,
    },
    /// Edit title, description or keyword (admin)
    EditInfo(EditInfoArgs),
    /// Print the access keyword to share with users (admin)
    Share { id: MatrixId },
    /// Delete a matrix (admin)
    Delete { id: MatrixId },
}

#[derive(Debug, Args)]
pub struct CreateMatrixArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long)]
    pub keyword: String,
    /// JSON file with `{rows, columns, dependencies}`; default rows otherwise
    #[arg(long, value_name = "PATH")]
    pub data_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct EditInfoArgs {
    pub id: MatrixId,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub keyword: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommands {
    /// List entries, newest first
    List {
        #[arg(long)]
        matrix: Option<MatrixId>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        json: bool,
    },
    /// Show one entry including its snapshot
    Show { id: HistoryEntryId },
    /// Delete one entry
    Delete { id: HistoryEntryId },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, MatrixCommands};
    use clap::{CommandFactory, Parser};

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_toggle_with_global_flags() {
        let cli = Cli::try_parse_from([
            "depmatrix",
            "matrix",
            "toggle",
            "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "1",
            "3",
            "--db",
            "/tmp/test.sqlite3",
            "--token",
            "abc",
        ])
        .unwrap();

        assert_eq!(cli.token.as_deref(), Some("abc"));
        match cli.command {
            Commands::Matrix(MatrixCommands::Toggle { row, column, .. }) => {
                assert_eq!((row, column), (1, 3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_matrix_id() {
        assert!(Cli::try_parse_from(["depmatrix", "matrix", "show", "not-a-uuid"]).is_err());
    }
}
