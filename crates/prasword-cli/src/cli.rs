//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Encrypted password store on SQLite or PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "prasword")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding prasword.json and the settings vault
    #[arg(short = 'D', long, env = "PRASWORD_DATA_DIR", default_value = ".", global = true)]
    pub data_dir: PathBuf,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Use the SQLite database at this path
    #[arg(long, global = true, conflicts_with = "profile")]
    pub db: Option<PathBuf>,

    /// Use a saved connection profile
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Master password of the credential database
    #[arg(long, env = "PRASWORD_MASTER_PASSWORD", hide_env_values = true, global = true)]
    pub master_password: Option<String>,

    /// Password of the settings vault holding connection profiles
    #[arg(long, env = "PRASWORD_VAULT_PASSWORD", hide_env_values = true, global = true)]
    pub vault_password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage saved connection profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Initialise a new credential database
    Init,
    /// Manage folders
    #[command(subcommand)]
    Folder(FolderCommand),
    /// Manage password entries
    #[command(subcommand)]
    Entry(EntryCommand),
    /// Re-encrypt the database under a new master password
    ChangePassword(ChangePasswordArgs),
    /// Print a random password
    Generate(GenerateArgs),
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Save a SQLite database location
    AddSqlite {
        /// Profile name
        name: String,
        /// Database file
        path: PathBuf,
        /// Also store the master password in the vault
        #[arg(long)]
        remember_master: bool,
    },
    /// Save a PostgreSQL connection
    AddPostgres(AddPostgresArgs),
    /// List saved profiles
    List,
    /// Delete a saved profile
    Remove {
        /// Profile name
        name: String,
    },
    /// Check that a saved profile's database is reachable
    Test {
        /// Profile name
        name: String,
    },
    /// Delete every saved profile and start an empty vault
    Reset {
        /// Confirm that all saved profiles are lost
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct AddPostgresArgs {
    /// Profile name
    pub name: String,

    /// Server host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Server port
    #[arg(long, default_value_t = 5432)]
    pub port: u16,

    /// Database name
    #[arg(long)]
    pub database: String,

    /// Login role
    #[arg(long)]
    pub user: String,

    /// Login password
    #[arg(long, env = "PRASWORD_PG_PASSWORD", hide_env_values = true)]
    pub pg_password: String,

    /// Also store the master password in the vault
    #[arg(long)]
    pub remember_master: bool,
}

// ---------------------------------------------------------------------------
// Folders
// ---------------------------------------------------------------------------

#[derive(Subcommand, Debug)]
pub enum FolderCommand {
    /// List folders
    List,
    /// Create a folder
    Add {
        /// Folder name
        name: String,
        /// Hex color, e.g. #e74c3c
        #[arg(long)]
        color: Option<String>,
        /// Image file to use as icon
        #[arg(long)]
        icon: Option<PathBuf>,
    },
    /// Change a folder
    Update {
        /// Folder id
        id: i64,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New hex color
        #[arg(long)]
        color: Option<String>,
        /// New icon image file
        #[arg(long)]
        icon: Option<PathBuf>,
    },
    /// Delete a folder, moving its entries elsewhere
    Delete {
        /// Folder id
        id: i64,
        /// Folder that receives the entries
        #[arg(long, default_value_t = 1)]
        move_to: i64,
    },
    /// Show how many entries each folder holds
    Counts,
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Subcommand, Debug)]
pub enum EntryCommand {
    /// Add an entry
    Add(EntryFields),
    /// List entries
    List {
        /// Only entries in this folder
        #[arg(long)]
        folder: Option<i64>,
    },
    /// Show one entry
    Show {
        /// Entry id
        id: i64,
        /// Print the password instead of masking it
        #[arg(long)]
        reveal: bool,
    },
    /// Change an entry
    Update {
        /// Entry id
        id: i64,
        #[command(flatten)]
        fields: EntryFields,
    },
    /// Delete an entry
    Delete {
        /// Entry id
        id: i64,
    },
    /// Find entries by title, username, url or folder name
    Search {
        /// Text to look for, case-insensitive
        term: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct EntryFields {
    /// Title
    #[arg(long)]
    pub title: Option<String>,
    /// Username
    #[arg(long)]
    pub username: Option<String>,
    /// Password
    #[arg(long = "secret", env = "PRASWORD_ENTRY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Generate a random password instead of passing one
    #[arg(long, conflicts_with = "password")]
    pub generate: bool,
    /// Website address
    #[arg(long)]
    pub url: Option<String>,
    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,
    /// Folder id
    #[arg(long)]
    pub folder: Option<i64>,
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct ChangePasswordArgs {
    /// New master password
    #[arg(long, env = "PRASWORD_NEW_MASTER_PASSWORD", hide_env_values = true)]
    pub new_password: String,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Password length
    #[arg(short, long, default_value_t = prasword_crypto_core::DEFAULT_PASSWORD_LENGTH)]
    pub length: usize,
    /// Leave out uppercase letters
    #[arg(long)]
    pub no_uppercase: bool,
    /// Leave out lowercase letters
    #[arg(long)]
    pub no_lowercase: bool,
    /// Leave out digits
    #[arg(long)]
    pub no_digits: bool,
    /// Leave out symbols
    #[arg(long)]
    pub no_symbols: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_options_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "prasword",
            "entry",
            "list",
            "--db",
            "/tmp/p.db",
            "--folder",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.global.db, Some(PathBuf::from("/tmp/p.db")));
        assert!(matches!(
            cli.command,
            Command::Entry(EntryCommand::List { folder: Some(3) })
        ));
    }

    #[test]
    fn db_and_profile_conflict() {
        let result = Cli::try_parse_from([
            "prasword", "--db", "a.db", "--profile", "home", "folder", "list",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn folder_delete_defaults_to_general() {
        let cli = Cli::try_parse_from(["prasword", "folder", "delete", "4"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Folder(FolderCommand::Delete { id: 4, move_to: 1 })
        ));
    }

    #[test]
    fn generate_and_secret_conflict() {
        let result = Cli::try_parse_from([
            "prasword", "entry", "add", "--title", "x", "--secret", "y", "--generate",
        ]);
        assert!(result.is_err());
    }
}
