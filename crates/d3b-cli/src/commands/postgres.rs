use crate::db::{
    DEFAULT_BATCH_SIZE, DbConnectionParams, SaveOptions, create_schema, save_file_to_db,
    upsert_user,
};
use clap::{Args, Subcommand};
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Args, Clone, Debug, Eq, PartialEq)]
pub(super) struct PostgresArgs {
    #[arg(long, env = "DB_HOST")]
    db_host: Option<String>,

    #[arg(long, env = "DB_PORT")]
    db_port: Option<String>,

    #[arg(long, env = "DB_NAME")]
    db_name: Option<String>,

    #[arg(long, env = "DB_USER")]
    db_user: Option<String>,

    #[arg(long, env = "DB_USER_PW", hide_env_values = true)]
    db_user_pw: Option<String>,

    #[command(subcommand)]
    command: PostgresCommand,
}

#[derive(Clone, Debug, Eq, PartialEq, Subcommand)]
enum PostgresCommand {
    /// Save a CSV file to a Postgres table, creating the table if needed
    SaveFileToDb {
        /// Number of rows to read from the file in one iteration
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: NonZeroUsize,

        /// Column forming part of the table's primary key (repeatable)
        #[arg(long = "primary-key", value_name = "COLUMN")]
        primary_key: Vec<String>,

        /// Overwrite rows whose primary key already exists
        #[arg(long, requires = "primary_key")]
        upsert_rows: bool,

        /// Path to the CSV file to save
        filepath: PathBuf,

        /// Name of the database schema
        schema_name: String,

        /// Name of the database table
        table_name: String,
    },

    /// Create a schema in the database
    CreateSchema { schema_name: String },

    /// Create a login user, or reset the password of an existing one
    UpsertUser {
        user: String,

        #[arg(long, env = "DB_NEW_USER_PW", hide_env_values = true)]
        password: String,
    },
}

impl PostgresArgs {
    pub(super) fn run(self) -> anyhow::Result<()> {
        let params = DbConnectionParams::new(
            self.db_user,
            self.db_user_pw,
            self.db_host,
            self.db_port,
            self.db_name,
        )?;
        let mut client = params.connect()?;
        match self.command {
            PostgresCommand::SaveFileToDb {
                batch_size,
                primary_key,
                upsert_rows,
                filepath,
                schema_name,
                table_name,
            } => {
                let options = SaveOptions {
                    batch_size,
                    primary_key,
                    upsert_rows,
                };
                let count =
                    save_file_to_db(&mut client, &filepath, &schema_name, &table_name, &options)?;
                tracing::info!(
                    "Saved {count} rows from {} to {schema_name}.{table_name}",
                    filepath.display()
                );
            }
            PostgresCommand::CreateSchema { schema_name } => {
                create_schema(&mut client, &schema_name)?;
            }
            PostgresCommand::UpsertUser { user, password } => {
                upsert_user(&mut client, &user, &password)?;
            }
        }
        Ok(())
    }
}
