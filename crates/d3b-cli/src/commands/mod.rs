mod dewrangle;
mod faker;
mod postgres;
use self::dewrangle::DewrangleArgs;
use self::faker::FakerCommand;
use self::postgres::PostgresArgs;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Client for the Dewrangle API, fake Dewrangle data, and loading files into
/// Postgres
#[derive(Clone, Debug, Eq, Parser, PartialEq)]
#[command(version)]
pub(crate) struct Arguments {
    /// Minimum level of log messages to emit [default: $RUST_LOG or "info"]
    #[arg(short, long, global = true, value_name = "LEVEL")]
    log_level: Option<Level>,

    #[command(subcommand)]
    command: Command,
}

impl Arguments {
    pub(crate) fn init_tracing(&self) {
        let filter = match self.log_level {
            Some(level) => EnvFilter::new(level.as_str()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        };
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }

    pub(crate) fn run(self) -> anyhow::Result<()> {
        self.command.run()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Subcommand)]
enum Command {
    /// Query and modify Dewrangle organizations, studies, credentials,
    /// volumes, billing groups, jobs, and global IDs
    Dewrangle(DewrangleArgs),

    /// Generate fake data for testing against Dewrangle
    #[command(subcommand)]
    Faker(FakerCommand),

    /// Load files into a Postgres database
    Postgres(PostgresArgs),
}

impl Command {
    fn run(self) -> anyhow::Result<()> {
        match self {
            Command::Dewrangle(args) => args.run(),
            Command::Faker(cmd) => cmd.run(),
            Command::Postgres(args) => args.run(),
        }
    }
}

/// Write `value` to stdout as pretty JSON
fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    stdout.write_all(b"\n")?;
    Ok(())
}
