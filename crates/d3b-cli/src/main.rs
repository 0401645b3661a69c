mod api;
mod commands;
mod db;
mod faker;
mod ids;
mod output;
mod queries;
mod types;
use crate::commands::Arguments;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Settings such as DEWRANGLE_BASE_URL may live in a `.env` file.
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        eprintln!("Warning: failed to load .env file: {err}");
    }
    let args = Arguments::parse();
    args.init_tracing();
    args.run()
}
