#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod api;
mod cli;
mod core;
mod ingest;
mod prelude;
mod quantity;
mod tables;

use clap::{Parser, crate_version};

use crate::{
    cli::{Args, Command},
    prelude::*,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    tracing_subscriber::fmt().without_time().compact().with_max_level(args.log_level()).init();
    info!(version = crate_version!(), "starting…");

    match args.command {
        Command::Analyze(args) => args.run().await?,
        Command::Simulate(args) => args.run()?,
        Command::Finance(args) => args.run()?,
    }

    info!("done!");
    Ok(())
}
