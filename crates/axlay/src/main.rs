//! Binary entrypoint for the `axlay` command-line tool.
use std::{io, path::PathBuf, process};

use clap::{Parser, Subcommand};
use logging as logshared;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*};

/// `check` subcommand.
mod check;
/// Errors surfaced by subcommands.
mod error;
/// `query` subcommand.
mod query;
/// `replay` subcommand.
mod replay;

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(
    name = "axlay",
    about = "Locate accessibility-tree elements and plan overlays",
    version
)]
/// Command-line interface for the `axlay` binary.
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,

    /// Logging controls
    #[command(flatten)]
    log: logshared::LogArgs,

    /// Optional path to the config file
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
/// Top-level CLI subcommands.
enum Command {
    /// Load and validate the configuration then exit.
    Check {
        /// Path to configuration file to check (defaults to ~/.axlay/config.ron)
        path: Option<PathBuf>,

        /// Dump the parsed configuration as JSON to stdout
        #[arg(long)]
        dump: bool,
    },
    /// Evaluate selectors against a tree dump.
    Query {
        /// JSON tree dump (a node, or a saved snapshot)
        #[arg(long, value_name = "FILE")]
        tree: PathBuf,

        /// Selectors such as `.text("Login").instance(-1)`
        #[arg(required = true)]
        selectors: Vec<String>,
    },
    /// Run one detection cycle over a tree dump and print what would be drawn.
    Replay {
        /// JSON tree dump (a node, or a saved snapshot)
        #[arg(long, value_name = "FILE")]
        tree: PathBuf,

        /// Package of the simulated window (defaults to the root node's package)
        #[arg(long)]
        package: Option<String>,

        /// Fully qualified activity of the simulated window
        #[arg(long)]
        activity: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let final_spec = cli.log.spec();
    tracing_subscriber::registry()
        .with(logshared::env_filter_from_spec(&final_spec))
        .with(fmt::layer().without_time().with_writer(io::stderr))
        .try_init()
        .ok();
    debug!(filter = %final_spec, "logging initialised");

    let result = match cli.command {
        Command::Check { path, dump } => {
            check::run(path.as_deref().or(cli.config.as_deref()), dump)
        }
        Command::Query { tree, selectors } => query::run(&tree, &selectors),
        Command::Replay {
            tree,
            package,
            activity,
        } => replay::run(&tree, cli.config.as_deref(), package, activity),
    };

    if let Err(e) = result {
        match &e {
            CliError::Config(c) => eprintln!("{}", c.pretty()),
            other => eprintln!("{other}"),
        }
        process::exit(1);
    }
}
