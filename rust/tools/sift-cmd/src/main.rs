use std::{io::Write, process};

use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::LevelFilter;

mod commands;

use commands::IndexArgs;

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Build and query a disk-resident full-text index")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the missing build stages (tokenize, sort, build)
    Build {
        #[command(flatten)]
        index: IndexArgs,
    },

    /// Evaluate a single query and print the ranked documents
    Query {
        #[command(flatten)]
        index: IndexArgs,

        /// Match documents containing any query term instead of all of them
        #[arg(long)]
        or: bool,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Query text
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Answer queries read line by line from stdin; `e` or `exit` quits
    Serve {
        #[command(flatten)]
        index: IndexArgs,

        /// Match documents containing any query term instead of all of them
        #[arg(long)]
        or: bool,

        /// Maximum number of results per query
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Print index metadata and tree statistics as JSON
    Inspect {
        #[command(flatten)]
        index: IndexArgs,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Build { index } => commands::build::run(index),
        Commands::Query {
            index,
            or,
            limit,
            query,
        } => commands::query::run(index, or, limit, query),
        Commands::Serve { index, or, limit } => commands::serve::run(index, or, limit),
        Commands::Inspect { index } => commands::inspect::run(index),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(commands::exit_code(&e));
    }
}
