use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

/// NDN client command-line interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Express one Interest and print the reply
    Peek {
        /// Name to request (NDN URI format)
        name: String,

        /// Interest lifetime in milliseconds
        #[clap(short, long, default_value = "4000")]
        lifetime: u64,

        /// Allow the Data name to extend the requested name
        #[clap(short, long)]
        prefix: bool,

        /// Require fresh Data
        #[clap(short, long)]
        fresh: bool,
    },

    /// Publish one Data packet read from stdin
    Poke {
        /// Name to publish under (NDN URI format)
        name: String,

        /// Freshness period in milliseconds
        #[clap(short = 'x', long, default_value = "10000")]
        freshness: u64,
    },

    /// Fetch a segmented object and write it to stdout
    Get {
        /// Name prefix of the object (NDN URI format)
        name: String,

        /// Stream segments to stdout as they arrive in order
        #[clap(short, long)]
        in_order: bool,
    },

    /// Register a prefix in the forwarder's RIB
    Register {
        /// Prefix to register (NDN URI format)
        prefix: String,

        /// Route cost
        #[clap(short, long, default_value = "0")]
        cost: u64,

        /// Do not set the ChildInherit flag
        #[clap(long)]
        no_inherit: bool,

        /// Set the Capture flag
        #[clap(long)]
        capture: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "warn" }),
    )
    .init();

    match cli.command {
        Commands::Peek {
            name,
            lifetime,
            prefix,
            fresh,
        } => commands::peek::run(&name, lifetime, prefix, fresh),
        Commands::Poke { name, freshness } => commands::poke::run(&name, freshness),
        Commands::Get { name, in_order } => commands::get::run(&name, in_order),
        Commands::Register {
            prefix,
            cost,
            no_inherit,
            capture,
        } => commands::register::run(&prefix, cost, no_inherit, capture),
    }
}
