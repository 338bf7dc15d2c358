#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]

mod commands;
mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use pkgstow_core::config::Channel;
use pkgstow_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pkgstow")]
#[command(author, version, about = "Install package tarballs into a versioned store", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Config file (defaults to pkgstow.json in the working directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Release channel that namespaces the default directories (stable, nightly, dev)
    #[arg(long, global = true, env = "PKGSTOW_CHANNEL", value_name = "NAME")]
    channel: Option<Channel>,

    /// Versioned package store
    #[arg(long, global = true, value_name = "DIR")]
    store_root: Option<PathBuf>,

    /// Directory that receives the published links
    #[arg(long, global = true, value_name = "DIR")]
    publish_root: Option<PathBuf>,

    /// Scratch space for downloads and extraction
    #[arg(long, global = true, value_name = "DIR")]
    scratch_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Install a package tarball (URL, file:// path or plain path)
    Install {
        /// The tarball to install
        tarball: String,

        /// Leave a local tarball in place after unpacking it
        #[arg(long)]
        keep_tarball: bool,
    },

    /// List installed packages
    Ls,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.json);

    let cwd = cli
        .cwd
        .map(|p| dunce::canonicalize(&p).unwrap_or(p))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    // channel defaults < config file < env < flags
    let mut config = Config::new(cwd)
        .with_channel(cli.channel.unwrap_or_default())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json)
        .with_config_file(cli.config.as_deref())
        .into_diagnostic()?
        .with_env();
    if let Some(p) = cli.store_root {
        config = config.with_store_root(p);
    }
    if let Some(p) = cli.publish_root {
        config = config.with_publish_root(p);
    }
    if let Some(p) = cli.scratch_root {
        config = config.with_scratch_root(p);
    }

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Install {
            tarball,
            keep_tarball,
        }) => {
            if keep_tarball {
                config = config.with_keep_tarball(true);
            }
            commands::install::run(&config, &tarball)
        }
        Some(Commands::Ls) => commands::ls::run(&config),
    }
}
