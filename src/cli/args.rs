//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// quire static site builder CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, searched upward from the current directory
    #[arg(short = 'C', long, global = true, default_value = crate::config::CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the site, optionally serving and rebuilding on change
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Start development server with live reload (`build --serve --watch`)
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        build_args: BuildArgs,
    },
}

/// Shared build arguments for Build and Serve commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Serve the output directory after building
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub serve: Option<bool>,

    /// Rebuild when sources change (with --serve)
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub watch: Option<bool>,

    /// Output directory path (relative to project root)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Content directory path (relative to project root)
    #[arg(short = 'd', long = "directory", value_hint = clap::ValueHint::DirPath)]
    pub directory: Option<PathBuf>,

    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<IpAddr>,

    /// Port number to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Port for the live reload WebSocket
    #[arg(long)]
    pub ws_port: Option<u16>,

    /// Host:port the browser uses to reach the reload socket
    #[arg(long)]
    pub ws_host: Option<String>,

    /// Serve the site under a path prefix, e.g. `/garden`
    #[arg(long)]
    pub base_dir: Option<String>,

    /// Worker threads for document processing (default: one per core)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,
}

impl Cli {
    pub fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Commands::Build { build_args } | Commands::Serve { build_args } => build_args,
        }
    }

    /// Whether to start the dev server; `serve` implies it.
    pub fn is_serving(&self) -> bool {
        match &self.command {
            Commands::Serve { build_args } => build_args.serve.unwrap_or(true),
            Commands::Build { build_args } => build_args.serve.unwrap_or(false),
        }
    }

    /// Explicit `--watch` value; `serve` defaults it on.
    pub fn watch(&self) -> Option<bool> {
        match &self.command {
            Commands::Serve { build_args } => Some(build_args.watch.unwrap_or(true)),
            Commands::Build { build_args } => build_args.watch,
        }
    }
}
