mod config;
mod renamer;

use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;

use crate::renamer::Renamer;

#[derive(Parser)]
#[command(author, version, name = env!("CARGO_BIN_NAME"), about = "Rename TV episode and movie files to match canonical metadata")]
pub(crate) struct Args {
    /// Optional input directory
    #[arg(value_hint = clap::ValueHint::DirPath)]
    path: Option<PathBuf>,

    /// Rename without asking for confirmation
    #[arg(short = 'a', long)]
    auto: bool,

    /// Copy files instead of moving them
    #[arg(short = 'c', long)]
    copy: bool,

    /// Enable debug prints
    #[arg(short = 'D', long)]
    debug: bool,

    /// Media file extensions to include
    #[arg(short = 'e', long, num_args = 1, action = clap::ArgAction::Append, name = "EXTENSION")]
    extension: Vec<String>,

    /// Overwrite existing files
    #[arg(short = 'f', long)]
    force: bool,

    /// Metadata library file (TOML or JSON)
    #[arg(short = 'i', long, value_hint = clap::ValueHint::FilePath)]
    library: Option<PathBuf>,

    /// Write a log file of all file operations
    #[arg(short = 'o', long)]
    log: bool,

    /// Treat every media file as a movie
    #[arg(short = 'm', long)]
    movies: bool,

    /// Minimum file size in kilobytes
    #[arg(short = 's', long, name = "KB")]
    min_size: Option<u64>,

    /// Only print changes without renaming files
    #[arg(short = 'p', long)]
    print: bool,

    /// Recurse into subdirectories
    #[arg(short = 'r', long)]
    recurse: bool,

    /// Naming template, for example "{show} - S{season:02}E{episode:02} - {title}"
    #[arg(short = 't', long)]
    template: Option<String>,

    /// Generate shell completion
    #[arg(short = 'l', long, name = "SHELL")]
    completion: Option<Shell>,

    /// Print verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if let Some(ref shell) = args.completion {
        episode_rename::generate_shell_completion(*shell, Args::command(), true, env!("CARGO_BIN_NAME"))
    } else {
        Renamer::new(args)?.run()
    }
}
