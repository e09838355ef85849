use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::cmd::Commands;

/// Program-increment planner: sprints, epics and tasks on a capacity board,
/// with spreadsheet import and export.
/// Storage defaults to ~/.piplan or a directory passed via --data-dir.
#[derive(Parser)]
#[command(name = "piplan", version, about = "PI planning board CLI")]
pub struct Cli {
    /// Directory holding the planner collections.
    #[arg(long, global = true, env = "PIPLAN_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log more detail to stderr (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// The data directory, falling back to `$HOME/.piplan`.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".piplan")
        })
    }
}
