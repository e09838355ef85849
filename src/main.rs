//! # piplan - PI Planning Board CLI
//!
//! A command-line planner for a program increment: a row of time-boxed sprints
//! with story-point capacity, a Backlog, and tasks grouped into epics and
//! tagged with a dependent team and a traffic-light status.
//!
//! ## Key Features
//!
//! - **Board operations**: move tasks between the Backlog and sprints, reorder
//!   columns, and see capacity load per sprint (over-capacity is flagged, never blocked)
//! - **Quick setup**: generate a full increment of quarter-named sprints with
//!   default epics, dependent teams and a standard feature template
//! - **Feature templates**: expand a template into a batch of Backlog tasks
//! - **Workbook exchange**: import and export spreadsheets in either the flat
//!   JIRA-style convention or the structured sheet-per-entity convention
//! - **Local storage**: one JSON document per collection under `~/.piplan/`,
//!   with timestamped backups before every import
//!
//! ## Quick Start
//!
//! ```bash
//! # Twelve two-week sprints starting on a Monday
//! piplan setup --start 2026-01-05
//!
//! # Turn a feature into tasks and plan one of them
//! piplan feature "Checkout" --template "Standard Feature" --epic Frontend
//! piplan move "Checkout - Build and Unit Test" "PI 2026.1 - Sprint 1"
//!
//! # Review the board
//! piplan board
//!
//! # Round-trip through a spreadsheet directory of CSV sheets
//! piplan export ./plan --format flat
//! piplan import ./plan
//! ```
//!
//! Logging goes to stderr. Use `-v`/`-vv` or `RUST_LOG=pi_planner=debug`.

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

pub mod board;
pub mod catalog;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod export;
pub mod fields;
pub mod import;
pub mod kv;
pub mod migrate;
pub mod model;
pub mod resolve;
pub mod setup;
pub mod store;
pub mod workbook;

use cli::Cli;
use cmd::*;
use kv::FileStore;
use store::EntityStore;

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::default().add_directive(level.into())
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Completions need no data directory
    if let Commands::Completions { shell } = &cli.command {
        cmd_completions(*shell);
        return;
    }

    let data_dir = cli.data_dir();
    let kv = match FileStore::open(&data_dir) {
        Ok(kv) => kv,
        Err(e) => {
            eprintln!("Failed to open data directory {}: {}", data_dir.display(), e);
            std::process::exit(1);
        }
    };
    let mut store = EntityStore::new(kv);

    match cli.command {
        Commands::Setup { start, weeks, capacity, sprints } => cmd_setup(&mut store, start, weeks, capacity, sprints),

        Commands::Sprint { action } => cmd_sprint(&mut store, action),

        Commands::Epic { action } => cmd_epic(&mut store, action),

        Commands::Team { action } => cmd_team(&mut store, action),

        Commands::Template { action } => cmd_template(&mut store, action),

        Commands::Feature { name, template, epic, color, team } =>
            cmd_feature(&mut store, name, template, epic, color, team),

        Commands::Task { action } => cmd_task(&mut store, action),

        Commands::Move { task, container, index } => cmd_move(&mut store, task, container, index),

        Commands::Board => cmd_board(&mut store),

        Commands::Import { input, format, no_backup } => cmd_import(&mut store, input, format, no_backup),

        Commands::Export { output, format } => cmd_export(&mut store, output, format),

        Commands::Backup => cmd_backup(&store),

        Commands::Clear { yes } => cmd_clear(&mut store, yes),

        Commands::Completions { .. } => unreachable!("completions handled above"),
    }
}
