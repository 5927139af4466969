//! Command-line interface for SpellForge
//!
//! The binary runs headless scenarios; the engine itself is a library.

use clap::Parser;
use std::path::PathBuf;

/// Data-driven ability and effect engine
#[derive(Parser, Debug)]
#[command(name = "spellforge")]
#[command(about = "Data-driven ability and effect engine")]
#[command(version)]
pub struct Args {
    /// JSON scenario file to execute
    #[arg(value_name = "SCENARIO_FILE")]
    pub scenario: PathBuf,

    /// Output path for the engine log
    #[arg(long, value_name = "OUTPUT_PATH")]
    pub output: Option<PathBuf>,

    /// Ability book RON file (overrides the scenario's ability_book)
    #[arg(long, value_name = "BOOK_FILE")]
    pub book: Option<PathBuf>,
}

pub fn parse_args() -> Args {
    Args::parse()
}
