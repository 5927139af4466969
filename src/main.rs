//! SpellForge - Data-Driven Ability and Effect Engine
//!
//! Loads a JSON scenario, runs it headlessly against the configured ability
//! book, and writes the engine log when the run finishes.

use spellforge::cli;
use spellforge::headless::{run_scenario, ScenarioConfig};

fn main() {
    let args = cli::parse_args();

    let mut config = match ScenarioConfig::load_from_file(&args.scenario) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading scenario: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(output) = args.output {
        config.output_path = Some(output.to_string_lossy().into_owned());
    }
    if let Some(book) = args.book {
        config.ability_book = book.to_string_lossy().into_owned();
    }

    if let Err(e) = run_scenario(config) {
        eprintln!("Error running scenario: {}", e);
        std::process::exit(1);
    }
}
