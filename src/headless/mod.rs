//! Headless mode for agentic testing
//!
//! Runs scripted ability scenarios without any graphical output, suitable for
//! automated testing and balance analysis.
//!
//! ## Usage
//!
//! ```bash
//! # Run a scenario
//! cargo run --release -- scenario.json
//! ```
//!
//! ## JSON Configuration
//!
//! ```json
//! {
//!   "actors": [
//!     { "name": "caster", "attributes": { "Mana": 100.0 }, "abilities": ["fire_bolt"], "target": "dummy" },
//!     { "name": "dummy", "attributes": { "Health": 100.0 } }
//!   ],
//!   "script": [
//!     { "at": 0.5, "actor": "caster", "ability": "fire_bolt", "action": "Press" }
//!   ],
//!   "duration_secs": 10.0
//! }
//! ```

pub mod config;
pub mod runner;

pub use config::ScenarioConfig;
pub use runner::run_scenario;
