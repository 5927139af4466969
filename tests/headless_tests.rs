//! Integration tests for headless scenario execution
//!
//! These tests verify that:
//! - Scenario configurations parse and validate correctly
//! - The shipped ability book loads and validates
//! - run_scenario rejects bad content before starting the app

use spellforge::config::load_ability_book;
use spellforge::headless::{run_scenario, ScenarioConfig};
use spellforge::CastType;

fn sample_scenario(json: &str) -> ScenarioConfig {
    serde_json::from_str(json).expect("scenario JSON should parse")
}

const BASIC: &str = r#"{
    "actors": [
        { "name": "caster", "attributes": { "Mana": 100.0 }, "abilities": ["fire_bolt"], "target": "dummy" },
        { "name": "dummy", "attributes": { "Health": 200.0 } }
    ],
    "script": [
        { "at": 0.5, "actor": "caster", "ability": "fire_bolt", "action": "Press" }
    ],
    "duration_secs": 5.0
}"#;

#[test]
fn basic_scenario_validates() {
    let config = sample_scenario(BASIC);
    assert!(config.validate().is_ok());
    assert_eq!(config.duration_secs, 5.0);
    assert_eq!(config.ability_book, "assets/config/abilities.ron");
}

#[test]
fn shipped_ability_book_loads_and_validates() {
    let book = load_ability_book("assets/config/abilities.ron").unwrap();
    assert!(book.len() >= 4);

    let bolt = book.get("fire_bolt").unwrap();
    assert_eq!(bolt.cast_type, CastType::Casted);
    assert!(bolt.max_cast_time > 0.0);

    let drain = book.get("drain_life").unwrap();
    assert_eq!(drain.cast_type, CastType::Channeled);
    assert!(drain.channel_interval > 0.0);

    let surge = book.get("power_surge").unwrap();
    assert_eq!(surge.cast_type, CastType::CastedCharged);
    assert!(surge.max_overcast_time > 0.0);
}

#[test]
fn scenario_with_unknown_ability_is_rejected_before_running() {
    let mut config = sample_scenario(BASIC);
    config.actors[0].abilities = vec!["meteor".to_string()];
    config.script.clear();

    let err = run_scenario(config).unwrap_err();
    assert!(err.contains("meteor"), "unexpected error: {}", err);
}

#[test]
fn scenario_with_missing_book_file_is_rejected() {
    let mut config = sample_scenario(BASIC);
    config.ability_book = "assets/config/does_not_exist.ron".to_string();

    assert!(run_scenario(config).is_err());
}

#[test]
fn scenario_without_actors_is_rejected() {
    let config: ScenarioConfig =
        serde_json::from_str(r#"{ "actors": [] }"#).expect("scenario JSON should parse");
    assert!(config.validate().is_err());
}
