// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Zapfunil configuration system.

use zapfunil_config::diagnostic::ConfigError;
use zapfunil_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[storage]
database_path = "/tmp/test.db"
wal_mode = false

[server]
host = "0.0.0.0"
port = 9000
webhook_secret = "s3cret"

[scheduler]
tick_interval_secs = 60

[[instances]]
id = "central"
unit = "Central"
base_url = "http://gateway:8080"
api_key = "key-central"

[materials.Central]
photos = ["https://cdn.example/p1.jpg"]
photo_caption = "Fotos da unidade {{unidade}}"
pdf_tiers = [{ max_guests = 100, url = "https://cdn.example/ate100.pdf" }]
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.storage.database_path, "/tmp/test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.webhook_secret.as_deref(), Some("s3cret"));
    assert_eq!(config.scheduler.tick_interval_secs, 60);
    assert_eq!(config.instances.len(), 1);
    assert_eq!(config.instances[0].unit, "Central");
    assert!(config.materials.contains_key("Central"));
}

/// Unknown field in a section produces an error mentioning the key.
#[test]
fn unknown_field_produces_error() {
    let toml = r#"
[storage]
databse_path = "/tmp/test.db"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("databse_path"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert!(config.storage.wal_mode);
    assert_eq!(config.server.port, 8030);
    assert!(config.server.webhook_secret.is_none());
    assert!(config.instances.is_empty());
}

/// load_and_validate_str surfaces validation errors as diagnostics.
#[test]
fn validation_errors_surface_as_diagnostics() {
    let toml = r#"
[[instances]]
id = "central"
unit = ""
base_url = "http://gateway:8080"
api_key = "k"
"#;

    let errors = load_and_validate_str(toml).expect_err("empty unit should fail validation");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("unit"))
    ));
}

/// A figment deserialization failure converts to diagnostics, not a panic.
#[test]
fn type_mismatch_converts_to_diagnostics() {
    let toml = r#"
[scheduler]
tick_interval_secs = "soon"
"#;

    let errors = load_and_validate_str(toml).expect_err("string interval should fail");
    assert!(!errors.is_empty());
}
