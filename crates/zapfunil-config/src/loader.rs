// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./zapfunil.toml` > `~/.config/zapfunil/zapfunil.toml`
//! > `/etc/zapfunil/zapfunil.toml` with environment variable overrides via
//! the `ZAPFUNIL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ZapfunilConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/zapfunil/zapfunil.toml` (system-wide)
/// 3. `~/.config/zapfunil/zapfunil.toml` (user XDG config)
/// 4. `./zapfunil.toml` (local directory)
/// 5. `ZAPFUNIL_*` environment variables
pub fn load_config() -> Result<ZapfunilConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ZapfunilConfig::default()))
        .merge(Toml::file("/etc/zapfunil/zapfunil.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("zapfunil/zapfunil.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("zapfunil.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ZapfunilConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ZapfunilConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ZapfunilConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ZapfunilConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `ZAPFUNIL_STORAGE_DATABASE_PATH` must
/// map to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("ZAPFUNIL_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("storage_", "storage.", 1)
            .replacen("server_", "server.", 1)
            .replacen("scheduler_", "scheduler.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_any_file() {
        let config = load_config_from_str("").unwrap();
        assert!(config.storage.wal_mode);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn local_file_overrides_defaults() {
        let config = load_config_from_str(
            r#"
[server]
host = "0.0.0.0"
port = 9000
"#,
        )
        .unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        // untouched sections keep defaults
        assert!(config.storage.wal_mode);
    }
}
