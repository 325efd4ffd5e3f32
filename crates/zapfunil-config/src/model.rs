// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Zapfunil sales pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. The editable bot texts live in the database
//! (settings collaborator); this file covers the deployment surface:
//! storage, webhook server, scheduler tick, messaging instances, and the
//! per-unit material catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level Zapfunil configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ZapfunilConfig {
    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Webhook server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Follow-up scheduler tick settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Messaging instances (one per connected WhatsApp number).
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,

    /// Material catalog keyed by venue unit name.
    #[serde(default)]
    pub materials: HashMap<String, UnitMaterials>,
}

impl ZapfunilConfig {
    /// Look up an instance definition by id.
    pub fn instance(&self, instance_id: &str) -> Option<&InstanceConfig> {
        self.instances.iter().find(|i| i.id == instance_id)
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("zapfunil").join("zapfunil.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("zapfunil.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Webhook server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the webhook server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret for webhook HMAC signatures. `None` disables
    /// signature verification (local development only).
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_secret: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8030
}

/// Follow-up scheduler tick configuration.
///
/// The scheduler itself is passive; the serve loop re-evaluates due stages
/// every `tick_interval_secs`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    300 // 5 minutes
}

/// One messaging instance: a connected WhatsApp number serving one unit.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    /// Instance identifier used in webhook payloads and gateway URLs.
    pub id: String,

    /// Venue unit this instance serves. Copied onto conversations at creation.
    pub unit: String,

    /// Base URL of the gateway serving this instance.
    pub base_url: String,

    /// API key for the gateway.
    pub api_key: String,

    /// Default bot policy for new conversations on this instance.
    #[serde(default = "default_bot_default")]
    pub bot_default: bool,
}

fn default_bot_default() -> bool {
    true
}

/// Material catalog for one venue unit, sequenced by the bot after
/// qualification completes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UnitMaterials {
    /// Unit photo URLs, sent in order.
    #[serde(default)]
    pub photos: Vec<String>,

    /// Caption sent before the photos; may interpolate `{{unidade}}`.
    #[serde(default)]
    pub photo_caption: Option<String>,

    /// Presentation video URL.
    #[serde(default)]
    pub video: Option<String>,

    /// Caption sent before the video; may interpolate `{{unidade}}`.
    #[serde(default)]
    pub video_caption: Option<String>,

    /// Promotional PDFs by guest-count tier, ascending by `max_guests`.
    /// The first tier whose `max_guests` covers the lead is used.
    #[serde(default)]
    pub pdf_tiers: Vec<PdfTier>,

    /// Caption sent before the PDF; may interpolate `{{unidade}}`.
    #[serde(default)]
    pub pdf_caption: Option<String>,

    /// Seasonal promo video URL, sent only while enabled.
    #[serde(default)]
    pub seasonal_video: Option<String>,

    /// Caption sent before the seasonal video.
    #[serde(default)]
    pub seasonal_caption: Option<String>,

    #[serde(default)]
    pub seasonal_enabled: bool,
}

/// One promotional PDF tier.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PdfTier {
    pub max_guests: i64,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_instances() {
        let config = ZapfunilConfig::default();
        assert!(config.instances.is_empty());
        assert!(config.materials.is_empty());
        assert_eq!(config.scheduler.tick_interval_secs, 300);
    }

    #[test]
    fn instances_deserialize_from_toml() {
        let toml_str = r#"
[[instances]]
id = "central"
unit = "Central"
base_url = "http://localhost:8080"
api_key = "secret"

[[instances]]
id = "norte"
unit = "Norte"
base_url = "http://localhost:8081"
api_key = "secret2"
bot_default = false
"#;
        let config: ZapfunilConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.instances.len(), 2);
        assert!(config.instances[0].bot_default, "bot_default defaults to true");
        assert!(!config.instances[1].bot_default);
        assert_eq!(config.instance("norte").unwrap().unit, "Norte");
        assert!(config.instance("sul").is_none());
    }

    #[test]
    fn materials_deserialize_keyed_by_unit() {
        let toml_str = r#"
[materials.Central]
photos = ["https://cdn.example/p1.jpg", "https://cdn.example/p2.jpg"]
photo_caption = "Fotos da unidade {{unidade}}"
video = "https://cdn.example/tour.mp4"
pdf_tiers = [
  { max_guests = 100, url = "https://cdn.example/ate100.pdf" },
  { max_guests = 300, url = "https://cdn.example/ate300.pdf" },
]
"#;
        let config: ZapfunilConfig = toml::from_str(toml_str).unwrap();
        let materials = config.materials.get("Central").unwrap();
        assert_eq!(materials.photos.len(), 2);
        assert_eq!(materials.pdf_tiers.len(), 2);
        assert!(!materials.seasonal_enabled);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let toml_str = r#"
[storage]
database_path = "/tmp/z.db"
wal_enabled = true
"#;
        assert!(toml::from_str::<ZapfunilConfig>(toml_str).is_err());
    }
}
