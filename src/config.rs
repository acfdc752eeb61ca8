//! Persistent application configuration model and defaults.
//!
//! The heuristic constants of the matcher (threshold, weights, the
//! abbreviation score) and the blacklist timing windows are configuration
//! values rather than hard-coded literals; the defaults reproduce the
//! catalog-calibrated behavior.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

/// Root configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
}

impl Config {
    /// Loads the configuration from the given path, falling back to the
    /// defaults when the file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<Config>(&content) {
                    Ok(config) => return config,
                    Err(err) => warn!("Invalid config file {}: {err}", path.display()),
                },
                Err(err) => warn!("Could not read config file {}: {err}", path.display()),
            }
        }
        Config::default()
    }
}

/// Where the persisted store files live.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("bibrec"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Tunables of the name/author matching engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MatcherConfig {
    /// Minimum similarity a match strategy must reach.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Score assigned when the catalog abbreviates the first name to an
    /// initial ("S. King" for "Stephen King"). Abbreviated matches are too
    /// ambiguous to trust with a full score.
    #[serde(default = "default_abbreviation_score")]
    pub abbreviation_score: f64,
    /// Author weight in the combined author/title ranking score.
    #[serde(default = "default_author_weight")]
    pub author_weight: f64,
    /// Title weight in the combined author/title ranking score.
    #[serde(default = "default_title_weight")]
    pub title_weight: f64,
    /// A title score at or above this accepts a hit regardless of the
    /// combined score (perfect title, oddly formatted author field).
    #[serde(default = "default_title_override")]
    pub title_override: f64,
    /// Label introducing the person field in catalog detail text.
    #[serde(default = "default_person_field_label")]
    pub person_field_label: String,
    /// Field labels that terminate the person field.
    #[serde(default = "default_field_boundary_labels")]
    pub field_boundary_labels: Vec<String>,
    /// Role tags stripped from extracted person names.
    #[serde(default = "default_role_tags")]
    pub role_tags: Vec<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            abbreviation_score: default_abbreviation_score(),
            author_weight: default_author_weight(),
            title_weight: default_title_weight(),
            title_override: default_title_override(),
            person_field_label: default_person_field_label(),
            field_boundary_labels: default_field_boundary_labels(),
            role_tags: default_role_tags(),
        }
    }
}

fn default_threshold() -> f64 {
    0.7
}

fn default_abbreviation_score() -> f64 {
    0.6
}

fn default_author_weight() -> f64 {
    0.6
}

fn default_title_weight() -> f64 {
    0.4
}

fn default_title_override() -> f64 {
    0.95
}

fn default_person_field_label() -> String {
    "Person(en)".to_string()
}

fn default_field_boundary_labels() -> Vec<String> {
    [
        "Erschienen",
        "Umfang",
        "Ausgabe",
        "Anmerkungen",
        "Original",
        "FSK",
        "Sprachen",
        "ISMN",
        "EAN",
        "Notation",
        "Bestand",
    ]
    .iter()
    .map(|label| label.to_string())
    .collect()
}

fn default_role_tags() -> Vec<String> {
    [
        "Regisseur",
        "Schauspieler",
        "Darsteller",
        "Komponist",
        "Interpret",
        "Verfasser",
        "Autor",
        "Herausgeber",
        "Sonstige",
        "Mitwirkende",
        "Mitwirkender",
    ]
    .iter()
    .map(|tag| tag.to_string())
    .collect()
}

/// Timing windows of the time-boxed blacklists.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BlacklistConfig {
    /// Days before a blacklisted artist becomes eligible for a re-check.
    #[serde(default = "default_recheck_interval_days")]
    pub recheck_interval_days: i64,
    /// Retention window for artist entries, used by the maintenance purge.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            recheck_interval_days: default_recheck_interval_days(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_recheck_interval_days() -> i64 {
    365
}

fn default_retention_days() -> i64 {
    730
}
