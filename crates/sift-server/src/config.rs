use std::net::SocketAddr;
use std::path::PathBuf;

use sift_http::{CollectionConfig, Relation};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Where the served documents live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Store {
    /// In-memory database, optionally filled from a JSON seed file.
    Memory { seed: Option<PathBuf> },
    /// A MongoDB deployment. `database` falls back to the one named in the URI.
    Mongo { uri: String, database: Option<String> },
}

/// Server settings, read from `SIFT_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub collection: CollectionConfig,
    pub store: Store,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr = lookup("SIFT_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = raw_addr.parse().map_err(|_| ConfigError::Invalid {
            name: "SIFT_ADDR",
            value: raw_addr.clone(),
        })?;

        let name = lookup("SIFT_COLLECTION")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("SIFT_COLLECTION"))?;

        let list = |var: &str| lookup(var).map(|raw| split_list(&raw)).unwrap_or_default();

        let relations = list("SIFT_RELATIONS")
            .into_iter()
            .map(|spec| {
                Relation::parse(&spec).ok_or(ConfigError::Invalid {
                    name: "SIFT_RELATIONS",
                    value: spec,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let non_empty = |var: &str| lookup(var).filter(|s| !s.trim().is_empty());
        let store = match non_empty("SIFT_MONGODB_URI") {
            Some(uri) => Store::Mongo {
                uri,
                database: non_empty("SIFT_MONGODB_DATABASE"),
            },
            None => Store::Memory {
                seed: non_empty("SIFT_SEED").map(PathBuf::from),
            },
        };

        Ok(Self {
            addr,
            collection: CollectionConfig {
                name,
                search_fields: list("SIFT_SEARCH_FIELDS"),
                relations,
                hidden_fields: list("SIFT_HIDDEN_FIELDS"),
                field_names: list("SIFT_FIELDS"),
            },
            store,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
