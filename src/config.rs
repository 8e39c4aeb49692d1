//! Converter configuration
//!
//! Everything is loaded once per process from YAML (or JSON for the
//! ranked-property table) and shared by reference with every conversion.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_ABSTRACT_PROPERTIES: &str = include_str!("../data/abstract_properties.yaml");

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn read(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Converter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// RocksDB directory for cached knowledge-base requests
    pub cache_path: PathBuf,
    /// SPARQL endpoint of the knowledge base
    pub endpoint: String,
    /// Entity API endpoint (labels, aliases)
    pub api_endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// In-memory entries kept in front of the persistent cache
    pub lru_capacity: usize,
    /// Drop entity display strings from the output
    pub exclude_entity_display: bool,
    /// Domain/property schema document
    pub schema_path: Option<PathBuf>,
    /// Replaces the embedded shortcut table
    pub patterns_path: Option<PathBuf>,
    /// Replaces the embedded abstract-property groups
    pub abstract_properties_path: Option<PathBuf>,
    /// Ranked label lists per virtual property (JSON)
    pub ranked_properties_path: Option<PathBuf>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from("wikidata_cache"),
            endpoint: "https://query.wikidata.org/sparql".to_string(),
            api_endpoint: "https://www.wikidata.org/w/api.php".to_string(),
            timeout_secs: 60,
            lru_capacity: 10_000,
            exclude_entity_display: false,
            schema_path: None,
            patterns_path: None,
            abstract_properties_path: None,
            ranked_properties_path: None,
        }
    }
}

impl ConverterConfig {
    pub fn from_yaml_str(s: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_yaml_str(&read(path.as_ref())?)
    }

    /// Abstract-property groups from `abstract_properties_path`, or the embedded set
    pub fn abstract_properties(&self) -> ConfigResult<AbstractProperties> {
        match &self.abstract_properties_path {
            Some(path) => AbstractProperties::load(path),
            None => Ok(AbstractProperties::default()),
        }
    }

    pub fn ranked_properties(&self) -> ConfigResult<RankedProperties> {
        match &self.ranked_properties_path {
            Some(path) => RankedProperties::load(path),
            None => Ok(RankedProperties::default()),
        }
    }
}

/// How a group relates to its members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbstractionKind {
    /// Any single member stands for the abstract property
    Any,
    /// Only all members together do
    All,
}

/// One abstract property and the concrete properties it covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Abstraction {
    #[serde(rename = "type")]
    pub kind: AbstractionKind,
    pub properties: Vec<String>,
}

/// Abstract property id (`P276`) -> group of concrete property ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbstractProperties(IndexMap<String, Abstraction>);

impl AbstractProperties {
    pub fn new(groups: IndexMap<String, Abstraction>) -> Self {
        Self(groups)
    }

    pub fn from_yaml_str(s: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_yaml_str(&read(path.as_ref())?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Abstraction)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, abstract_property: &str) -> Option<&Abstraction> {
        self.0.get(abstract_property)
    }

    /// The abstract property whose group contains every id in `ids`
    pub fn covering<'a, I>(&self, ids: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        self.0
            .iter()
            .find(|(_, group)| {
                let mut any = false;
                let all = ids.clone().into_iter().all(|id| {
                    any = true;
                    group.properties.iter().any(|p| p == id)
                });
                any && all
            })
            .map(|(k, _)| k.as_str())
    }
}

impl Default for AbstractProperties {
    fn default() -> Self {
        // The embedded document is checked by the unit tests below
        serde_yaml::from_str(DEFAULT_ABSTRACT_PROPERTIES).unwrap_or_else(|_| Self(IndexMap::new()))
    }
}

/// Virtual property name -> property labels in preference order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedProperties(IndexMap<String, Vec<String>>);

impl RankedProperties {
    pub fn new(ranking: IndexMap<String, Vec<String>>) -> Self {
        Self(ranking)
    }

    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_json_str(&read(path.as_ref())?)
    }

    pub fn get(&self, property: &str) -> Option<&[String]> {
        self.0.get(property).map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = ConverterConfig::from_yaml_str("timeout_secs: 5\nexclude_entity_display: true\n").unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert!(config.exclude_entity_display);
        assert_eq!(config.endpoint, "https://query.wikidata.org/sparql");
        assert_eq!(config.cache_path, PathBuf::from("wikidata_cache"));
        assert!(config.patterns_path.is_none());
    }

    #[test]
    fn test_embedded_abstract_properties_parse() {
        let parsed = AbstractProperties::from_yaml_str(DEFAULT_ABSTRACT_PROPERTIES).unwrap();
        assert!(parsed.iter().count() > 0);
        assert_eq!(parsed, AbstractProperties::default());
    }

    #[test]
    fn test_covering_requires_every_member() {
        let groups = AbstractProperties::from_yaml_str(
            "P276:\n  type: any\n  properties: [P131, P276, P706]\n",
        )
        .unwrap();
        assert_eq!(groups.covering(["P131", "P706"]), Some("P276"));
        assert_eq!(groups.covering(["P131", "P17"]), None);
        assert_eq!(groups.covering(std::iter::empty::<&str>()), None);
    }

    #[test]
    fn test_ranked_properties() {
        let ranked = RankedProperties::from_json_str(r#"{"location": ["country", "located in"]}"#).unwrap();
        assert_eq!(ranked.get("location").unwrap(), &["country".to_string(), "located in".to_string()]);
        assert!(ranked.get("other").is_none());
    }
}
