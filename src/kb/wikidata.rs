//! Wikidata client
//!
//! Entity data comes from the `wbgetentities` API, everything else from the
//! SPARQL endpoint. Every response is cached by URL; a failed request is
//! retried once.

use crate::config::ConverterConfig;
use crate::kb::cache::RequestCache;
use crate::kb::{is_kb_id, KbError, KbResult, KnowledgeBase, HUMAN};
use crate::sparql::namespace::{local_id, ENTITY_PREFIX, PROPERTY_PREFIX};
use async_trait::async_trait;
use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use serde_json::Value as Json;
use std::time::Duration;
use tracing::{debug, warn};

/// The API accepts at most this many ids per call
const BATCH_SIZE: usize = 50;

const ATTEMPTS: usize = 2;

/// Domains whose instance-count query would time out; taken as-is when present
const LARGE_DOMAINS: [&str; 2] = ["Q16521", "Q13442814"];

pub struct WikidataClient {
    client: Client,
    endpoint: String,
    api_endpoint: String,
    cache: Option<RequestCache>,
}

impl WikidataClient {
    pub fn new(config: &ConverterConfig) -> KbResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("sparql2thingtalk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KbError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_endpoint: config.api_endpoint.clone(),
            cache: None,
        })
    }

    /// Open the persistent cache configured by `cache_path`
    pub fn with_cache(config: &ConverterConfig) -> KbResult<Self> {
        let cache = RequestCache::open(&config.cache_path, config.lru_capacity)?;
        Ok(Self {
            cache: Some(cache),
            ..Self::new(config)?
        })
    }

    async fn fetch(&self, url: &str) -> KbResult<Json> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| KbError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(KbError::Api(format!("{} for {}", resp.status(), url)));
        }

        resp.json().await.map_err(|e| KbError::Serialization(e.to_string()))
    }

    /// GET a JSON document, through the cache
    async fn request(&self, url: &str) -> KbResult<Json> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get_request(url)? {
                return Ok(cached);
            }
        }

        let mut last_error = None;
        for attempt in 1..=ATTEMPTS {
            match self.fetch(url).await {
                Ok(result) => {
                    if let Some(cache) = &self.cache {
                        cache.put_request(url, &result)?;
                    }
                    return Ok(result);
                }
                Err(e) => {
                    warn!("Request attempt {} failed for {}: {}", attempt, url, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| KbError::Network(url.to_string())))
    }

    /// Run a SPARQL query and return its bindings
    pub async fn query(&self, sparql: &str) -> KbResult<Vec<Json>> {
        let compact = sparql.split_whitespace().collect::<Vec<_>>().join(" ");
        let url = format!(
            "{}?format=json&query={}",
            self.endpoint,
            utf8_percent_encode(&compact, NON_ALPHANUMERIC)
        );
        debug!("SPARQL: {}", compact);
        let result = self.request(&url).await?;
        result["results"]["bindings"]
            .as_array()
            .cloned()
            .ok_or_else(|| KbError::Api(format!("Malformed SPARQL response for {}", compact)))
    }

    /// Values of `variable` across all bindings, with the entity prefix removed
    async fn query_ids(&self, sparql: &str, variable: &str) -> KbResult<Vec<String>> {
        let bindings = self.query(sparql).await?;
        Ok(bindings
            .iter()
            .filter_map(|b| b[variable]["value"].as_str())
            .map(|v| v.strip_prefix(ENTITY_PREFIX).unwrap_or(v).to_string())
            .collect())
    }

    fn entities_url(&self, ids: &[&str], props: &str) -> String {
        format!(
            "{}?action=wbgetentities&format=json&languages=en&props={}&ids={}",
            self.api_endpoint,
            props,
            utf8_percent_encode(&ids.join("|"), NON_ALPHANUMERIC)
        )
    }

    async fn get_entity(&self, id: &str, props: &str) -> KbResult<Option<Json>> {
        let result = self.request(&self.entities_url(&[id], props)).await?;
        Ok(result["entities"]
            .as_object()
            .and_then(|entities| entities.values().next().cloned()))
    }
}

fn english_label(entity: &Json) -> Option<String> {
    entity["labels"]["en"]["value"].as_str().map(str::to_string)
}

#[async_trait]
impl KnowledgeBase for WikidataClient {
    async fn get_label(&self, id: &str) -> KbResult<Option<String>> {
        if !is_kb_id(id) {
            return Ok(None);
        }
        if let Some(cache) = &self.cache {
            if let Some(label) = cache.get_label(id)? {
                return Ok(label);
            }
        }
        let label = self.get_entity(id, "labels").await?.as_ref().and_then(english_label);
        if label.is_none() {
            debug!("No English label for {}", id);
        }
        if let Some(cache) = &self.cache {
            cache.put_label(id, label.as_deref())?;
        }
        Ok(label)
    }

    async fn get_alt_labels(&self, id: &str) -> KbResult<Vec<String>> {
        if !is_kb_id(id) {
            return Ok(Vec::new());
        }
        let entity = self.get_entity(id, "aliases").await?;
        Ok(entity
            .as_ref()
            .and_then(|e| e["aliases"]["en"].as_array())
            .map(|aliases| {
                aliases
                    .iter()
                    .filter_map(|a| a["value"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_labels_by_batch(&self, ids: &[String]) -> KbResult<IndexMap<String, Option<String>>> {
        let mut labels = IndexMap::new();
        let mut uncached: Vec<&str> = Vec::new();
        for id in ids.iter().filter(|id| is_kb_id(id)) {
            let cached = match &self.cache {
                Some(cache) => cache.get_label(id)?,
                None => None,
            };
            match cached {
                Some(label) => {
                    labels.insert(id.clone(), label);
                }
                None if !uncached.contains(&id.as_str()) => uncached.push(id.as_str()),
                None => {}
            }
        }

        for batch in uncached.chunks(BATCH_SIZE) {
            let raw = self.request(&self.entities_url(batch, "labels")).await?;
            let Some(entities) = raw["entities"].as_object() else {
                continue;
            };
            for (id, entity) in entities {
                // redirects come back under the requested id with a different `id` field
                if entity["id"].as_str() != Some(id.as_str()) {
                    continue;
                }
                let label = english_label(entity);
                if let Some(cache) = &self.cache {
                    cache.put_label(id, label.as_deref())?;
                }
                labels.insert(id.clone(), label);
            }
        }
        Ok(labels)
    }

    async fn get_domain(&self, id: &str) -> KbResult<Option<String>> {
        let domains = self.get_property_value(id, "P31").await?;
        if domains.is_empty() {
            return Ok(None);
        }
        if domains.iter().any(|d| d == HUMAN) {
            return Ok(Some(HUMAN.to_string()));
        }
        if domains.len() == 1 {
            return Ok(domains.into_iter().next());
        }
        if let Some(large) = LARGE_DOMAINS.iter().find(|d| domains.iter().any(|x| x == *d)) {
            return Ok(Some(large.to_string()));
        }

        let sparql = format!(
            "SELECT ?v (COUNT(?s) AS ?count) WHERE {{ wd:{} wdt:P31 ?v . ?s wdt:P31 ?v . }} GROUP BY ?v ORDER BY DESC(?count)",
            id
        );
        Ok(self.query_ids(&sparql, "v").await?.into_iter().next())
    }

    async fn get_top_level_domain(&self, classes: &[String], candidates: &[String]) -> KbResult<Option<String>> {
        if classes.is_empty() || candidates.is_empty() {
            return Ok(None);
        }
        if let Some(direct) = candidates.iter().find(|c| classes.contains(c)) {
            return Ok(Some(direct.clone()));
        }
        let values = |ids: &[String]| {
            ids.iter()
                .filter(|id| is_kb_id(id))
                .map(|id| format!("wd:{}", id))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let sparql = format!(
            "SELECT DISTINCT ?d WHERE {{ VALUES ?c {{ {} }} VALUES ?d {{ {} }} ?c wdt:P279* ?d . }}",
            values(classes),
            values(candidates)
        );
        let found = self.query_ids(&sparql, "d").await?;
        Ok(candidates.iter().find(|c| found.contains(c)).cloned())
    }

    async fn get_connected_property(&self, id: &str) -> KbResult<Vec<String>> {
        let sparql = format!("SELECT DISTINCT ?p WHERE {{ wd:{} ?p ?o . }}", id);
        let bindings = self.query(&sparql).await?;
        Ok(bindings
            .iter()
            .filter_map(|b| b["p"]["value"].as_str())
            .filter(|p| p.starts_with(PROPERTY_PREFIX))
            .map(|p| local_id(p).to_string())
            .collect())
    }

    async fn get_property_value(&self, entity: &str, property: &str) -> KbResult<Vec<String>> {
        let sparql = format!("SELECT ?v WHERE {{ wd:{} wdt:{} ?v . }}", entity, property);
        self.query_ids(&sparql, "v").await
    }

    async fn get_entities_with_value(&self, property: &str, value: &str) -> KbResult<Vec<String>> {
        let sparql = format!("SELECT DISTINCT ?x WHERE {{ ?x wdt:{} wd:{} . }}", property, value);
        self.query_ids(&sparql, "x").await
    }
}
