//! Shortcut templates
//!
//! Some questions are answered by query shapes the converter does not
//! support. They are kept as pairs of templates with `$0`, `$1`, ...
//! standing for entity ids, and looked up by exact match in either
//! direction before conversion is attempted.

use crate::sparql::normalize;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_PATTERNS: &str = include_str!("../../data/patterns.yaml");

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$([0-9])").unwrap());

static ESCAPED_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\\$[0-9]").unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Pattern table errors
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid template {template:?}: {source}")]
    Template {
        template: String,
        #[source]
        source: regex::Error,
    },

    #[error("Placeholders differ between {thingtalk:?} and its query")]
    PlaceholderMismatch { thingtalk: String },
}

pub type PatternResult<T> = Result<T, PatternError>;

#[derive(Debug, Deserialize)]
struct PatternDef {
    thingtalk: String,
    sparql: String,
}

/// One side of a pattern: its text and the regex matching filled-in copies
#[derive(Debug, Clone)]
struct Template {
    text: String,
    regex: Regex,
    /// Placeholder number of each capture group, in order
    placeholders: Vec<usize>,
}

impl Template {
    fn new(text: String) -> PatternResult<Self> {
        let escaped = regex::escape(&text);
        let source = format!("^{}$", ESCAPED_PLACEHOLDER.replace_all(&escaped, "(Q[0-9]+)"));
        let regex = Regex::new(&source).map_err(|source| PatternError::Template {
            template: text.clone(),
            source,
        })?;
        let placeholders = PLACEHOLDER
            .captures_iter(&text)
            .filter_map(|c| c[1].parse().ok())
            .collect();
        Ok(Self {
            text,
            regex,
            placeholders,
        })
    }

    fn distinct_placeholders(&self) -> Vec<usize> {
        let mut distinct = self.placeholders.clone();
        distinct.sort_unstable();
        distinct.dedup();
        distinct
    }

    /// Entity ids by placeholder number, if `input` is a filled-in copy
    fn capture(&self, input: &str) -> Option<Vec<(usize, String)>> {
        let captures = self.regex.captures(input)?;
        let mut bound: Vec<(usize, String)> = Vec::new();
        for (group, placeholder) in self.placeholders.iter().enumerate() {
            let value = captures.get(group + 1)?.as_str();
            match bound.iter().find(|(p, _)| p == placeholder) {
                Some((_, previous)) if previous != value => return None,
                Some(_) => {}
                None => bound.push((*placeholder, value.to_string())),
            }
        }
        Some(bound)
    }

    fn fill(&self, bound: &[(usize, String)]) -> String {
        let mut filled = self.text.clone();
        for (placeholder, value) in bound {
            filled = filled.replace(&format!("${}", placeholder), value);
        }
        filled
    }
}

#[derive(Debug, Clone)]
struct Pattern {
    thingtalk: Template,
    sparql: Template,
}

/// Bidirectional template lookup
#[derive(Debug, Clone)]
pub struct PatternConverter {
    patterns: Vec<Pattern>,
}

impl PatternConverter {
    pub fn from_yaml_str(s: &str) -> PatternResult<Self> {
        let defs: Vec<PatternDef> = serde_yaml::from_str(s)?;
        let mut patterns = Vec::with_capacity(defs.len());
        for def in defs {
            let thingtalk = Template::new(WHITESPACE.replace_all(def.thingtalk.trim(), " ").into_owned())?;
            let sparql = Template::new(normalize(&def.sparql))?;
            if thingtalk.distinct_placeholders() != sparql.distinct_placeholders() {
                return Err(PatternError::PlaceholderMismatch {
                    thingtalk: thingtalk.text,
                });
            }
            patterns.push(Pattern { thingtalk, sparql });
        }
        info!("Loaded {} shortcut patterns", patterns.len());
        Ok(Self { patterns })
    }

    pub fn load(path: impl AsRef<Path>) -> PatternResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PatternError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// The embedded table
    pub fn embedded() -> PatternResult<Self> {
        Self::from_yaml_str(DEFAULT_PATTERNS)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// `(thingtalk, sparql)` templates, the query side normalized
    pub fn templates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.patterns
            .iter()
            .map(|p| (p.thingtalk.text.as_str(), p.sparql.text.as_str()))
    }

    /// The query for a program matching one of the templates
    pub fn to_sparql(&self, thingtalk: &str) -> Option<String> {
        let thingtalk = WHITESPACE.replace_all(thingtalk.trim(), " ");
        self.patterns.iter().find_map(|p| {
            let bound = p.thingtalk.capture(&thingtalk)?;
            debug!("Shortcut hit: {}", p.thingtalk.text);
            Some(p.sparql.fill(&bound))
        })
    }

    /// The program for a query matching one of the templates
    pub fn from_sparql(&self, sparql: &str) -> Option<String> {
        let sparql = normalize(sparql);
        self.patterns.iter().find_map(|p| {
            let bound = p.sparql.capture(&sparql)?;
            debug!("Shortcut hit: {}", p.thingtalk.text);
            Some(p.thingtalk.fill(&bound))
        })
    }
}
