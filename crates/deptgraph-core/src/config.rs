use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// String similarity used to confirm a near-duplicate candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    NormalizedLevenshtein,
    JaroWinkler,
}

impl SimilarityMetric {
    #[must_use]
    pub fn score(&self, a: &str, b: &str) -> f64 {
        match self {
            Self::NormalizedLevenshtein => strsim::normalized_levenshtein(a, b),
            Self::JaroWinkler => strsim::jaro_winkler(a, b),
        }
    }
}

impl std::str::FromStr for SimilarityMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normalized_levenshtein" | "levenshtein" => Ok(Self::NormalizedLevenshtein),
            "jaro_winkler" => Ok(Self::JaroWinkler),
            _ => Err(Error::InvalidConfig(format!("unknown similarity metric {s:?}"))),
        }
    }
}

/// Coarse bucket used to find near-duplicate candidates when the exact
/// normalized key misses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureScheme {
    /// Last token of the simplified name.
    LastToken,
    /// First letter of the first token plus the last token.
    #[default]
    FirstInitialLastToken,
    /// The whole simplified name; fuzzy matching effectively disabled.
    FullName,
}

impl SignatureScheme {
    #[must_use]
    pub fn signature(&self, simplified_name: &str) -> String {
        let mut tokens = simplified_name.split_whitespace();
        let first = tokens.next().unwrap_or_default();
        let last = tokens.next_back().unwrap_or(first);

        match self {
            Self::LastToken => last.to_string(),
            Self::FirstInitialLastToken => {
                let initial: String = first.chars().take(1).collect();
                format!("{initial} {last}")
            }
            Self::FullName => simplified_name.to_string(),
        }
    }
}

impl std::str::FromStr for SignatureScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "last_token" => Ok(Self::LastToken),
            "first_initial_last_token" => Ok(Self::FirstInitialLastToken),
            "full_name" => Ok(Self::FullName),
            _ => Err(Error::InvalidConfig(format!("unknown signature scheme {s:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub similarity_threshold: f64,
    pub similarity_metric: SimilarityMetric,
    pub signature: SignatureScheme,
    /// Collapse an exact name match under a different person type into the
    /// existing node, recording a type conflict. Organisation types never
    /// collapse.
    pub cross_type_merge: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            similarity_metric: SimilarityMetric::default(),
            signature: SignatureScheme::default(),
            cross_type_merge: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Extraction calls allowed in flight at once.
    pub concurrency: usize,
    /// Completed extractions buffered ahead of the assembler.
    pub queue_depth: usize,
    /// Maximum characters per text chunk handed to the extractor.
    pub chunk_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            queue_depth: 8,
            chunk_size: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub resolver: ResolverConfig,
    pub pipeline: PipelineConfig,
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `DEPTGRAPH_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from any lookup; `from_env` passes the process
    /// environment.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup("DEPTGRAPH_SIMILARITY_THRESHOLD") {
            self.resolver.similarity_threshold = value.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("similarity threshold {value:?} is not a number"))
            })?;
        }
        if let Some(value) = lookup("DEPTGRAPH_SIMILARITY_METRIC") {
            self.resolver.similarity_metric = value.trim().parse()?;
        }
        if let Some(value) = lookup("DEPTGRAPH_SIGNATURE") {
            self.resolver.signature = value.trim().parse()?;
        }
        if let Some(value) = lookup("DEPTGRAPH_CHUNK_SIZE") {
            self.pipeline.chunk_size = value.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("chunk size {value:?} is not a number"))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.resolver.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "similarity threshold must be in (0, 1], got {threshold}"
            )));
        }
        if self.pipeline.concurrency == 0 {
            return Err(Error::InvalidConfig("concurrency must be at least 1".into()));
        }
        if self.pipeline.queue_depth == 0 {
            return Err(Error::InvalidConfig("queue depth must be at least 1".into()));
        }
        if self.pipeline.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be at least 1".into()));
        }
        Ok(())
    }
}
