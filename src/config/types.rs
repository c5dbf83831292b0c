use crate::extract::ExtractionRule;
use crate::model::{CrawlPolicy, CrawlRequest, Priority, META_SOURCE};
use serde::{Deserialize, Serialize};

/// Top-level crawler configuration
///
/// Flat data supplied by the caller: a set of sources plus a global policy
/// and rule list applied as a base for every source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Name of this crawl configuration
    pub name: String,

    /// Worker count for the engine
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Base policy inherited by sources without one of their own
    #[serde(default)]
    pub default_policy: CrawlPolicy,

    /// Base rules prepended to every source's rules
    #[serde(default)]
    pub default_rules: Vec<ExtractionRule>,

    /// The sources to crawl
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_max_concurrency() -> usize {
    50
}

/// One crawl source: a set of seed URLs with shared settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Source name, stored on every request under `metadata["source"]`
    pub name: String,

    /// Starting points for this source
    pub seed_urls: Vec<String>,

    /// Depth to which links are followed from the seeds
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Scheduling priority for this source's requests
    #[serde(default)]
    pub priority: Priority,

    /// Policy override; the global policy applies when absent
    #[serde(default)]
    pub policy: Option<CrawlPolicy>,

    /// Extraction rules appended to the global base rules
    #[serde(default)]
    pub rules: Vec<ExtractionRule>,
}

fn default_max_depth() -> u32 {
    2
}

impl CrawlerConfig {
    /// Expands the configuration into one request per seed URL
    ///
    /// Each request carries its source's name under `metadata["source"]`,
    /// the source policy (falling back to the global one), and the global
    /// base rules followed by the source's own.
    pub fn expand_requests(&self) -> Vec<CrawlRequest> {
        let mut requests = Vec::new();

        for source in &self.sources {
            let policy = source
                .policy
                .clone()
                .unwrap_or_else(|| self.default_policy.clone());

            let mut rules = self.default_rules.clone();
            rules.extend(source.rules.iter().cloned());

            for seed in &source.seed_urls {
                let mut request = CrawlRequest::new(seed.clone());
                request.max_depth = source.max_depth;
                request.priority = source.priority;
                request.policy = policy.clone();
                request.rules = rules.clone();
                request
                    .metadata
                    .insert(META_SOURCE.to_string(), source.name.clone());
                requests.push(request);
            }
        }

        requests
    }
}
