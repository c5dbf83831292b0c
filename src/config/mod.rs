//! Crawler configuration
//!
//! The configuration surface is flat data supplied by the caller: a named
//! set of sources (seed URLs, depth, priority, per-source policy and
//! rules) over a global base policy and rule list. Configurations can be
//! built in code or loaded from TOML; both paths run the same validation.

mod parser;
mod types;
mod validation;

pub use parser::{load_config, parse_config};
pub use types::{CrawlerConfig, SourceConfig};
pub use validation::validate;
