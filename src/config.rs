use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;

pub use crate::cli::{LaunchMode, OutputFormat};

/// Validated run configuration, identical on every rank
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: InputConfig,
    pub search: SearchConfig,
    pub cluster: ClusterConfig,
    pub output: OutputConfig,
}

/// Input configuration
#[derive(Debug, Clone)]
pub struct InputConfig {
    pub path: PathBuf,
    pub field: String,
}

/// What to count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub mode: SearchMode,
    pub query: Option<String>,
    pub ignore_case: bool,
}

/// Cluster configuration
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub world_size: u32,
    pub launch: LaunchMode,
    pub recv_timeout: Option<Duration>,
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub top: usize,
    pub stats: bool,
}

/// Counting function selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Mentions,
    Topics,
    StringSearch,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Mentions => "mentions",
            SearchMode::Topics => "topics",
            SearchMode::StringSearch => "string_search",
        }
    }
}

impl SearchConfig {
    pub fn mentions() -> Self {
        Self {
            mode: SearchMode::Mentions,
            query: None,
            ignore_case: false,
        }
    }

    pub fn topics() -> Self {
        Self {
            mode: SearchMode::Topics,
            query: None,
            ignore_case: false,
        }
    }

    pub fn string_search(query: impl Into<String>) -> Self {
        Self {
            mode: SearchMode::StringSearch,
            query: Some(query.into()),
            ignore_case: false,
        }
    }
}

impl RunConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let path = cli
            .input
            .as_ref()
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("No input file given (use -i <FILE>)"))?;

        if cli.field.is_empty() {
            return Err(anyhow!("--field must not be empty"));
        }

        if !cli.alias.is_empty() {
            return Err(anyhow!(
                "Alias '{}' was not expanded; aliases need a config file (drop --ignore-config)",
                cli.alias[0]
            ));
        }

        let search = match (&cli.search, cli.topics) {
            (Some(query), _) => {
                if query.trim().is_empty() {
                    return Err(anyhow!("Search query must not be empty"));
                }
                SearchConfig {
                    mode: SearchMode::StringSearch,
                    query: Some(query.clone()),
                    ignore_case: cli.ignore_case,
                }
            }
            (None, true) => SearchConfig::topics(),
            (None, false) => SearchConfig::mentions(),
        };

        let world_size = match (cli.world_size, cli.workers) {
            (Some(n), _) => n,
            (None, Some(n)) => n,
            (None, None) => Self::default_world_size(),
        };
        if world_size == 0 {
            return Err(anyhow!("--workers must be at least 1"));
        }
        if let Some(rank) = cli.worker_rank {
            if rank == 0 || rank >= world_size {
                return Err(anyhow!(
                    "Worker rank {} is outside 1..{}",
                    rank,
                    world_size
                ));
            }
        }

        if cli.recv_timeout == Some(Duration::ZERO) {
            return Err(anyhow!("--recv-timeout must be greater than zero"));
        }

        Ok(Self {
            input: InputConfig {
                path,
                field: cli.field.clone(),
            },
            search,
            cluster: ClusterConfig {
                world_size,
                launch: cli.launch,
                recv_timeout: cli.recv_timeout,
            },
            output: OutputConfig {
                format: cli.output_format,
                top: cli.top,
                stats: cli.stats,
            },
        })
    }

    fn default_world_size() -> u32 {
        u32::try_from(num_cpus::get()).unwrap_or(1).max(1)
    }
}
