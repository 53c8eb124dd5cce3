// Command-line interface definitions

use clap::Parser;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LaunchMode {
    /// One thread per rank inside this process
    #[default]
    Threads,
    /// One child process per worker rank
    Processes,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Default,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "tweetcount")]
#[command(about = "Count mentions, hashtags or search terms across a tweet corpus")]
#[command(
    long_about = "Count mentions, hashtags or search terms across a tweet corpus\n\nThe input is a CSV file whose payload column holds one tweet as JSON per row.\nRows are split round-robin across --workers ranks; rank 0 collects and merges\nthe partial counts.\n\nEXAMPLES:\n  tweetcount -i tweets.csv                 top 10 mentioned users\n  tweetcount -i tweets.csv -t --top 20     top 20 hashtags\n  tweetcount -i tweets.csv -s melbourne    whole-word occurrences of 'melbourne'"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// CSV input file (gzip and zstd compressed files are detected automatically)
    #[arg(short = 'i', long = "input", help_heading = "Input Options")]
    pub input: Option<String>,

    /// Column holding the raw tweet JSON
    #[arg(long = "field", default_value = "value", help_heading = "Input Options")]
    pub field: String,

    /// Count @mentions (default)
    #[arg(short = 'm', long = "mentions", help_heading = "Search Options", overrides_with_all = ["topics", "search"])]
    pub mentions: bool,

    /// Count #topics
    #[arg(short = 't', long = "topics", help_heading = "Search Options", overrides_with_all = ["mentions", "search"])]
    pub topics: bool,

    /// Count whole-word occurrences of a literal query
    #[arg(short = 's', long = "search", value_name = "QUERY", help_heading = "Search Options", overrides_with_all = ["mentions", "topics"])]
    pub search: Option<String>,

    /// Match the --search query case-insensitively
    #[arg(long = "ignore-case", requires = "search", help_heading = "Search Options")]
    pub ignore_case: bool,

    /// Number of ranks, including the coordinator (defaults to the CPU count)
    #[arg(short = 'n', long = "workers", help_heading = "Cluster Options")]
    pub workers: Option<u32>,

    /// How ranks are started
    #[arg(long = "launch", value_enum, default_value = "threads", help_heading = "Cluster Options")]
    pub launch: LaunchMode,

    /// Give up waiting for a worker after this long (e.g. 30s, 2m); waits forever by default
    #[arg(long = "recv-timeout", value_parser = humantime::parse_duration, help_heading = "Cluster Options")]
    pub recv_timeout: Option<std::time::Duration>,

    /// Internal: run as the worker with this rank
    #[arg(long = "worker-rank", hide = true, requires = "world_size")]
    pub worker_rank: Option<u32>,

    /// Internal: total number of ranks, set for worker ranks
    #[arg(long = "world-size", hide = true)]
    pub world_size: Option<u32>,

    /// Number of entries in the mentions/topics ranking
    #[arg(long = "top", default_value_t = 10, help_heading = "Output Options")]
    pub top: usize,

    /// Output format
    #[arg(short = 'F', long = "output-format", value_enum, default_value = "default", help_heading = "Output Options")]
    pub output_format: OutputFormat,

    /// Print per-rank processing statistics to stderr
    #[arg(long = "stats", help_heading = "Output Options")]
    pub stats: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Output Options")]
    pub verbose: u8,

    /// Use this config file instead of the default locations
    #[arg(long = "config-file", help_heading = "Configuration Options")]
    pub config_file: Option<String>,

    /// Skip loading config files
    #[arg(long = "ignore-config", help_heading = "Configuration Options")]
    pub ignore_config: bool,

    /// Show configuration file locations and active settings, then exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,

    /// Expand a named alias from the config file
    #[arg(short = 'a', long = "alias", help_heading = "Configuration Options")]
    pub alias: Vec<String>,
}
