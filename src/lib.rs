// Core library for the tweetcount distributed counter

pub mod cli;
pub mod cluster;
pub mod config;
pub mod config_file;
pub mod count_table;
pub mod counter;
pub mod decode;
pub mod decompression;
pub mod error;
pub mod input;
pub mod matcher;
pub mod output;
pub mod partition;
pub mod platform;
pub mod stats;

pub use config::{RunConfig, SearchConfig, SearchMode};
pub use count_table::{merge_all, CountTable};
pub use counter::{count_partition, count_partition_until};
pub use error::{DecodeError, ProtocolError};
pub use matcher::Matcher;
pub use partition::{owns, Partition, Rank};
