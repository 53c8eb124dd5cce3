//! Counting functions: mention, topic and whole-word search extraction

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::config::{SearchConfig, SearchMode};
use crate::count_table::CountTable;

static MENTION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").expect("mention regex"));
static TOPIC_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\w+").expect("topic regex"));

/// Turns one tweet's text into a per-record `CountTable`
#[derive(Debug, Clone)]
pub struct Matcher {
    mode: SearchMode,
    pattern: Regex,
    /// Key under which string-search hits are counted
    query: Option<String>,
}

impl Matcher {
    pub fn new(search: &SearchConfig) -> Result<Self> {
        match search.mode {
            SearchMode::Mentions => Ok(Self::mentions()),
            SearchMode::Topics => Ok(Self::topics()),
            SearchMode::StringSearch => {
                let query = search
                    .query
                    .as_deref()
                    .ok_or_else(|| anyhow!("String search needs a query"))?;
                Self::string_search(query, search.ignore_case)
            }
        }
    }

    pub fn mentions() -> Self {
        Self {
            mode: SearchMode::Mentions,
            pattern: MENTION_REGEX.clone(),
            query: None,
        }
    }

    pub fn topics() -> Self {
        Self {
            mode: SearchMode::Topics,
            pattern: TOPIC_REGEX.clone(),
            query: None,
        }
    }

    /// Whole-word match of a literal query
    pub fn string_search(query: &str, ignore_case: bool) -> Result<Self> {
        let pattern = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(query)))
            .case_insensitive(ignore_case)
            .build()
            .with_context(|| format!("Invalid search query '{}'", query))?;
        Ok(Self {
            mode: SearchMode::StringSearch,
            pattern,
            query: Some(query.to_string()),
        })
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Count all matches in `text`
    pub fn count(&self, text: &str) -> CountTable {
        match &self.query {
            Some(query) => self
                .pattern
                .find_iter(text)
                .map(|_| query.as_str())
                .collect(),
            None => self.pattern.find_iter(text).map(|m| m.as_str()).collect(),
        }
    }
}
