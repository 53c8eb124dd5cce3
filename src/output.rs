//! Rendering of the final merged table

use serde::Serialize;

use crate::config::{OutputConfig, OutputFormat, SearchConfig, SearchMode};
use crate::count_table::CountTable;

/// Turns the merged table into the text printed on stdout
pub trait Formatter {
    fn format(&self, table: &CountTable, search: &SearchConfig) -> String;
}

/// Human-readable listing
pub struct DefaultFormatter {
    top: usize,
}

impl DefaultFormatter {
    pub fn new(top: usize) -> Self {
        Self { top }
    }
}

impl Formatter for DefaultFormatter {
    fn format(&self, table: &CountTable, search: &SearchConfig) -> String {
        let heading = match search.mode {
            SearchMode::Mentions => "users mentioned",
            SearchMode::Topics => "trending topics",
            SearchMode::StringSearch => {
                let query = search.query.as_deref().unwrap_or_default();
                return format!("{} was found {} times.", query, table.get(query));
            }
        };

        let mut output = format!("The top {} {} are:", self.top, heading);
        for (key, count) in table.ranked(self.top) {
            output.push('\n');
            output.push_str(&format!("{}: {}", key, count));
        }
        output
    }
}

#[derive(Serialize)]
struct JsonEntry<'a> {
    key: &'a str,
    count: u64,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    mode: &'static str,
    query: Option<&'a str>,
    results: Vec<JsonEntry<'a>>,
}

/// Single JSON object
pub struct JsonFormatter {
    top: usize,
}

impl JsonFormatter {
    pub fn new(top: usize) -> Self {
        Self { top }
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, table: &CountTable, search: &SearchConfig) -> String {
        let results = match (search.mode, search.query.as_deref()) {
            (SearchMode::StringSearch, Some(query)) => vec![JsonEntry {
                key: query,
                count: table.get(query),
            }],
            _ => table
                .ranked(self.top)
                .into_iter()
                .map(|(key, count)| JsonEntry { key, count })
                .collect(),
        };

        let report = JsonReport {
            mode: search.mode.as_str(),
            query: search.query.as_deref(),
            results,
        };
        // a report of strings and integers always serializes
        serde_json::to_string(&report).unwrap_or_default()
    }
}

pub fn create_formatter(output: &OutputConfig) -> Box<dyn Formatter> {
    match output.format {
        OutputFormat::Default => Box::new(DefaultFormatter::new(output.top)),
        OutputFormat::Json => Box::new(JsonFormatter::new(output.top)),
    }
}

/// Render `table` according to the output settings
pub fn render(table: &CountTable, search: &SearchConfig, output: &OutputConfig) -> String {
    create_formatter(output).format(table, search)
}
