use std::time::{Duration, Instant};

use crate::partition::Rank;

/// Statistics collected while one rank counts its partition
#[derive(Debug, Clone, Default)]
pub struct CountStats {
    pub rows_read: u64,
    pub rows_owned: u64,
    pub records_counted: u64,
    pub records_skipped: u64,
    pub matches: u64,
    pub processing_time: Duration,
    pub start_time: Option<Instant>,
}

impl CountStats {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn finish(&mut self) {
        if let Some(start) = self.start_time {
            self.processing_time = start.elapsed();
        }
    }

    pub fn format_stats(&self, rank: Rank) -> String {
        let mut output = format!(
            "{}: rows read: {} total, {} owned; records: {} counted, {} skipped; {} matches",
            rank,
            self.rows_read,
            self.rows_owned,
            self.records_counted,
            self.records_skipped,
            self.matches
        );

        let processing_time_ms = self.processing_time.as_millis();
        output.push_str(&format!(" in {}ms", processing_time_ms));

        if processing_time_ms > 0 && self.rows_read > 0 {
            let rows_per_sec = (self.rows_read as f64 * 1000.0) / processing_time_ms as f64;
            output.push_str(&format!(" ({:.0} rows/s)", rows_per_sec));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stats() {
        let stats = CountStats {
            rows_read: 2000,
            rows_owned: 500,
            records_counted: 498,
            records_skipped: 2,
            matches: 731,
            processing_time: Duration::from_millis(100),
            start_time: None,
        };
        assert_eq!(
            stats.format_stats(Rank::new(3)),
            "rank 3: rows read: 2000 total, 500 owned; records: 498 counted, 2 skipped; 731 matches in 100ms (20000 rows/s)"
        );
    }

    #[test]
    fn test_zero_time_has_no_rate() {
        let stats = CountStats::default();
        assert!(!stats.format_stats(Rank::COORDINATOR).contains("rows/s"));
    }

    #[test]
    fn test_finish_records_elapsed_time() {
        let mut stats = CountStats::new();
        std::thread::sleep(Duration::from_millis(5));
        stats.finish();
        assert!(stats.processing_time >= Duration::from_millis(5));
    }
}
