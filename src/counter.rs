//! Local counting over one rank's partition

use anyhow::Result;
use tracing::{debug, warn};

use crate::count_table::CountTable;
use crate::decode;
use crate::error::ProtocolError;
use crate::input::Row;
use crate::matcher::Matcher;
use crate::partition::Partition;
use crate::platform;
use crate::stats::CountStats;

/// Count matches in every row of `rows` owned by `partition`.
///
/// Rows that cannot be read or decoded are logged and skipped. A fatal
/// source error stops counting and is returned, as does a SIGINT/SIGTERM
/// (as `ProtocolError::Interrupted`).
pub fn count_partition<I>(
    rows: I,
    partition: Partition,
    matcher: &Matcher,
) -> Result<(CountTable, CountStats)>
where
    I: IntoIterator<Item = Result<Row>>,
{
    count_partition_until(rows, partition, matcher, platform::shutdown_requested)
}

/// `count_partition` with an explicit stop check, polled before every row
pub fn count_partition_until<I, F>(
    rows: I,
    partition: Partition,
    matcher: &Matcher,
    should_stop: F,
) -> Result<(CountTable, CountStats)>
where
    I: IntoIterator<Item = Result<Row>>,
    F: Fn() -> bool,
{
    let rank = partition.rank();
    let mut stats = CountStats::new();
    let mut table = CountTable::new();

    debug!(rank = rank.get(), world_size = partition.world_size(), "Counting partition");

    for row in rows {
        if should_stop() {
            debug!(rank = rank.get(), rows_read = stats.rows_read, "Counting interrupted");
            return Err(ProtocolError::Interrupted(rank).into());
        }
        let row = row?;
        stats.rows_read += 1;
        if !partition.owns(row.index()) {
            continue;
        }
        stats.rows_owned += 1;

        let record = match row {
            Row::Record(record) => record,
            Row::Malformed { index, reason } => {
                warn!(rank = rank.get(), index, %reason, "Skipping unreadable row");
                stats.records_skipped += 1;
                continue;
            }
        };

        match decode::decode(&record.payload) {
            Ok(tweet) => {
                let found = matcher.count(&tweet.text);
                stats.matches += found.total();
                stats.records_counted += 1;
                table = table.merge(found);
            }
            Err(e) => {
                warn!(rank = rank.get(), index = record.index, error = %e, "Skipping malformed tweet");
                stats.records_skipped += 1;
            }
        }
    }

    stats.finish();
    debug!(
        rank = rank.get(),
        keys = table.len(),
        counted = stats.records_counted,
        skipped = stats.records_skipped,
        "Partition counted"
    );
    Ok((table, stats))
}
