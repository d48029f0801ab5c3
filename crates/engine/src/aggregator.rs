// In crates/engine/src/aggregator.rs

use crate::{Error, Result};
use chrono::{DateTime, Duration, Timelike, Utc};
use core_types::{AggregatedBar, Bar};

/// Combines raw one-minute bars into `timeframe_minutes` bars.
///
/// Buckets are aligned to UTC midnight, so a 5-minute bucket starts at :00,
/// :05, :10 and so on. Only buckets holding every one of their minutes are
/// emitted; partial buckets at either edge are dropped. Fewer bars than the
/// timeframe yields an empty result.
///
/// The input must be strictly ascending, minute-aligned and all for one
/// symbol; anything else is `InvalidInput`.
pub fn aggregate(bars: &[Bar], timeframe_minutes: u32) -> Result<Vec<AggregatedBar>> {
    if timeframe_minutes == 0 {
        return Err(Error::InvalidInput("timeframe must be positive".to_string()));
    }
    validate(bars)?;

    let bucket_len = timeframe_minutes as usize;
    if bars.len() < bucket_len {
        return Ok(Vec::new());
    }

    let mut output = Vec::with_capacity(bars.len() / bucket_len);
    let mut start = 0;
    while start < bars.len() {
        let bucket_start = bucket_start_of(bars[start].timestamp, timeframe_minutes);
        let mut end = start + 1;
        while end < bars.len() && bucket_start_of(bars[end].timestamp, timeframe_minutes) == bucket_start {
            end += 1;
        }

        // Ascending, minute-aligned, and in one bucket: a full count means no gaps.
        let bucket = &bars[start..end];
        if bucket.len() == bucket_len {
            output.push(combine(bucket, bucket_start));
        }
        start = end;
    }

    Ok(output)
}

fn validate(bars: &[Bar]) -> Result<()> {
    let Some(first) = bars.first() else {
        return Ok(());
    };
    for (i, bar) in bars.iter().enumerate() {
        if bar.timestamp.second() != 0 || bar.timestamp.nanosecond() != 0 {
            return Err(Error::InvalidInput(format!(
                "bar {} at {} is not aligned to a minute",
                i, bar.timestamp
            )));
        }
        if bar.symbol != first.symbol {
            return Err(Error::InvalidInput(format!(
                "bar {} is for {} but the series is for {}",
                i, bar.symbol, first.symbol
            )));
        }
        if i > 0 && bars[i - 1].timestamp >= bar.timestamp {
            return Err(Error::InvalidInput(format!(
                "bar {} at {} is not after {}",
                i,
                bar.timestamp,
                bars[i - 1].timestamp
            )));
        }
    }
    Ok(())
}

fn bucket_start_of(timestamp: DateTime<Utc>, timeframe_minutes: u32) -> DateTime<Utc> {
    let minute_of_day = timestamp.hour() * 60 + timestamp.minute();
    let offset = minute_of_day % timeframe_minutes;
    timestamp - Duration::minutes(i64::from(offset))
}

fn combine(bucket: &[Bar], bucket_start: DateTime<Utc>) -> AggregatedBar {
    let first = &bucket[0];
    let last = &bucket[bucket.len() - 1];
    AggregatedBar {
        symbol: first.symbol.clone(),
        open: first.open,
        high: bucket.iter().map(|b| b.high).max().unwrap_or(first.high),
        low: bucket.iter().map(|b| b.low).min().unwrap_or(first.low),
        close: last.close,
        volume: bucket.iter().map(|b| b.volume).sum(),
        bucket_start,
    }
}
