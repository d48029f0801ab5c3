// In crates/engine/src/buffer.rs

use core_types::Bar;

/// The raw one-minute bars of one strategy instance.
///
/// Kept strictly ascending by timestamp with no duplicates. Bars only ever
/// enter; nothing is removed or modified.
#[derive(Debug, Clone, Default)]
pub struct BarBuffer {
    bars: Vec<Bar>,
}

impl BarBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bar in timestamp order. Returns `false`, leaving the buffer
    /// untouched, if a bar with the same timestamp is already present.
    pub fn insert(&mut self, bar: Bar) -> bool {
        // Live bars almost always land at the end.
        if self.bars.last().is_none_or(|last| last.timestamp < bar.timestamp) {
            self.bars.push(bar);
            return true;
        }
        match self.bars.binary_search_by_key(&bar.timestamp, |b| b.timestamp) {
            Ok(_) => false,
            Err(position) => {
                self.bars.insert(position, bar);
                true
            }
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use core_types::Symbol;
    use rust_decimal::Decimal;

    fn bar(minute: i64, close: i64) -> Bar {
        let start = Utc.with_ymd_and_hms(2025, 3, 4, 14, 30, 0).unwrap();
        Bar {
            symbol: Symbol::new("SPY"),
            open: Decimal::from(close),
            high: Decimal::from(close),
            low: Decimal::from(close),
            close: Decimal::from(close),
            volume: Decimal::from(100),
            timestamp: start + Duration::minutes(minute),
        }
    }

    #[test]
    fn redelivered_bar_is_ignored() {
        let mut buffer = BarBuffer::new();
        assert!(buffer.insert(bar(0, 10)));
        assert!(buffer.insert(bar(1, 11)));

        assert!(!buffer.insert(bar(1, 99)));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.bars()[1].close, Decimal::from(11));
    }

    #[test]
    fn late_bars_are_placed_in_order() {
        let mut buffer = BarBuffer::new();
        buffer.insert(bar(0, 1));
        buffer.insert(bar(2, 3));
        assert!(buffer.insert(bar(1, 2)));

        let minutes: Vec<_> = buffer.bars().iter().map(|b| b.close).collect();
        assert_eq!(minutes, vec![Decimal::from(1), Decimal::from(2), Decimal::from(3)]);
    }
}
