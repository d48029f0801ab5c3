// In crates/engine/src/state.rs

use crate::buffer::BarBuffer;
use core_types::{Bar, StrategyConfig};

/// Evaluation happens this many minutes after a bucket boundary, giving the
/// bucket's final bar time to settle.
pub const PROCESSING_DELAY_MINUTES: u32 = 1;

/// Everything the supervisor tracks for one strategy instance.
///
/// Never shared between instances, even when they trade the same symbol.
#[derive(Debug, Clone)]
pub struct StrategyRuntimeState {
    config: StrategyConfig,
    buffer: BarBuffer,
    boundary_reached: bool,
}

impl StrategyRuntimeState {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            config,
            buffer: BarBuffer::new(),
            boundary_reached: false,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn buffer(&self) -> &BarBuffer {
        &self.buffer
    }

    pub fn boundary_reached(&self) -> bool {
        self.boundary_reached
    }

    /// Buffers a bar. `false` means its timestamp was already present.
    pub fn ingest(&mut self, bar: Bar) -> bool {
        self.buffer.insert(bar)
    }

    /// Sets the boundary latch if `minute` falls on a bucket boundary.
    /// Returns `true` only on the call that sets it; it never resets.
    ///
    /// A zero timeframe has no boundaries, so it never latches.
    pub fn observe_boundary(&mut self, minute: u32) -> bool {
        if self.boundary_reached || minute.checked_rem(self.config.timeframe_minutes) != Some(0) {
            return false;
        }
        self.boundary_reached = true;
        true
    }

    /// Whether the bar at `minute` should trigger aggregation and evaluation.
    pub fn is_due(&self, minute: u32) -> bool {
        self.boundary_reached
            && (minute + PROCESSING_DELAY_MINUTES).checked_rem(self.config.timeframe_minutes) == Some(0)
    }
}
