//! Render cycle timing and statistics

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Size of the rolling window for recent cycle times
const RECENT_WINDOW_SIZE: usize = 100;

/// Time spent in each phase of one render cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleTiming {
    pub deserialize: Duration,
    pub remap: Duration,
    pub transmit: Duration,
    /// Wall clock from frame receipt to end of transmit
    pub total: Duration,
}

impl CycleTiming {
    /// How far the cycle ran over `budget`, if it did
    pub fn overrun(&self, budget: Duration) -> Option<Duration> {
        self.total.checked_sub(budget).filter(|d| !d.is_zero())
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for CycleTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deserialize={:.2}ms || remap={:.2}ms || transmit={:.2}ms",
            ms(self.deserialize),
            ms(self.remap),
            ms(self.transmit)
        )
    }
}

/// Statistics over all render cycles of a worker
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Cycles rendered to completion
    pub cycles: u64,
    /// Cycles that exceeded the budget
    pub overruns: u64,
    /// Frames that could not be decoded
    pub decode_failures: u64,
    pub total_cycle_us: u64,
    pub last_cycle_us: u64,
    pub min_cycle_us: u64,
    pub max_cycle_us: u64,
    /// Rolling window of recent cycle times for jitter calculation
    pub recent_cycle_us: VecDeque<u64>,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self {
            cycles: 0,
            overruns: 0,
            decode_failures: 0,
            total_cycle_us: 0,
            last_cycle_us: 0,
            min_cycle_us: u64::MAX,
            max_cycle_us: 0,
            recent_cycle_us: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
        }
    }
}

impl CycleStats {
    /// Record a completed cycle
    pub fn record(&mut self, total: Duration, overrun: bool) {
        let us = total.as_micros() as u64;
        self.cycles += 1;
        if overrun {
            self.overruns += 1;
        }
        self.total_cycle_us += us;
        self.last_cycle_us = us;
        self.min_cycle_us = self.min_cycle_us.min(us);
        self.max_cycle_us = self.max_cycle_us.max(us);

        self.recent_cycle_us.push_back(us);
        if self.recent_cycle_us.len() > RECENT_WINDOW_SIZE {
            self.recent_cycle_us.pop_front();
        }
    }

    pub fn record_decode_failure(&mut self) {
        self.decode_failures += 1;
    }

    /// Average cycle time in microseconds
    pub fn avg_cycle_us(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.total_cycle_us as f64 / self.cycles as f64
        }
    }

    /// Jitter (max - min) over the recent window in microseconds
    pub fn jitter_us(&self) -> u64 {
        let min = self.recent_cycle_us.iter().min().copied().unwrap_or(0);
        let max = self.recent_cycle_us.iter().max().copied().unwrap_or(0);
        max.saturating_sub(min)
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min = if self.cycles == 0 { 0 } else { self.min_cycle_us };
        write!(
            f,
            "{} cycles, {} overruns, {} undecodable frames, cycle avg {:.0}us min {}us max {}us jitter {}us",
            self.cycles,
            self.overruns,
            self.decode_failures,
            self.avg_cycle_us(),
            min,
            self.max_cycle_us,
            self.jitter_us()
        )
    }
}
