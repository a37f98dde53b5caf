//! In-memory LED driver

use super::LedDriver;
use crate::error::Result;
use crate::types::OutputLine;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Shared record of transmitted frames
#[derive(Debug, Clone, Default)]
pub struct FrameLog {
    frames: Arc<Mutex<Vec<(OutputLine, Vec<u8>)>>>,
}

impl FrameLog {
    /// Every frame in transmit order
    pub fn frames(&self) -> Vec<(OutputLine, Vec<u8>)> {
        self.frames.lock().clone()
    }

    /// Latest frame sent on `line`
    pub fn last(&self, line: OutputLine) -> Option<Vec<u8>> {
        self.frames
            .lock()
            .iter()
            .rev()
            .find(|(l, _)| *l == line)
            .map(|(_, data)| data.clone())
    }

    /// Number of frames sent on `line`
    pub fn count(&self, line: OutputLine) -> usize {
        self.frames.lock().iter().filter(|(l, _)| *l == line).count()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    fn record(&self, line: OutputLine, data: &[u8]) {
        self.frames.lock().push((line, data.to_vec()));
    }
}

/// Driver that keeps every frame in a [`FrameLog`]
#[derive(Debug, Default)]
pub struct MemoryDriver {
    log: FrameLog,
    delay: Option<Duration>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver recording into an existing log
    pub fn with_log(log: FrameLog) -> Self {
        Self { log, delay: None }
    }

    /// Simulate a slow line by sleeping on every transmit
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle on the recorded frames
    pub fn frames(&self) -> FrameLog {
        self.log.clone()
    }
}

impl LedDriver for MemoryDriver {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn transmit(&mut self, line: OutputLine, data: &[u8]) -> Result<()> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.log.record(line, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_log() {
        let log = FrameLog::default();
        let mut a = MemoryDriver::with_log(log.clone());
        let mut b = MemoryDriver::with_log(log.clone());

        a.transmit(OutputLine::Gpio18, &[1, 2, 3]).unwrap();
        b.transmit(OutputLine::Gpio21, &[4]).unwrap();
        a.transmit(OutputLine::Gpio18, &[5, 6, 7]).unwrap();

        assert_eq!(log.len(), 3);
        assert_eq!(log.count(OutputLine::Gpio18), 2);
        assert_eq!(log.last(OutputLine::Gpio18), Some(vec![5, 6, 7]));
        assert_eq!(log.last(OutputLine::Gpio2), None);

        log.clear();
        assert!(log.is_empty());
    }
}
