//! Caption timeline derived from the Program Clock Reference.
//!
//! The PCR is a 33-bit base at 90 kHz plus a 9-bit extension at 27 MHz.
//! The caption renderer runs on the same millisecond timeline, pushed back
//! by a fixed latency so captions line up with the decoded picture.

use std::time::Duration;

/// PCR to milliseconds: `(base * 300 + extension) / 300 / 90`.
pub fn pcr_to_millis(pcr_base: u64, pcr_extension: u16) -> f64 {
    (pcr_base as f64 * 300.0 + pcr_extension as f64) / 300.0 / 90.0
}

#[derive(Clone, Debug)]
pub struct ClockSynchronizer {
    latest_ms: Option<f64>,
    latency_ms: f64,
}

impl ClockSynchronizer {
    pub const DEFAULT_LATENCY: Duration = Duration::from_millis(450);

    pub fn new(latency: Duration) -> Self {
        Self {
            latest_ms: None,
            latency_ms: latency.as_millis() as f64,
        }
    }

    /// Stores a new sample; the latest sample always wins.
    pub fn record_pcr(&mut self, pcr_base: u64, pcr_extension: u16) -> f64 {
        let ms = pcr_to_millis(pcr_base, pcr_extension);
        self.latest_ms = Some(ms);
        ms
    }

    pub fn latest_ms(&self) -> Option<f64> {
        self.latest_ms
    }

    /// Caption time to push when the sample changed since `previous`.
    pub fn caption_time_since(&self, previous: Option<f64>) -> Option<f64> {
        match self.latest_ms {
            Some(current) if previous != Some(current) => Some(current - self.latency_ms),
            _ => None,
        }
    }
}

impl Default for ClockSynchronizer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LATENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcr_arithmetic() {
        assert_eq!(pcr_to_millis(900, 0), 10.0);
        assert!((pcr_to_millis(90, 150) - 90.5 / 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_caption_time_applies_latency() {
        let mut clock = ClockSynchronizer::default();
        assert_eq!(clock.caption_time_since(None), None);

        clock.record_pcr(900, 0);
        assert_eq!(clock.caption_time_since(None), Some(-440.0));
    }

    #[test]
    fn test_unchanged_sample_is_not_pushed_again() {
        let mut clock = ClockSynchronizer::default();
        clock.record_pcr(90_000, 0);
        let previous = clock.latest_ms();

        clock.record_pcr(90_000, 0);
        assert_eq!(clock.caption_time_since(previous), None);

        clock.record_pcr(180_000, 0);
        assert_eq!(clock.caption_time_since(previous), Some(2000.0 - 450.0));
    }
}
