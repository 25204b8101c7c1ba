use serde::{Deserialize, Serialize};

/// Running latency and loss statistics for one series (a hop, or one
/// responder at a hop). Latencies are in milliseconds.
///
/// `count` includes losses; the mean, min and max only cover successful
/// samples and are reported as `None` until the first success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsAccumulator {
    count: u64,
    loss_count: u64,
    avg: f64,
    min: f64,
    max: f64,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample. Lost samples only move the counters.
    pub fn record(&mut self, latency: f64, lost: bool) {
        if lost {
            self.record_loss();
        } else {
            self.record_response(latency);
        }
    }

    /// Record a successful sample
    pub fn record_response(&mut self, latency: f64) {
        self.count += 1;
        let successes = self.successes();

        // Incremental mean, avoids keeping a running sum
        self.avg += (latency - self.avg) / successes as f64;

        if successes == 1 {
            self.min = latency;
            self.max = latency;
        } else {
            self.min = self.min.min(latency);
            self.max = self.max.max(latency);
        }
    }

    /// Record a sample that never got an answer
    pub fn record_loss(&mut self) {
        self.count += 1;
        self.loss_count += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Total samples, successes and losses
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn loss_count(&self) -> u64 {
        self.loss_count
    }

    pub fn successes(&self) -> u64 {
        self.count - self.loss_count
    }

    pub fn avg(&self) -> Option<f64> {
        (self.successes() > 0).then_some(self.avg)
    }

    pub fn min(&self) -> Option<f64> {
        (self.successes() > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.successes() > 0).then_some(self.max)
    }

    /// Loss percentage, 0 when nothing has been recorded
    pub fn loss_pct(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.loss_count as f64 / self.count as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_initial_state() {
        let stats = StatsAccumulator::new();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.loss_count(), 0);
        assert_eq!(stats.avg(), None);
        assert_eq!(stats.min(), None);
        assert_eq!(stats.max(), None);
        assert_eq!(stats.loss_pct(), 0.0);
    }

    #[test]
    fn test_two_responses() {
        let mut stats = StatsAccumulator::new();
        stats.record(10.0, false);
        stats.record(20.0, false);

        assert_eq!(stats.count(), 2);
        assert_eq!(stats.loss_count(), 0);
        assert_eq!(stats.avg(), Some(15.0));
        assert_eq!(stats.min(), Some(10.0));
        assert_eq!(stats.max(), Some(20.0));
    }

    #[test]
    fn test_loss_leaves_latency_untouched() {
        let mut stats = StatsAccumulator::new();
        stats.record(12.0, false);
        stats.record(0.0, true);
        stats.record(0.0, true);

        assert_eq!(stats.count(), 3);
        assert_eq!(stats.loss_count(), 2);
        assert_eq!(stats.successes(), 1);
        assert_eq!(stats.avg(), Some(12.0));
        assert_eq!(stats.min(), Some(12.0));
        assert_eq!(stats.max(), Some(12.0));
        assert!((stats.loss_pct() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_only_losses_has_no_latency() {
        let mut stats = StatsAccumulator::new();
        stats.record_loss();

        assert_eq!(stats.count(), 1);
        assert_eq!(stats.avg(), None);
        assert_eq!(stats.min(), None);
        assert_eq!(stats.loss_pct(), 100.0);
    }

    #[test]
    fn test_first_success_after_losses_sets_min_max() {
        let mut stats = StatsAccumulator::new();
        stats.record_loss();
        stats.record_loss();
        stats.record_response(42.0);

        assert_eq!(stats.min(), Some(42.0));
        assert_eq!(stats.max(), Some(42.0));
        assert_eq!(stats.avg(), Some(42.0));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut stats = StatsAccumulator::new();
        stats.record(5.0, false);
        stats.record(0.0, true);

        stats.reset();
        let once = stats.clone();
        stats.reset();

        assert_eq!(stats, once);
        assert_eq!(stats, StatsAccumulator::default());
    }

    proptest! {
        #[test]
        fn prop_matches_batch_statistics(samples in prop::collection::vec(0.01f64..5000.0, 1..200)) {
            let mut stats = StatsAccumulator::new();
            for &s in &samples {
                stats.record(s, false);
            }

            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

            prop_assert!((stats.avg().unwrap() - mean).abs() < 1e-6 * mean.max(1.0));
            prop_assert_eq!(stats.min(), Some(min));
            prop_assert_eq!(stats.max(), Some(max));
        }

        #[test]
        fn prop_loss_accounting(outcomes in prop::collection::vec(any::<bool>(), 0..300)) {
            let mut stats = StatsAccumulator::new();
            for &lost in &outcomes {
                stats.record(7.5, lost);
            }

            let losses = outcomes.iter().filter(|&&lost| lost).count() as u64;
            prop_assert_eq!(stats.count(), outcomes.len() as u64);
            prop_assert_eq!(stats.loss_count(), losses);
            if outcomes.is_empty() {
                prop_assert_eq!(stats.loss_pct(), 0.0);
            } else {
                let expected = losses as f64 / outcomes.len() as f64 * 100.0;
                prop_assert!((stats.loss_pct() - expected).abs() < 1e-9);
            }
        }
    }
}
