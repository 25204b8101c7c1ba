use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Columns reserved for chart axes and borders
const CHART_CHROME_COLS: usize = 10;

/// One point on the destination RTT chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub rtt_ms: f64,
    /// Wall-clock label (MM:SS)
    pub label: String,
}

/// Bounded FIFO of destination latencies, one point per completed round
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryWindow {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Window sized for a chart occupying half of a `width`-column terminal
    pub fn for_width(width: u16) -> Self {
        Self::new(Self::capacity_for_width(width))
    }

    pub fn capacity_for_width(width: u16) -> usize {
        (width as usize / 2).saturating_sub(CHART_CHROME_COLS).max(1)
    }

    pub fn append(&mut self, rtt_ms: f64, label: impl Into<String>) {
        self.points.push_back(HistoryPoint {
            rtt_ms,
            label: label.into(),
        });
        self.evict();
    }

    /// Change capacity. Shrinking drops the oldest points right away.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.evict();
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    fn evict(&mut self) {
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryPoint> {
        self.points.iter().cloned().collect()
    }
}
