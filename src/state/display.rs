//! Render-ready projection of the monitor state.
//!
//! Everything here is derived from the route table and history window and is
//! rebuilt by the monitor after each update. Presentation code only reads it;
//! styling decisions are made from the semantic flags on each row.

use serde::{Deserialize, Serialize};

use super::history::{HistoryPoint, HistoryWindow};
use super::route::{HopIdentity, HopRoute, Responder, RouteTable};
use super::stats::StatsAccumulator;
use crate::monitor::MonitorState;

/// Which projection the presentation surface draws
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Hop table
    #[default]
    Table,
    /// Destination RTT line chart and per-hop loss bars
    Charts,
    /// Per-responder statistics for every hop
    Responders,
}

impl ViewMode {
    pub fn next(self) -> Self {
        match self {
            Self::Table => Self::Charts,
            Self::Charts => Self::Responders,
            Self::Responders => Self::Table,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Charts => "charts",
            Self::Responders => "responders",
        }
    }
}

/// How the host cell of a row should be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostMark {
    /// Nothing to show (never sampled, or cleared after a shorter round)
    #[default]
    Blank,
    /// Sampled, no responder seen yet
    Pending,
    Identified,
    /// Had a responder, latest sample got no answer
    TimedOut,
}

/// One row of the hop table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HopRow {
    pub hop: u8,
    pub host: String,
    pub mark: HostMark,
    /// Responder differs from the one shown before the latest reply
    pub changed: bool,
    pub asn: String,
    pub last: String,
    pub avg: String,
    pub min: String,
    pub max: String,
    pub sent: u64,
    pub loss: String,
    pub loss_pct: f64,
    pub route_changes: u64,
    pub responders: Vec<ResponderRow>,
}

impl HopRow {
    fn blank(hop: u8) -> Self {
        Self {
            hop,
            ..Default::default()
        }
    }

    pub fn project(route: &HopRoute) -> Self {
        let (host, mark) = match &route.displayed {
            None => (String::new(), HostMark::Blank),
            Some(HopIdentity::Unknown) => ("???".to_string(), HostMark::Pending),
            Some(HopIdentity::Identified(name)) => (name.clone(), HostMark::Identified),
            Some(HopIdentity::TimedOut(name)) => (name.clone(), HostMark::TimedOut),
        };

        let asn = route
            .current_responder()
            .and_then(|r| r.asn.as_ref())
            .map(|asn| asn.short_label())
            .unwrap_or_default();

        let last = if route.last_lost && mark == HostMark::TimedOut {
            "?".to_string()
        } else {
            format_ms(route.last_rtt)
        };

        let current = route.displayed.as_ref().and_then(|d| d.name());
        let responders = route
            .responders_by_count()
            .into_iter()
            .map(|r| ResponderRow::project(r, current == Some(r.identity.as_str())))
            .collect();

        Self {
            hop: route.hop,
            host,
            mark,
            changed: route.changed,
            asn,
            last,
            avg: format_ms(route.stats.avg()),
            min: format_ms(route.stats.min()),
            max: format_ms(route.stats.max()),
            sent: route.stats.count(),
            loss: format!("{:.1}", route.stats.loss_pct()),
            loss_pct: route.stats.loss_pct(),
            route_changes: route.route_changes,
            responders,
        }
    }

    pub fn timed_out(&self) -> bool {
        self.mark == HostMark::TimedOut
    }

    pub fn is_sampled(&self) -> bool {
        self.sent > 0
    }
}

/// Per-responder line in the responders view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponderRow {
    pub identity: String,
    pub asn: String,
    /// This responder is the one the hop row currently shows
    pub current: bool,
    pub count: u64,
    pub loss: String,
    pub loss_pct: f64,
    pub avg: String,
    pub min: String,
    pub max: String,
}

impl ResponderRow {
    fn project(responder: &Responder, current: bool) -> Self {
        let stats: &StatsAccumulator = &responder.stats;
        Self {
            identity: responder.identity.clone(),
            asn: responder
                .asn
                .as_ref()
                .map(|asn| asn.short_label())
                .unwrap_or_default(),
            current,
            count: stats.count(),
            loss: format!("{:.1}", stats.loss_pct()),
            loss_pct: stats.loss_pct(),
            avg: format_ms(stats.avg()),
            min: format_ms(stats.min()),
            max: format_ms(stats.max()),
        }
    }
}

/// One bar of the loss-per-hop chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossBar {
    pub hop: u8,
    pub label: String,
    pub loss_pct: f64,
}

impl LossBar {
    fn new(hop: u8) -> Self {
        Self {
            hop,
            label: format!("H{}", hop),
            loss_pct: 0.0,
        }
    }
}

/// Monitor-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorCounters {
    /// Samples folded into the statistics
    pub processed: u64,
    /// Samples dropped for an out-of-range hop
    pub dropped: u64,
    pub route_changes: u64,
    /// Final-hop samples seen (completed rounds)
    pub rounds: u64,
}

/// Snapshot handed to the presentation surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayState {
    /// Target label for the header
    pub target: String,
    pub max_hops: u8,
    /// One row per hop index, `rows[hop - 1]`
    pub rows: Vec<HopRow>,
    pub loss_series: Vec<LossBar>,
    pub history: Vec<HistoryPoint>,
    pub history_capacity: usize,
    pub view: ViewMode,
    pub width: u16,
    /// Hop of the latest final-hop sample
    pub dest_hop: Option<u8>,
    pub counters: MonitorCounters,
    pub state: MonitorState,
    /// Bumped on every publish
    pub generation: u64,
}

impl DisplayState {
    pub fn new(target: impl Into<String>, max_hops: u8, width: u16, view: ViewMode) -> Self {
        Self {
            target: target.into(),
            max_hops,
            rows: (1..=max_hops).map(HopRow::blank).collect(),
            loss_series: Vec::new(),
            history: Vec::new(),
            history_capacity: HistoryWindow::capacity_for_width(width),
            view,
            width,
            dest_hop: None,
            counters: MonitorCounters::default(),
            state: MonitorState::Running,
            generation: 0,
        }
    }

    pub fn row(&self, hop: u8) -> Option<&HopRow> {
        if hop == 0 {
            None
        } else {
            self.rows.get(hop as usize - 1)
        }
    }

    /// Sampled rows up to the destination, in hop order
    pub fn visible_rows(&self) -> impl Iterator<Item = &HopRow> {
        let limit = self.dest_hop.unwrap_or(self.max_hops);
        self.rows
            .iter()
            .filter(move |row| row.is_sampled() && row.hop <= limit)
    }

    /// Rebuild the row and loss bar of one hop
    pub fn project_hop(&mut self, route: &HopRoute) {
        let Some(row) = self.rows.get_mut(route.hop as usize - 1) else {
            return;
        };
        *row = HopRow::project(route);

        if route.is_sampled() {
            let index = route.hop as usize - 1;
            while self.loss_series.len() <= index {
                let next = self.loss_series.len() as u8 + 1;
                self.loss_series.push(LossBar::new(next));
            }
            self.loss_series[index].loss_pct = route.stats.loss_pct();
        }
    }

    /// Rebuild rows for every hop after `hop`
    pub fn project_beyond(&mut self, table: &RouteTable, hop: u8) {
        for route in table.hops().skip(hop as usize) {
            self.project_hop(route);
        }
    }

    /// Rebuild everything from scratch
    pub fn project_all(&mut self, table: &RouteTable, history: &HistoryWindow) {
        self.loss_series.clear();
        for route in table.hops() {
            self.project_hop(route);
        }
        self.set_history(history);
    }

    pub fn set_history(&mut self, history: &HistoryWindow) {
        self.history = history.to_vec();
        self.history_capacity = history.capacity();
    }
}

/// Milliseconds with two decimals, "-" when absent
fn format_ms(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AsnInfo;

    #[test]
    fn test_view_mode_cycle() {
        assert_eq!(ViewMode::Table.next(), ViewMode::Charts);
        assert_eq!(ViewMode::Charts.next(), ViewMode::Responders);
        assert_eq!(ViewMode::Responders.next(), ViewMode::Table);
        assert_eq!(ViewMode::default(), ViewMode::Table);
    }

    #[test]
    fn test_row_for_identified_hop() {
        let mut table = RouteTable::new(8);
        let asn = AsnInfo::new(15169, "GOOGLE - Google LLC, US");
        table.observe(1, "dns.google", Some(10.0), Some(&asn));
        table.observe(1, "dns.google", Some(20.0), None);

        let row = HopRow::project(table.hop(1).unwrap());
        assert_eq!(row.host, "dns.google");
        assert_eq!(row.mark, HostMark::Identified);
        assert!(!row.changed);
        assert_eq!(row.asn, "15169  GOOGLE");
        assert_eq!(row.last, "20.00");
        assert_eq!(row.avg, "15.00");
        assert_eq!(row.min, "10.00");
        assert_eq!(row.max, "20.00");
        assert_eq!(row.sent, 2);
        assert_eq!(row.loss, "0.0");
    }

    #[test]
    fn test_row_for_pending_hop() {
        let mut table = RouteTable::new(8);
        table.observe(3, "", None, None);

        let row = HopRow::project(table.hop(3).unwrap());
        assert_eq!(row.host, "???");
        assert_eq!(row.mark, HostMark::Pending);
        assert_eq!(row.last, "-");
        assert_eq!(row.avg, "-");
        assert_eq!(row.loss, "100.0");
        assert!(row.responders.is_empty());
    }

    #[test]
    fn test_row_for_timed_out_hop() {
        let mut table = RouteTable::new(8);
        table.observe(2, "r2", Some(4.0), None);
        table.observe(2, "", None, None);

        let row = HopRow::project(table.hop(2).unwrap());
        assert_eq!(row.host, "r2");
        assert!(row.timed_out());
        assert_eq!(row.last, "?");
        assert_eq!(row.avg, "4.00");
        assert_eq!(row.loss, "50.0");
    }

    #[test]
    fn test_route_change_row_highlight() {
        let mut table = RouteTable::new(8);
        table.observe(2, "a", Some(1.0), None);
        table.observe(2, "b", Some(1.0), None);

        let row = HopRow::project(table.hop(2).unwrap());
        assert!(row.changed);
        assert_eq!(row.host, "b");
        assert_eq!(row.route_changes, 1);
        assert_eq!(row.responders.len(), 2);
        assert!(row.responders.iter().any(|r| r.identity == "b" && r.current));
        assert!(row.responders.iter().any(|r| r.identity == "a" && !r.current));
    }

    #[test]
    fn test_loss_series_grows_and_overwrites() {
        let mut table = RouteTable::new(8);
        let mut display = DisplayState::new("t", 8, 80, ViewMode::Table);

        table.observe(3, "", None, None);
        display.project_hop(table.hop(3).unwrap());
        assert_eq!(display.loss_series.len(), 3);
        assert_eq!(display.loss_series[0].label, "H1");
        assert_eq!(display.loss_series[2].label, "H3");
        assert_eq!(display.loss_series[2].loss_pct, 100.0);

        table.observe(3, "r3", Some(1.0), None);
        display.project_hop(table.hop(3).unwrap());
        assert_eq!(display.loss_series.len(), 3);
        assert_eq!(display.loss_series[2].loss_pct, 50.0);

        table.observe(1, "r1", Some(1.0), None);
        display.project_hop(table.hop(1).unwrap());
        assert_eq!(display.loss_series.len(), 3);
        assert_eq!(display.loss_series[0].loss_pct, 0.0);
    }

    #[test]
    fn test_visible_rows_stop_at_destination() {
        let mut table = RouteTable::new(8);
        let mut display = DisplayState::new("t", 8, 80, ViewMode::Table);
        for hop in 1..=5 {
            table.observe(hop, "r", Some(1.0), None);
            display.project_hop(table.hop(hop).unwrap());
        }
        assert_eq!(display.visible_rows().count(), 5);

        display.dest_hop = Some(3);
        let hops: Vec<_> = display.visible_rows().map(|r| r.hop).collect();
        assert_eq!(hops, vec![1, 2, 3]);
    }

    #[test]
    fn test_row_lookup() {
        let display = DisplayState::new("t", 4, 80, ViewMode::Table);
        assert!(display.row(0).is_none());
        assert_eq!(display.row(4).unwrap().hop, 4);
        assert!(display.row(5).is_none());
        assert_eq!(display.history_capacity, 30);
    }
}
