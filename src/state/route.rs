//! Per-hop route memory.
//!
//! Each hop keeps a hop-level accumulator covering every sample sent to that
//! position, plus one accumulator per distinct responder identity. Keeping
//! both lets load-balanced or flapping paths show up as several responders
//! without blending their latency profiles into a single row.

use serde::Serialize;
use std::collections::HashMap;

use super::sample::AsnInfo;
use super::stats::StatsAccumulator;

/// What the hop row currently shows as its responder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "identity", rename_all = "snake_case")]
pub enum HopIdentity {
    /// Sampled but never answered
    Unknown,
    /// Last sample answered by this responder
    Identified(String),
    /// Answered before, but the latest sample timed out
    TimedOut(String),
}

impl HopIdentity {
    /// The responder name, if one has been seen
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Unknown => None,
            Self::Identified(name) | Self::TimedOut(name) => Some(name),
        }
    }
}

/// Stats for one responder at one hop
#[derive(Debug, Clone, Serialize)]
pub struct Responder {
    pub identity: String,
    pub stats: StatsAccumulator,
    pub asn: Option<AsnInfo>,
    /// Last successful latency (ms)
    pub last_rtt: Option<f64>,
}

impl Responder {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            stats: StatsAccumulator::new(),
            asn: None,
            last_rtt: None,
        }
    }
}

/// Route state for a single hop index
#[derive(Debug, Clone, Serialize)]
pub struct HopRoute {
    pub hop: u8,
    /// Aggregate over every responder seen at this hop
    pub stats: StatsAccumulator,
    pub responders: HashMap<String, Responder>,
    /// `None` until the hop is sampled, and again after a trailing clear
    pub displayed: Option<HopIdentity>,
    /// Last identity that answered here; survives trailing clears
    pub last_identity: Option<String>,
    /// The latest response came from a different responder than before
    pub changed: bool,
    pub route_changes: u64,
    /// Last successful latency at this hop (ms)
    pub last_rtt: Option<f64>,
    /// The latest sample at this hop was lost
    pub last_lost: bool,
}

impl HopRoute {
    pub fn new(hop: u8) -> Self {
        Self {
            hop,
            stats: StatsAccumulator::new(),
            responders: HashMap::new(),
            displayed: None,
            last_identity: None,
            changed: false,
            route_changes: 0,
            last_rtt: None,
            last_lost: false,
        }
    }

    /// Responder currently displayed for this hop
    pub fn current_responder(&self) -> Option<&Responder> {
        self.displayed
            .as_ref()
            .and_then(|d| d.name())
            .and_then(|name| self.responders.get(name))
    }

    /// Responders ordered by sample count, busiest first
    pub fn responders_by_count(&self) -> Vec<&Responder> {
        let mut list: Vec<&Responder> = self.responders.values().collect();
        list.sort_by(|a, b| {
            b.stats
                .count()
                .cmp(&a.stats.count())
                .then_with(|| a.identity.cmp(&b.identity))
        });
        list
    }

    pub fn is_sampled(&self) -> bool {
        self.stats.count() > 0
    }

    fn reset(&mut self) {
        *self = Self::new(self.hop);
    }
}

/// Result of a single observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub hop: u8,
    pub lost: bool,
    pub route_changed: bool,
}

/// Hop index → responder statistics, for hops `1..=max_hops`
#[derive(Debug, Clone, Serialize)]
pub struct RouteTable {
    max_hops: u8,
    hops: Vec<HopRoute>,
}

impl RouteTable {
    pub fn new(max_hops: u8) -> Self {
        Self {
            max_hops,
            hops: (1..=max_hops).map(HopRoute::new).collect(),
        }
    }

    pub fn max_hops(&self) -> u8 {
        self.max_hops
    }

    /// Get hop by index (1-indexed)
    pub fn hop(&self, hop: u8) -> Option<&HopRoute> {
        if hop == 0 || hop > self.max_hops {
            None
        } else {
            self.hops.get(hop as usize - 1)
        }
    }

    fn hop_mut(&mut self, hop: u8) -> Option<&mut HopRoute> {
        if hop == 0 || hop > self.max_hops {
            None
        } else {
            self.hops.get_mut(hop as usize - 1)
        }
    }

    pub fn hops(&self) -> impl Iterator<Item = &HopRoute> {
        self.hops.iter()
    }

    pub fn contains(&self, hop: u8) -> bool {
        self.hop(hop).is_some()
    }

    /// Fold one sample outcome into the table.
    ///
    /// `rtt` is `None` for a lost sample. Returns `None` when `hop` is outside
    /// `1..=max_hops`; nothing is recorded in that case.
    pub fn observe(
        &mut self,
        hop: u8,
        identity: &str,
        rtt: Option<f64>,
        asn: Option<&AsnInfo>,
    ) -> Option<Observation> {
        let route = self.hop_mut(hop)?;

        let Some(rtt) = rtt else {
            route.stats.record_loss();
            route.changed = false;
            route.last_lost = true;

            if !identity.is_empty() {
                route
                    .responders
                    .entry(identity.to_string())
                    .or_insert_with(|| Responder::new(identity))
                    .stats
                    .record_loss();
            }

            // A hop that answered before turns into a timeout, otherwise it stays pending
            route.displayed = Some(match route.displayed.take() {
                Some(HopIdentity::Identified(name)) | Some(HopIdentity::TimedOut(name)) => {
                    HopIdentity::TimedOut(name)
                }
                Some(HopIdentity::Unknown) | None => HopIdentity::Unknown,
            });

            return Some(Observation {
                hop,
                lost: true,
                route_changed: false,
            });
        };

        route.stats.record_response(rtt);
        route.last_rtt = Some(rtt);
        route.last_lost = false;

        if identity.is_empty() {
            // Answered, but nobody to attribute it to
            route.changed = false;
            if route.displayed.is_none() {
                route.displayed = Some(HopIdentity::Unknown);
            }
            return Some(Observation {
                hop,
                lost: false,
                route_changed: false,
            });
        }

        let responder = route
            .responders
            .entry(identity.to_string())
            .or_insert_with(|| Responder::new(identity));
        responder.stats.record_response(rtt);
        responder.last_rtt = Some(rtt);
        if let Some(asn) = asn {
            responder.asn = Some(asn.clone());
        }

        let route_changed = route
            .last_identity
            .as_deref()
            .is_some_and(|prev| prev != identity);
        if route_changed {
            route.route_changes += 1;
            tracing::debug!(
                hop,
                from = route.last_identity.as_deref().unwrap_or_default(),
                to = identity,
                "route change"
            );
        }

        route.changed = route_changed;
        route.last_identity = Some(identity.to_string());
        route.displayed = Some(HopIdentity::Identified(identity.to_string()));

        Some(Observation {
            hop,
            lost: false,
            route_changed,
        })
    }

    /// Forget what hops beyond `hop` display, after a round ended at `hop`.
    /// Statistics are kept.
    pub fn clear_beyond(&mut self, hop: u8) {
        for route in self.hops.iter_mut().skip(hop as usize) {
            route.displayed = None;
            route.changed = false;
        }
    }

    /// Zero every accumulator and forget all identities
    pub fn reset(&mut self) {
        for route in &mut self.hops {
            route.reset();
        }
    }

    pub fn total_route_changes(&self) -> u64 {
        self.hops.iter().map(|h| h.route_changes).sum()
    }
}
