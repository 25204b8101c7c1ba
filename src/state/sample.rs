use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// ASN information attached to a sample by the tracer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnInfo {
    pub number: u32,
    /// Registry holder string, e.g. "GOOGLE - Google LLC, US"
    pub holder: String,
}

impl AsnInfo {
    pub fn new(number: u32, holder: impl Into<String>) -> Self {
        Self {
            number,
            holder: holder.into(),
        }
    }

    /// Short label: the number and the first word of the holder
    pub fn short_label(&self) -> String {
        match self.holder.split_whitespace().next() {
            Some(word) => format!("{:<6} {}", self.number, word),
            None => self.number.to_string(),
        }
    }
}

/// One measurement: a single sample at a single hop in one round.
///
/// A missing or zero `rtt` means the sample was lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Hop index as reported. Kept wide so out-of-range values reach the
    /// monitor and are counted as dropped rather than failing to parse.
    pub hop: i64,
    /// Resolved hostname of the responder, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Raw responder address, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<IpAddr>,
    #[serde(default, rename = "rtt_ms", with = "rtt_ms_serde")]
    pub rtt: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<AsnInfo>,
    /// Set on the final hop of a round (destination reached)
    #[serde(default)]
    pub last: bool,
}

impl Sample {
    /// A sample answered by `host` after `rtt_ms` milliseconds.
    ///
    /// An `rtt_ms` that is negative, NaN or too large for a `Duration` makes
    /// the sample a lost one.
    pub fn reply(hop: u8, host: impl Into<String>, rtt_ms: f64) -> Self {
        Self {
            hop: hop.into(),
            host: Some(host.into()),
            addr: None,
            rtt: Duration::try_from_secs_f64(rtt_ms / 1000.0).ok(),
            asn: None,
            last: false,
        }
    }

    /// A lost sample with no responder
    pub fn timeout(hop: u8) -> Self {
        Self {
            hop: hop.into(),
            host: None,
            addr: None,
            rtt: None,
            asn: None,
            last: false,
        }
    }

    pub fn with_last(mut self) -> Self {
        self.last = true;
        self
    }

    pub fn with_asn(mut self, asn: AsnInfo) -> Self {
        self.asn = Some(asn);
        self
    }

    pub fn with_addr(mut self, addr: IpAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Responder identity: hostname if known, else the address, else empty
    pub fn identity(&self) -> String {
        match (&self.host, &self.addr) {
            (Some(host), _) if !host.is_empty() => host.clone(),
            (_, Some(addr)) => addr.to_string(),
            _ => String::new(),
        }
    }

    /// Latency in milliseconds, `None` when the sample was lost
    pub fn rtt_ms(&self) -> Option<f64> {
        self.rtt
            .filter(|rtt| !rtt.is_zero())
            .map(|rtt| rtt.as_secs_f64() * 1000.0)
    }

    pub fn is_lost(&self) -> bool {
        self.rtt_ms().is_none()
    }
}

/// Serde helper: optional Duration as fractional milliseconds
mod rtt_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(rtt: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        rtt.map(|d| d.as_secs_f64() * 1000.0).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(ms) = Option::<f64>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom(format!("invalid rtt_ms: {}", ms)));
        }
        Duration::try_from_secs_f64(ms / 1000.0)
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid rtt_ms {}: {}", ms, e)))
    }
}
