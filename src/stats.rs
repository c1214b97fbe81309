//! Classification of Xray stat counter names.
//!
//! The Xray stats API labels every counter with a structured name built from
//! `>>>`-separated segments:
//!
//! - `inbound>>>{tag}>>>traffic>>>{downlink|uplink}`
//! - `outbound>>>{tag}>>>traffic>>>{downlink|uplink}`
//! - `user>>>{email}>>>traffic>>>{downlink|uplink}`
//!
//! This module is the pure-Rust layer: it parses a borrowed name into a typed
//! record, or `None` when the name does not match the grammar exactly. There is
//! no partial result; an empty tag, an unknown direction token or a missing
//! segment all classify as `None`. The C ABI wrappers in [`crate::ffi`] flatten
//! these sum types into fixed-layout structs.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Tag of the inbound that Xray reserves for its own gRPC stats API. Its
/// counters are bookkeeping noise and are never accounted.
pub const API_TAG: &str = "api";

/// Static regex for inbound/outbound counter names. Compiled once at first use.
/// Pattern: {inbound|outbound}>>>{tag}>>>traffic>>>{downlink|uplink}
static TRAFFIC_STAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(inbound|outbound)>>>([^>]+)>>>traffic>>>(downlink|uplink)$")
        .expect("Invalid traffic stat regex pattern")
});

/// Static regex for per-user counter names. Compiled once at first use.
/// Pattern: user>>>{email}>>>traffic>>>{downlink|uplink}
static CLIENT_STAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^user>>>([^>]+)>>>traffic>>>(downlink|uplink)$")
        .expect("Invalid client stat regex pattern")
});

/// Traffic direction relative to the proxied client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to server.
    Uplink,
    /// Server to client.
    Downlink,
}

impl Direction {
    /// Parse a direction token. Unknown tokens are a parse failure for the
    /// whole name, never a defaulted direction.
    pub fn from_token(token: &str) -> Option<Direction> {
        match token {
            "uplink" => Some(Direction::Uplink),
            "downlink" => Some(Direction::Downlink),
            _ => None,
        }
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            Direction::Uplink => "uplink",
            Direction::Downlink => "downlink",
        }
    }

    #[must_use]
    pub fn is_downlink(&self) -> bool {
        matches!(self, Direction::Downlink)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Which side of the proxy a counter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficKind {
    Inbound,
    Outbound,
}

impl TrafficKind {
    pub fn from_token(token: &str) -> Option<TrafficKind> {
        match token {
            "inbound" => Some(TrafficKind::Inbound),
            "outbound" => Some(TrafficKind::Outbound),
            _ => None,
        }
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            TrafficKind::Inbound => "inbound",
            TrafficKind::Outbound => "outbound",
        }
    }
}

impl fmt::Display for TrafficKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// A classified inbound/outbound counter name.
///
/// The tag is always present and non-empty; a name without a usable tag does
/// not produce a `TrafficStat` at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficStat {
    pub kind: TrafficKind,
    pub tag: String,
    pub direction: Direction,
}

/// A classified per-user counter name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStat {
    pub email: String,
    pub direction: Direction,
}

/// Classify an inbound/outbound counter name.
///
/// Returns `None` for anything that does not match the grammar exactly: empty
/// input, missing segments, an empty tag, an unknown direction token, or the
/// reserved `api` tag.
pub fn parse_traffic_stat_name(name: &str) -> Option<TrafficStat> {
    let caps = TRAFFIC_STAT_RE.captures(name)?;

    let kind = TrafficKind::from_token(caps.get(1)?.as_str())?;
    let tag = caps.get(2)?.as_str();
    let direction = Direction::from_token(caps.get(3)?.as_str())?;

    if tag == API_TAG {
        return None;
    }

    Some(TrafficStat {
        kind,
        tag: tag.to_string(),
        direction,
    })
}

/// Classify a per-user counter name. Returns `None` on any mismatch.
pub fn parse_client_stat_name(name: &str) -> Option<ClientStat> {
    let caps = CLIENT_STAT_RE.captures(name)?;

    let email = caps.get(1)?.as_str();
    let direction = Direction::from_token(caps.get(2)?.as_str())?;

    Some(ClientStat {
        email: email.to_string(),
        direction,
    })
}

/// Format an inbound/outbound counter name the way the producer does.
///
/// Inverse of [`parse_traffic_stat_name`] for tags that do not contain `>`.
pub fn stat_name(kind: TrafficKind, tag: &str, direction: Direction) -> String {
    format!("{}>>>{}>>>traffic>>>{}", kind.as_token(), tag, direction.as_token())
}

/// Format a per-user counter name. Inverse of [`parse_client_stat_name`].
pub fn client_stat_name(email: &str, direction: Direction) -> String {
    format!("user>>>{}>>>traffic>>>{}", email, direction.as_token())
}
