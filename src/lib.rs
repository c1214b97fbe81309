//! Traffic stat name parsing and host system stats for the X-Panel process.
//!
//! The panel polls the Xray stats API and gets back flat counters keyed by
//! structured names (`inbound>>>tag>>>traffic>>>downlink`, `user>>>email>>>...`).
//! This library classifies those names into typed records and hands them back
//! across a C ABI, so the Go side never re-implements the naming convention.
//!
//! # Modules
//!
//! - [`stats`] - pure-Rust classifier for counter names
//! - [`ffi`] - C ABI records, parse entry points and release functions
//! - [`system`] - host connection/memory/CPU snapshots for the status page
//!
//! # Example
//!
//! ```
//! use xpanel_traffic_parser::{parse_traffic_stat_name, Direction, TrafficKind};
//!
//! let stat = parse_traffic_stat_name("inbound>>>vmess-tcp>>>traffic>>>downlink").unwrap();
//! assert_eq!(stat.kind, TrafficKind::Inbound);
//! assert_eq!(stat.tag, "vmess-tcp");
//! assert_eq!(stat.direction, Direction::Downlink);
//! ```
//!
//! Foreign callers link the `staticlib`/`cdylib` artifact against the header
//! generated into `include/traffic_parser.h` and must release every returned
//! string through the matching `free_*` function, exactly once.

pub mod ffi;
pub mod stats;
pub mod system;

// Re-export for convenience
pub use stats::{
    client_stat_name, parse_client_stat_name, parse_traffic_stat_name, stat_name, ClientStat,
    Direction, TrafficKind, TrafficStat,
};
