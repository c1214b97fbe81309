//! Host system snapshots for the panel status page.
//!
//! Exposes connection counts, memory and CPU figures over the same C ABI as
//! the stat name parser. Socket counts come straight from `/proc/net`, the
//! rest from the `sysinfo` crate. All collectors are read-only and flatten
//! errors into sentinel values at the boundary (`-1` counts, zeroed stats).

use std::fs;

use anyhow::{Context, Result};
use sysinfo::{System, MINIMUM_CPU_UPDATE_INTERVAL};

/// Fixed-layout snapshot filled in by [`get_system_stats`].
#[repr(C)]
pub struct SystemStats {
    pub tcp_count: i32,
    pub udp_count: i32,
    pub memory_used: u64,
    pub memory_total: u64,
    pub cpu_usage: f32,
}

/// Count the connection rows of one or more `/proc/net` tables.
///
/// The first path must exist (every Linux kernel provides the IPv4 table);
/// later paths are optional, kernels built without IPv6 have no `tcp6`/`udp6`.
fn count_proc_net_entries(required: &str, optional: &[&str]) -> Result<i32> {
    let mut count = entry_count(
        &fs::read_to_string(required).with_context(|| format!("Failed to read {required}"))?,
    );

    for path in optional {
        if let Ok(content) = fs::read_to_string(path) {
            count += entry_count(&content);
        }
    }

    Ok(count)
}

/// Rows in a `/proc/net` socket table, excluding the header line.
fn entry_count(content: &str) -> i32 {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with("sl"))
        .filter(|line| !line.trim().is_empty())
        .count() as i32
}

fn tcp_connection_count() -> Result<i32> {
    count_proc_net_entries("/proc/net/tcp", &["/proc/net/tcp6"])
}

fn udp_connection_count() -> Result<i32> {
    count_proc_net_entries("/proc/net/udp", &["/proc/net/udp6"])
}

/// (used, total) physical memory in bytes.
fn memory_stats() -> (u64, u64) {
    let mut sys = System::new();
    sys.refresh_memory();
    (sys.used_memory(), sys.total_memory())
}

/// Global CPU utilization in percent, sampled over the minimum interval
/// `sysinfo` supports. Blocks for that interval; callers poll this rarely.
fn cpu_usage_percent() -> f32 {
    let mut sys = System::new();
    sys.refresh_cpu_usage();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();
    sys.global_cpu_usage()
}

/// Number of open TCP sockets (IPv4 + IPv6), or `-1` on error.
#[no_mangle]
pub extern "C" fn get_tcp_count() -> i32 {
    tcp_connection_count().unwrap_or(-1)
}

/// Number of open UDP sockets (IPv4 + IPv6), or `-1` on error.
#[no_mangle]
pub extern "C" fn get_udp_count() -> i32 {
    udp_connection_count().unwrap_or(-1)
}

/// Physical memory in use, in bytes.
#[no_mangle]
pub extern "C" fn get_memory_used() -> u64 {
    memory_stats().0
}

/// Total physical memory, in bytes.
#[no_mangle]
pub extern "C" fn get_memory_total() -> u64 {
    memory_stats().1
}

/// Global CPU utilization in percent.
#[no_mangle]
pub extern "C" fn get_cpu_usage() -> f32 {
    cpu_usage_percent()
}

/// Fill a caller-provided [`SystemStats`]. No-op on a null pointer.
///
/// # Safety
/// `stats` must be null or point to writable memory of the right layout.
#[no_mangle]
pub unsafe extern "C" fn get_system_stats(stats: *mut SystemStats) {
    if stats.is_null() {
        return;
    }

    let (memory_used, memory_total) = memory_stats();
    let stats = &mut *stats;
    stats.tcp_count = get_tcp_count();
    stats.udp_count = get_udp_count();
    stats.memory_used = memory_used;
    stats.memory_total = memory_total;
    stats.cpu_usage = get_cpu_usage();
}
