//! C ABI surface consumed by the panel process over CGO.
//!
//! Every exported function follows the same boundary rules:
//!
//! - Only plain data crosses: fixed-layout `#[repr(C)]` structs with a
//!   discriminant plus a possibly-null string. Parse failure is encoded as the
//!   no-match record, never as an error value or a fault.
//! - Calls never unwind into the caller. Bodies run under
//!   [`std::panic::catch_unwind`] and flatten any internal panic into the
//!   no-match record.
//! - Strings handed out are freshly allocated `CString`s whose ownership moves
//!   to the caller. The caller releases each one exactly once through
//!   [`free_string`] or the matching `free_*_result` function.

use std::ffi::{CStr, CString};
use std::panic::catch_unwind;
use std::ptr;

use libc::{c_char, c_int, c_longlong};

use crate::stats::{
    parse_client_stat_name, parse_traffic_stat_name, ClientStat, TrafficKind, TrafficStat,
};

/// Discriminant telling the caller which accounting subsystem produced a
/// counter name. `None` doubles as the parse-failure sentinel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficType {
    None = 0,
    Inbound = 1,
    Outbound = 2,
    Client = 3,
}

/// Result of classifying an inbound/outbound counter name.
///
/// `tag` is null iff `traffic_type` is [`TrafficType::None`]. A non-null tag
/// is owned by the caller and must be released with [`free_string`] or
/// [`free_traffic_result`].
#[repr(C)]
pub struct TrafficResult {
    pub traffic_type: TrafficType,
    pub tag: *mut c_char,
    pub is_downlink: c_int,
}

impl TrafficResult {
    fn no_match() -> Self {
        TrafficResult {
            traffic_type: TrafficType::None,
            tag: ptr::null_mut(),
            is_downlink: 0,
        }
    }
}

/// Result of classifying a per-user counter name.
///
/// `email` is null iff `success` is 0. A non-null email is owned by the caller
/// and must be released with [`free_string`] or [`free_client_traffic_result`].
#[repr(C)]
pub struct ClientTrafficResult {
    pub success: c_int,
    pub email: *mut c_char,
    pub is_downlink: c_int,
}

impl ClientTrafficResult {
    fn no_match() -> Self {
        ClientTrafficResult {
            success: 0,
            email: ptr::null_mut(),
            is_downlink: 0,
        }
    }
}

/// One classified counter in a batch result. `identifier` carries the tag for
/// inbound/outbound entries and the email for client entries.
#[repr(C)]
pub struct TrafficEntry {
    pub traffic_type: TrafficType,
    pub identifier: *mut c_char,
    pub is_downlink: c_int,
    pub value: c_longlong,
}

/// Result of classifying a whole stats snapshot in one call.
///
/// Both arrays (and every entry identifier) are owned by the caller and must
/// be released with [`free_batch_parse_result`]. Null array with zero count
/// represents "no entries".
#[repr(C)]
pub struct BatchParseResult {
    pub traffic_entries: *mut TrafficEntry,
    pub traffic_count: c_int,
    pub client_entries: *mut TrafficEntry,
    pub client_count: c_int,
}

impl BatchParseResult {
    fn empty() -> Self {
        BatchParseResult {
            traffic_entries: ptr::null_mut(),
            traffic_count: 0,
            client_entries: ptr::null_mut(),
            client_count: 0,
        }
    }
}

/// Borrow a C string as `&str`. Null pointers and invalid UTF-8 both classify
/// as no-match upstream.
///
/// # Safety
/// `name` must be null or point to a NUL-terminated string valid for the call.
unsafe fn name_as_str<'a>(name: *const c_char) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    CStr::from_ptr(name).to_str().ok()
}

fn pack_traffic(stat: Option<TrafficStat>) -> TrafficResult {
    let Some(stat) = stat else {
        return TrafficResult::no_match();
    };

    // The tag came out of a NUL-terminated input, so CString construction
    // cannot see an interior NUL. Treat a failure as no-match all the same.
    let Ok(tag) = CString::new(stat.tag) else {
        return TrafficResult::no_match();
    };

    TrafficResult {
        traffic_type: match stat.kind {
            TrafficKind::Inbound => TrafficType::Inbound,
            TrafficKind::Outbound => TrafficType::Outbound,
        },
        tag: tag.into_raw(),
        is_downlink: stat.direction.is_downlink() as c_int,
    }
}

fn pack_client(stat: Option<ClientStat>) -> ClientTrafficResult {
    let Some(stat) = stat else {
        return ClientTrafficResult::no_match();
    };

    let Ok(email) = CString::new(stat.email) else {
        return ClientTrafficResult::no_match();
    };

    ClientTrafficResult {
        success: 1,
        email: email.into_raw(),
        is_downlink: stat.direction.is_downlink() as c_int,
    }
}

/// Classify a single inbound/outbound counter name.
///
/// Returns the no-match record (type `None`, null tag) on null input, invalid
/// UTF-8, or any name that does not match the grammar.
///
/// # Safety
/// - `name` must be null or a valid NUL-terminated C string.
/// - The caller must release a non-null `tag` exactly once, via
///   [`free_string`] or [`free_traffic_result`].
#[no_mangle]
pub unsafe extern "C" fn parse_traffic_stat(name: *const c_char) -> TrafficResult {
    catch_unwind(|| pack_traffic(name_as_str(name).and_then(parse_traffic_stat_name)))
        .unwrap_or_else(|_| TrafficResult::no_match())
}

/// Classify a single per-user counter name.
///
/// Returns the no-match record (`success` 0, null email) on null input,
/// invalid UTF-8, or any name that does not match the grammar.
///
/// # Safety
/// - `name` must be null or a valid NUL-terminated C string.
/// - The caller must release a non-null `email` exactly once, via
///   [`free_string`] or [`free_client_traffic_result`].
#[no_mangle]
pub unsafe extern "C" fn parse_client_traffic_stat(name: *const c_char) -> ClientTrafficResult {
    catch_unwind(|| pack_client(name_as_str(name).and_then(parse_client_stat_name)))
        .unwrap_or_else(|_| ClientTrafficResult::no_match())
}

fn entries_into_raw(entries: Vec<TrafficEntry>) -> (*mut TrafficEntry, c_int) {
    if entries.is_empty() {
        return (ptr::null_mut(), 0);
    }
    let count = entries.len() as c_int;
    let mut boxed = entries.into_boxed_slice();
    let ptr = boxed.as_mut_ptr();
    std::mem::forget(boxed);
    (ptr, count)
}

/// Classify a stats snapshot: `count` parallel (name, value) pairs.
///
/// Inbound/outbound matches land in `traffic_entries`, per-user matches in
/// `client_entries` (with type [`TrafficType::Client`]); names that match
/// neither grammar are dropped. Null arrays or a non-positive count yield an
/// empty result.
///
/// # Safety
/// - `names` must be null or point to `count` valid C string pointers; null
///   elements are skipped.
/// - `values` must be null or point to `count` values.
/// - The caller must release the result exactly once with
///   [`free_batch_parse_result`].
#[no_mangle]
pub unsafe extern "C" fn parse_stats_batch(
    names: *const *const c_char,
    values: *const c_longlong,
    count: c_int,
) -> BatchParseResult {
    if names.is_null() || values.is_null() || count <= 0 {
        return BatchParseResult::empty();
    }

    let names = std::slice::from_raw_parts(names, count as usize);
    let values = std::slice::from_raw_parts(values, count as usize);

    catch_unwind(|| {
        let mut traffic = Vec::new();
        let mut client = Vec::new();

        for (&name, &value) in names.iter().zip(values) {
            let Some(name) = name_as_str(name) else {
                continue;
            };

            let result = pack_traffic(parse_traffic_stat_name(name));
            if result.traffic_type != TrafficType::None {
                traffic.push(TrafficEntry {
                    traffic_type: result.traffic_type,
                    identifier: result.tag,
                    is_downlink: result.is_downlink,
                    value,
                });
                continue;
            }

            let result = pack_client(parse_client_stat_name(name));
            if result.success != 0 {
                client.push(TrafficEntry {
                    traffic_type: TrafficType::Client,
                    identifier: result.email,
                    is_downlink: result.is_downlink,
                    value,
                });
            }
        }

        let (traffic_entries, traffic_count) = entries_into_raw(traffic);
        let (client_entries, client_count) = entries_into_raw(client);
        BatchParseResult {
            traffic_entries,
            traffic_count,
            client_entries,
            client_count,
        }
    })
    .unwrap_or_else(|_| BatchParseResult::empty())
}

/// Release a string allocated by this library. No-op on null.
///
/// # Safety
/// `s` must be null or a pointer previously handed out by this library that
/// has not been released yet.
#[no_mangle]
pub unsafe extern "C" fn free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Release the tag embedded in a [`TrafficResult`]. Safe on a no-match record.
///
/// # Safety
/// `result` must come from [`parse_traffic_stat`] and not have been released.
#[no_mangle]
pub unsafe extern "C" fn free_traffic_result(result: TrafficResult) {
    free_string(result.tag);
}

/// Release the email embedded in a [`ClientTrafficResult`]. Safe on a no-match
/// record.
///
/// # Safety
/// `result` must come from [`parse_client_traffic_stat`] and not have been
/// released.
#[no_mangle]
pub unsafe extern "C" fn free_client_traffic_result(result: ClientTrafficResult) {
    free_string(result.email);
}

unsafe fn free_entries(entries: *mut TrafficEntry, count: c_int) {
    if entries.is_null() || count <= 0 {
        return;
    }
    let entries = Vec::from_raw_parts(entries, count as usize, count as usize);
    for entry in entries {
        free_string(entry.identifier);
    }
}

/// Release both entry arrays of a [`BatchParseResult`], including every entry
/// identifier. Safe on the empty result.
///
/// # Safety
/// `result` must come from [`parse_stats_batch`] and not have been released.
#[no_mangle]
pub unsafe extern "C" fn free_batch_parse_result(result: BatchParseResult) {
    free_entries(result.traffic_entries, result.traffic_count);
    free_entries(result.client_entries, result.client_count);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cstring(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn test_parse_inbound_traffic() {
        let name = cstring("inbound>>>vmess-tcp>>>traffic>>>downlink");
        unsafe {
            let result = parse_traffic_stat(name.as_ptr());
            assert_eq!(result.traffic_type, TrafficType::Inbound);
            assert_eq!(result.is_downlink, 1);

            let tag = CStr::from_ptr(result.tag).to_str().unwrap();
            assert_eq!(tag, "vmess-tcp");

            free_traffic_result(result);
        }
    }

    #[test]
    fn test_parse_outbound_traffic() {
        let name = cstring("outbound>>>direct>>>traffic>>>uplink");
        unsafe {
            let result = parse_traffic_stat(name.as_ptr());
            assert_eq!(result.traffic_type, TrafficType::Outbound);
            assert_eq!(result.is_downlink, 0);

            let tag = CStr::from_ptr(result.tag).to_str().unwrap();
            assert_eq!(tag, "direct");

            free_traffic_result(result);
        }
    }

    #[test]
    fn test_skip_api_tag() {
        let name = cstring("inbound>>>api>>>traffic>>>downlink");
        unsafe {
            let result = parse_traffic_stat(name.as_ptr());
            assert_eq!(result.traffic_type, TrafficType::None);
            assert!(result.tag.is_null());
            free_traffic_result(result);
        }
    }

    #[test]
    fn test_parse_client_traffic() {
        let name = cstring("user>>>user@example.com>>>traffic>>>downlink");
        unsafe {
            let result = parse_client_traffic_stat(name.as_ptr());
            assert_eq!(result.success, 1);
            assert_eq!(result.is_downlink, 1);

            let email = CStr::from_ptr(result.email).to_str().unwrap();
            assert_eq!(email, "user@example.com");

            free_client_traffic_result(result);
        }
    }

    #[test]
    fn test_invalid_format() {
        let name = cstring("invalid>>>format");
        unsafe {
            let result = parse_traffic_stat(name.as_ptr());
            assert_eq!(result.traffic_type, TrafficType::None);
            assert!(result.tag.is_null());

            let client_result = parse_client_traffic_stat(name.as_ptr());
            assert_eq!(client_result.success, 0);
            assert!(client_result.email.is_null());
        }
    }

    #[test]
    fn test_null_input() {
        unsafe {
            let result = parse_traffic_stat(ptr::null());
            assert_eq!(result.traffic_type, TrafficType::None);
            assert!(result.tag.is_null());

            let client_result = parse_client_traffic_stat(ptr::null());
            assert_eq!(client_result.success, 0);
        }
    }

    #[test]
    fn test_invalid_utf8_input() {
        // 0xFF can never appear in well-formed UTF-8
        let bytes = b"inbound>>>\xff>>>traffic>>>downlink\0";
        let name = CStr::from_bytes_with_nul(bytes).unwrap();
        unsafe {
            let result = parse_traffic_stat(name.as_ptr());
            assert_eq!(result.traffic_type, TrafficType::None);
            assert!(result.tag.is_null());
        }
    }

    #[test]
    fn test_free_string_null_is_noop() {
        unsafe {
            free_string(ptr::null_mut());
            free_string(ptr::null_mut());
        }
    }

    #[test]
    fn test_free_no_match_records_any_number_of_times() {
        unsafe {
            let result = parse_traffic_stat(ptr::null());
            // tag is null, so the record can be released repeatedly
            free_string(result.tag);
            free_string(result.tag);

            let client_result = parse_client_traffic_stat(ptr::null());
            free_client_traffic_result(client_result);
        }
    }

    #[test]
    fn test_batch_partitions_snapshot() {
        let names = [
            cstring("inbound>>>vmess-tcp>>>traffic>>>downlink"),
            cstring("outbound>>>direct>>>traffic>>>uplink"),
            cstring("user>>>alice@example.com>>>traffic>>>downlink"),
            cstring("inbound>>>api>>>traffic>>>downlink"),
            cstring("garbage"),
        ];
        let name_ptrs: Vec<*const c_char> = names.iter().map(|n| n.as_ptr()).collect();
        let values: Vec<c_longlong> = vec![100, 200, 300, 400, 500];

        unsafe {
            let result = parse_stats_batch(name_ptrs.as_ptr(), values.as_ptr(), 5);

            assert_eq!(result.traffic_count, 2);
            let traffic =
                std::slice::from_raw_parts(result.traffic_entries, result.traffic_count as usize);
            assert_eq!(traffic[0].traffic_type, TrafficType::Inbound);
            assert_eq!(traffic[0].value, 100);
            assert_eq!(traffic[0].is_downlink, 1);
            let tag = CStr::from_ptr(traffic[0].identifier).to_str().unwrap();
            assert_eq!(tag, "vmess-tcp");
            assert_eq!(traffic[1].traffic_type, TrafficType::Outbound);
            assert_eq!(traffic[1].value, 200);

            assert_eq!(result.client_count, 1);
            let client =
                std::slice::from_raw_parts(result.client_entries, result.client_count as usize);
            assert_eq!(client[0].traffic_type, TrafficType::Client);
            assert_eq!(client[0].value, 300);
            let email = CStr::from_ptr(client[0].identifier).to_str().unwrap();
            assert_eq!(email, "alice@example.com");

            free_batch_parse_result(result);
        }
    }

    #[test]
    fn test_batch_empty_and_null_inputs() {
        unsafe {
            let result = parse_stats_batch(ptr::null(), ptr::null(), 0);
            assert!(result.traffic_entries.is_null());
            assert_eq!(result.traffic_count, 0);
            assert!(result.client_entries.is_null());
            assert_eq!(result.client_count, 0);
            free_batch_parse_result(result);

            let values: Vec<c_longlong> = vec![1];
            let result = parse_stats_batch(ptr::null(), values.as_ptr(), 1);
            assert_eq!(result.traffic_count, 0);
            assert_eq!(result.client_count, 0);
            free_batch_parse_result(result);
        }
    }

    #[test]
    fn test_batch_skips_null_names() {
        let name = cstring("user>>>bob>>>traffic>>>uplink");
        let name_ptrs: Vec<*const c_char> = vec![ptr::null(), name.as_ptr()];
        let values: Vec<c_longlong> = vec![1, 2];

        unsafe {
            let result = parse_stats_batch(name_ptrs.as_ptr(), values.as_ptr(), 2);
            assert_eq!(result.traffic_count, 0);
            assert_eq!(result.client_count, 1);
            let client =
                std::slice::from_raw_parts(result.client_entries, result.client_count as usize);
            assert_eq!(client[0].value, 2);
            assert_eq!(client[0].is_downlink, 0);
            free_batch_parse_result(result);
        }
    }
}
