//! Source-IP hash scheduling.

use std::net::Ipv4Addr;

use crate::scheduler::{BackendSet, Scheduler};

/// Maps a client IPv4 address to `backends[ipv4_as_u32 mod N]`.
///
/// The same source address always lands on the same backend, which gives TCP
/// clients affinity without any proxy-side state.
///
/// Only IPv4 is understood. Any other host (IPv6, hostnames, garbage) converts
/// to `0` and is sent to the first backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct IpHash;

impl Scheduler for IpHash {
    fn select<'a>(&self, client_key: &str, backends: &'a BackendSet) -> &'a str {
        backends.pick(u64::from(ipv4_value(split_host(client_key))))
    }
}

/// Host part of `host:port` or `[host]:port`; the whole key if there is no port.
fn split_host(key: &str) -> &str {
    let host = match key.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => key,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}

/// Big-endian integer value of a dotted quad, or 0 if `host` is not IPv4.
fn ipv4_value(host: &str) -> u32 {
    host.parse::<Ipv4Addr>().map(u32::from).unwrap_or(0)
}
