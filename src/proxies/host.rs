//! Proxy host validation.

use std::net::IpAddr;

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// True for an IPv4/IPv6 literal or an RFC 1123 hostname.
pub fn is_valid_host(host: &str) -> bool {
    host.parse::<IpAddr>().is_ok() || is_valid_hostname(host)
}

fn is_valid_hostname(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    // A numeric final label would read as a malformed address.
    let numeric_tail = host
        .rsplit('.')
        .next()
        .is_some_and(|tail| tail.chars().all(|c| c.is_ascii_digit()));
    !numeric_tail && host.split('.').all(is_valid_label)
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
