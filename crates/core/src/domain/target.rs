// Target predicates
//
// Targets stay plain strings end to end; these helpers decide whether a
// given string is an acceptable input for a tool.

use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// Shortest hostname accepted by `is_sanitised_hostname`
pub const MIN_HOSTNAME_LEN: usize = 3;

/// True for a bare IP address (v4 or v6)
pub fn is_ip(s: &str) -> bool {
    s.parse::<IpAddr>().is_ok()
}

/// True for a CIDR network such as `10.0.0.0/24` (host bits may be set)
pub fn is_ip_network(s: &str) -> bool {
    s.contains('/') && s.parse::<IpNetwork>().is_ok()
}

pub fn is_ip_or_network(s: &str) -> bool {
    is_ip(s) || is_ip_network(s)
}

/// Parse an address or network; bare addresses become host-sized networks
pub fn parse_network(s: &str) -> Option<IpNetwork> {
    match s.parse::<IpAddr>() {
        Ok(ip) => Some(IpNetwork::from(ip)),
        Err(_) => s.parse::<IpNetwork>().ok(),
    }
}

/// True if every address of `inner` also belongs to `outer`
pub fn network_within(inner: &IpNetwork, outer: &IpNetwork) -> bool {
    match (inner, outer) {
        (IpNetwork::V4(_), IpNetwork::V4(_)) | (IpNetwork::V6(_), IpNetwork::V6(_)) => {
            inner.prefix() >= outer.prefix() && outer.contains(inner.network())
        }
        _ => false,
    }
}

/// Hostname sanitiser for anything handed to a command line.
///
/// Accepts lower/upper-case ASCII alphanumerics, `-` and `.` only. Rejects
/// `..`, a leading `-` (would be read as a flag) and strings shorter than
/// `MIN_HOSTNAME_LEN`. Empty and control-character input fails by
/// construction.
pub fn is_sanitised_hostname(s: &str) -> bool {
    if s.len() < MIN_HOSTNAME_LEN {
        return false;
    }
    if s.starts_with('-') || s.contains("..") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_and_network_validation() {
        assert!(is_ip_or_network("1.2.3.4"));
        assert!(is_ip_or_network("2001:db8::1"));
        assert!(is_ip_or_network("192.168.0.0/16"));
        assert!(is_ip_or_network("192.168.1.10/24"));

        assert!(!is_ip_or_network("not-an-ip"));
        assert!(!is_ip_or_network("1.2.3.4/40"));
        assert!(!is_ip_or_network(""));
        assert!(!is_ip_or_network("1.2.3.4; rm -rf /"));
    }

    #[test]
    fn test_network_within() {
        let outer = parse_network("10.0.0.0/24").unwrap();
        let host = parse_network("10.0.0.42").unwrap();
        let sibling = parse_network("10.0.1.0/25").unwrap();
        let wider = parse_network("10.0.0.0/16").unwrap();
        let v6 = parse_network("::1").unwrap();

        assert!(network_within(&host, &outer));
        assert!(network_within(&outer, &outer));
        assert!(!network_within(&sibling, &outer));
        assert!(!network_within(&wider, &outer));
        assert!(!network_within(&v6, &outer));
    }

    #[test]
    fn test_hostname_sanitiser() {
        assert!(is_sanitised_hostname("example.com"));
        assert!(is_sanitised_hostname("WWW.Example-Site.org"));

        assert!(!is_sanitised_hostname(""));
        assert!(!is_sanitised_hostname("ab"));
        assert!(!is_sanitised_hostname("-oX.example.com"));
        assert!(!is_sanitised_hostname("a..b.com"));
        assert!(!is_sanitised_hostname("example.com\n"));
        assert!(!is_sanitised_hostname("exa mple.com"));
        assert!(!is_sanitised_hostname("example.com;id"));
    }
}
