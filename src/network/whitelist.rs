//! IP whitelist matching.
//!
//! Configured entries are IP addresses or CIDR blocks. Each one is turned into an
//! inclusive `[network, broadcast]` range over the 16-byte form of the address, so
//! IPv4 and IPv6 entries are compared uniformly (IPv4 maps to `::ffff:a.b.c.d`).
//!
//! ```
//! use mailgate::network::whitelist::WhitelistMatcher;
//!
//! let matcher = WhitelistMatcher::build(&["10.0.0.0/8", "::1"]).unwrap();
//! assert!(matcher.contains("10.255.255.255"));
//! assert!(!matcher.contains("11.0.0.0"));
//! assert!(matcher.contains("::1"));
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use log::{debug, error};

use crate::error_handling::types::ConfigError;

/// One inclusive address range, both bounds in 16-byte form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistRange {
    pub start: [u8; 16],
    pub end: [u8; 16],
    /// Prefix length as configured; kept for diagnostics only.
    pub mask: u8,
}

impl WhitelistRange {
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        let entry = entry.trim();
        let cidr = if entry.contains('/') {
            entry.to_string()
        } else if entry.contains(':') {
            format!("{}/128", entry)
        } else {
            format!("{}/32", entry)
        };

        let bad = |reason: &str| {
            error!("Invalid whitelist ip specified '{}': {}", cidr, reason);
            ConfigError::BadIPFormatting(format!("'{}': {}", cidr, reason))
        };

        let (addr, mask) = cidr.split_once('/').ok_or_else(|| bad("missing prefix"))?;
        let addr: IpAddr = addr.parse().map_err(|_| bad("invalid address"))?;
        let mask: u8 = mask.parse().map_err(|_| bad("invalid prefix length"))?;

        let range = match addr {
            IpAddr::V4(a) => {
                if mask > 32 {
                    return Err(bad("prefix length exceeds 32"));
                }
                let host_bits = u32::MAX.checked_shr(u32::from(mask)).unwrap_or(0);
                let start = u32::from(a) & !host_bits;
                Self {
                    start: to16(IpAddr::V4(Ipv4Addr::from(start))),
                    end: to16(IpAddr::V4(Ipv4Addr::from(start | host_bits))),
                    mask,
                }
            }
            IpAddr::V6(a) => {
                if mask > 128 {
                    return Err(bad("prefix length exceeds 128"));
                }
                let host_bits = u128::MAX.checked_shr(u32::from(mask)).unwrap_or(0);
                let start = u128::from(a) & !host_bits;
                Self {
                    start: to16(IpAddr::V6(Ipv6Addr::from(start))),
                    end: to16(IpAddr::V6(Ipv6Addr::from(start | host_bits))),
                    mask,
                }
            }
        };
        Ok(range)
    }

    pub fn contains(&self, candidate: &[u8; 16]) -> bool {
        candidate >= &self.start && candidate <= &self.end
    }
}

/// Immutable set of whitelist ranges, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct WhitelistMatcher {
    ranges: Vec<WhitelistRange>,
}

impl WhitelistMatcher {
    /// Parses every entry; any malformed entry fails the whole build.
    pub fn build<S: AsRef<str>>(entries: &[S]) -> Result<Self, ConfigError> {
        let ranges = entries
            .iter()
            .map(|e| WhitelistRange::parse(e.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Whitelist built with {} range(s)", ranges.len());
        Ok(Self { ranges })
    }

    /// Unparsable addresses are never whitelisted.
    pub fn contains(&self, address: &str) -> bool {
        match address.trim().parse::<IpAddr>() {
            Ok(ip) => self.contains_addr(ip),
            Err(_) => false,
        }
    }

    pub fn contains_addr(&self, address: IpAddr) -> bool {
        let candidate = to16(address);
        self.ranges.iter().any(|r| r.contains(&candidate))
    }

    pub fn ranges(&self) -> &[WhitelistRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

fn to16(address: IpAddr) -> [u8; 16] {
    match address {
        IpAddr::V4(a) => a.to_ipv6_mapped().octets(),
        IpAddr::V6(a) => a.octets(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_cidr_bounds() {
        let matcher = WhitelistMatcher::build(&["10.0.0.0/8"]).unwrap();
        assert!(matcher.contains("10.5.5.5"));
        assert!(matcher.contains("10.0.0.0"));
        assert!(matcher.contains("10.255.255.255"));
        assert!(!matcher.contains("11.0.0.0"));
        assert!(!matcher.contains("9.255.255.255"));
    }

    #[test]
    fn test_host_bits_in_entry_are_masked() {
        let range = WhitelistRange::parse("192.168.1.77/24").unwrap();
        assert_eq!(range.start, to16("192.168.1.0".parse().unwrap()));
        assert_eq!(range.end, to16("192.168.1.255".parse().unwrap()));
        assert_eq!(range.mask, 24);
    }

    #[test]
    fn test_bare_addresses_are_single_hosts() {
        let matcher = WhitelistMatcher::build(&["192.0.2.10", "2001:db8::1"]).unwrap();
        assert_eq!(matcher.ranges()[0].mask, 32);
        assert_eq!(matcher.ranges()[1].mask, 128);
        assert!(matcher.contains("192.0.2.10"));
        assert!(!matcher.contains("192.0.2.11"));
        assert!(!matcher.contains("192.0.2.9"));
        assert!(matcher.contains("2001:db8::1"));
        assert!(!matcher.contains("2001:db8::2"));
    }

    #[test]
    fn test_ipv6_cidr_bounds() {
        let matcher = WhitelistMatcher::build(&["2001:db8::/32"]).unwrap();
        assert!(matcher.contains("2001:db8::"));
        assert!(matcher.contains("2001:db8:ffff:ffff:ffff:ffff:ffff:ffff"));
        assert!(matcher.contains("2001:db8:1234::42"));
        assert!(!matcher.contains("2001:db9::"));
        assert!(!matcher.contains("2001:db7:ffff:ffff:ffff:ffff:ffff:ffff"));
    }

    #[test]
    fn test_overlapping_ranges() {
        let matcher = WhitelistMatcher::build(&["10.0.0.0/8", "10.1.0.0/16"]).unwrap();
        assert!(matcher.contains("10.1.2.3"));
        assert!(matcher.contains("10.200.0.1"));
    }

    #[test]
    fn test_zero_prefix_matches_whole_family() {
        let matcher = WhitelistMatcher::build(&["0.0.0.0/0"]).unwrap();
        assert!(matcher.contains("0.0.0.0"));
        assert!(matcher.contains("255.255.255.255"));
        assert!(!matcher.contains("2001:db8::1"));
    }

    #[test]
    fn test_unparsable_candidate_is_not_whitelisted() {
        let matcher = WhitelistMatcher::build(&["0.0.0.0/0"]).unwrap();
        assert!(!matcher.contains(""));
        assert!(!matcher.contains("unknown"));
        assert!(!matcher.contains("10.0.0.256"));
    }

    #[test]
    fn test_empty_whitelist() {
        let matcher = WhitelistMatcher::build::<&str>(&[]).unwrap();
        assert!(matcher.is_empty());
        assert!(!matcher.contains("127.0.0.1"));
    }

    #[test]
    fn test_malformed_entries_fail_build() {
        for entry in ["not-an-ip", "10.0.0.0/33", "::/129", "10.0.0.0/x", "10.0.0/8"] {
            let err = WhitelistMatcher::build(&["127.0.0.1", entry]).unwrap_err();
            assert!(
                matches!(err, ConfigError::BadIPFormatting(_)),
                "entry {entry} should be rejected"
            );
        }
    }
}
