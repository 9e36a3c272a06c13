//! Network allow-lists.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::ConfigError;

/// A list of IP networks in CIDR notation.
///
/// When configured, engines only talk to peers inside one of the networks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Netlist {
    nets: Vec<Network>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Network {
    addr: IpAddr,
    prefix: u8,
}

impl Network {
    fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

fn prefix_mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn prefix_mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

impl Netlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list such as `10.0.0.0/8,192.168.0.0/16`.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        let mut netlist = Self::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            netlist.add(entry)?;
        }
        Ok(netlist)
    }

    /// Add a single CIDR entry.
    pub fn add(&mut self, cidr: &str) -> Result<(), ConfigError> {
        let (addr, prefix) = cidr
            .split_once('/')
            .ok_or_else(|| ConfigError::InvalidNetlist(format!("missing prefix length in '{}'", cidr)))?;

        let addr: IpAddr = addr
            .parse()
            .map_err(|e| ConfigError::InvalidNetlist(format!("'{}': {}", cidr, e)))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|e| ConfigError::InvalidNetlist(format!("'{}': {}", cidr, e)))?;

        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(ConfigError::InvalidNetlist(format!(
                "prefix /{} too long for {}",
                prefix, addr
            )));
        }

        self.nets.push(Network { addr, prefix });
        Ok(())
    }

    /// Whether `ip` falls inside any of the networks.
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.nets.iter().any(|net| net.contains(ip))
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }
}

impl FromStr for Netlist {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Netlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.nets.iter().map(ToString::to_string).collect();
        f.write_str(&joined.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("10.0.0.0/8", "10.1.2.3", true)]
    #[case("10.0.0.0/8", "11.0.0.1", false)]
    #[case("192.168.1.0/24", "192.168.1.255", true)]
    #[case("192.168.1.0/24", "192.168.2.1", false)]
    #[case("0.0.0.0/0", "8.8.8.8", true)]
    #[case("127.0.0.1/32", "127.0.0.1", true)]
    #[case("fd00::/8", "fd12::1", true)]
    #[case("fd00::/8", "10.0.0.1", false)]
    fn contains_matches_prefix(#[case] cidr: &str, #[case] ip: &str, #[case] expected: bool) {
        let netlist = Netlist::parse(cidr).unwrap();
        assert_eq!(netlist.contains(ip.parse().unwrap()), expected);
    }

    #[test]
    fn parses_comma_separated_list() {
        let netlist = Netlist::parse("10.0.0.0/8, 172.16.0.0/12,").unwrap();
        assert_eq!(netlist.len(), 2);
        assert_eq!(netlist.to_string(), "10.0.0.0/8,172.16.0.0/12");
    }

    #[rstest]
    #[case("10.0.0.0")]
    #[case("10.0.0.0/33")]
    #[case("not-an-ip/8")]
    #[case("10.0.0.0/x")]
    fn rejects_malformed_entries(#[case] entry: &str) {
        assert!(matches!(
            Netlist::parse(entry),
            Err(ConfigError::InvalidNetlist(_))
        ));
    }

    #[test]
    fn empty_list_contains_nothing() {
        let netlist = Netlist::parse("").unwrap();
        assert!(netlist.is_empty());
        assert!(!netlist.contains("127.0.0.1".parse().unwrap()));
    }
}
