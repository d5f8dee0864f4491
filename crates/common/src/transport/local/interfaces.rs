use std::net::{IpAddr, Ipv4Addr};

/// First octets we treat as private or loopback ranges worth scanning.
const PRIVATE_FIRST_OCTETS: [u8; 4] = [10, 127, 172, 192];

pub fn is_private_candidate(ip: &Ipv4Addr) -> bool {
    PRIVATE_FIRST_OCTETS.contains(&ip.octets()[0])
}

/// This machine's private-range IPv4 addresses, sorted and deduplicated.
pub fn private_ipv4_addrs() -> Vec<IpAddr> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            tracing::warn!("failed to enumerate network interfaces: {}", e);
            return Vec::new();
        }
    };

    let mut ips: Vec<IpAddr> = interfaces
        .into_iter()
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(v4) if is_private_candidate(&v4) => Some(IpAddr::V4(v4)),
            _ => None,
        })
        .collect();
    ips.sort();
    ips.dedup();
    ips
}

/// Every host address in the /24 around `ip`.
pub fn subnet_hosts(ip: Ipv4Addr) -> impl Iterator<Item = Ipv4Addr> {
    let [a, b, c, _] = ip.octets();
    (1..=254u8).map(move |d| Ipv4Addr::new(a, b, c, d))
}

/// Prefer a non-loopback address as the one we announce first.
pub fn primary_ip(ips: &[IpAddr]) -> IpAddr {
    ips.iter()
        .find(|ip| !ip.is_loopback())
        .or_else(|| ips.first())
        .copied()
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_candidates() {
        assert!(is_private_candidate(&"10.1.2.3".parse().unwrap()));
        assert!(is_private_candidate(&"192.168.0.4".parse().unwrap()));
        assert!(is_private_candidate(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_candidate(&"172.20.0.2".parse().unwrap()));
        assert!(!is_private_candidate(&"8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn test_subnet_hosts() {
        let hosts: Vec<_> = subnet_hosts("192.168.4.77".parse().unwrap()).collect();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 4, 1));
        assert_eq!(hosts[253], Ipv4Addr::new(192, 168, 4, 254));
    }

    #[test]
    fn test_primary_ip_skips_loopback() {
        let ips: Vec<IpAddr> = vec!["127.0.0.1".parse().unwrap(), "10.0.0.5".parse().unwrap()];
        assert_eq!(primary_ip(&ips), "10.0.0.5".parse::<IpAddr>().unwrap());
        assert_eq!(primary_ip(&[]), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
}
