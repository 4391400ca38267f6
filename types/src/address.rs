//! Service address classification.
//!
//! Masternodes announce a single IPv4 service address. Local and private
//! addresses are never relayed to other peers.

use std::net::{IpAddr, SocketAddr};

/// Loopback, RFC1918 private, or unspecified.
pub fn is_local_addr(addr: &SocketAddr) -> bool {
    match addr.ip() {
        IpAddr::V4(ip) => ip.is_loopback() || ip.is_private() || ip.is_unspecified(),
        IpAddr::V6(ip) => ip.is_loopback() || ip.is_unspecified(),
    }
}

/// A publicly routable IPv4 address with a non-zero port.
pub fn is_routable_addr(addr: &SocketAddr) -> bool {
    match addr.ip() {
        IpAddr::V4(ip) => {
            addr.port() != 0
                && !ip.is_loopback()
                && !ip.is_private()
                && !ip.is_unspecified()
                && !ip.is_link_local()
                && !ip.is_broadcast()
                && !ip.is_documentation()
                && !ip.is_multicast()
        }
        IpAddr::V6(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_addresses() {
        let public: SocketAddr = "8.8.8.8:28878".parse().unwrap();
        let private: SocketAddr = "192.168.1.4:28878".parse().unwrap();
        let loopback: SocketAddr = "127.0.0.1:28878".parse().unwrap();
        let v6: SocketAddr = "[2001:4860::1]:28878".parse().unwrap();

        assert!(is_routable_addr(&public));
        assert!(!is_local_addr(&public));
        assert!(!is_routable_addr(&private));
        assert!(is_local_addr(&private));
        assert!(is_local_addr(&loopback));
        assert!(!is_routable_addr(&v6));
    }
}
