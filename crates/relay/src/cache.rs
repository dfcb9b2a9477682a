//! Shared lookup caches
//!
//! Name resolutions, IP location codes, inside/outside verdicts and static
//! host overrides, shared by every connection task. Every store accepts
//! concurrent reads and inserts without external locking.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Default TTL for resolved names (5 minutes)
pub const DEFAULT_RESOLVED_TTL: Duration = Duration::from_secs(300);

/// A cached resolution
#[derive(Debug, Clone, Copy)]
struct ResolvedEntry {
    ip: IpAddr,
    resolved_at: Instant,
}

#[derive(Debug)]
pub struct LookupCaches {
    resolved: DashMap<String, ResolvedEntry>,
    locations: DashMap<IpAddr, String>,
    inside: DashMap<IpAddr, bool>,
    hosts: DashMap<String, IpAddr>,
    resolved_ttl: Duration,
}

impl LookupCaches {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_RESOLVED_TTL)
    }

    pub fn with_ttl(resolved_ttl: Duration) -> Self {
        Self {
            resolved: DashMap::new(),
            locations: DashMap::new(),
            inside: DashMap::new(),
            hosts: DashMap::new(),
            resolved_ttl,
        }
    }

    /// Seed static host overrides.
    pub fn with_hosts<I>(self, hosts: I) -> Self
    where
        I: IntoIterator<Item = (String, IpAddr)>,
    {
        for (name, ip) in hosts {
            self.hosts.insert(name, ip);
        }
        self
    }

    /// Static override for `name`, if any.
    pub fn host(&self, name: &str) -> Option<IpAddr> {
        self.hosts.get(name).map(|entry| *entry)
    }

    pub fn add_host(&self, name: impl Into<String>, ip: IpAddr) {
        self.hosts.insert(name.into(), ip);
    }

    /// Cached resolution for `name`, if present and not expired.
    pub fn resolved(&self, name: &str) -> Option<IpAddr> {
        self.resolved.get(name).and_then(|entry| {
            if entry.resolved_at.elapsed() < self.resolved_ttl {
                Some(entry.ip)
            } else {
                None
            }
        })
    }

    pub fn insert_resolved(&self, name: impl Into<String>, ip: IpAddr) {
        self.resolved.insert(
            name.into(),
            ResolvedEntry {
                ip,
                resolved_at: Instant::now(),
            },
        );
    }

    pub fn location(&self, ip: &IpAddr) -> Option<String> {
        self.locations.get(ip).map(|entry| entry.value().clone())
    }

    pub fn insert_location(&self, ip: IpAddr, code: impl Into<String>) {
        self.locations.insert(ip, code.into());
    }

    /// Cached verdict on whether `ip` is reached without the relayer.
    pub fn inside(&self, ip: &IpAddr) -> Option<bool> {
        self.inside.get(ip).map(|entry| *entry)
    }

    pub fn insert_inside(&self, ip: IpAddr, inside: bool) {
        self.inside.insert(ip, inside);
    }

    /// Drop expired resolutions.
    pub fn evict_expired(&self) {
        let ttl = self.resolved_ttl;
        self.resolved
            .retain(|_, entry| entry.resolved_at.elapsed() < ttl);
    }

    pub fn resolved_len(&self) -> usize {
        self.resolved.len()
    }

    pub fn locations_len(&self) -> usize {
        self.locations.len()
    }

    pub fn inside_len(&self) -> usize {
        self.inside.len()
    }
}

impl Default for LookupCaches {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_hosts_override() {
        let caches = LookupCaches::new().with_hosts([("router.lan".to_string(), ip("192.168.0.1"))]);
        assert_eq!(caches.host("router.lan"), Some(ip("192.168.0.1")));
        assert_eq!(caches.host("example.com"), None);

        caches.add_host("nas.lan", ip("192.168.0.2"));
        assert_eq!(caches.host("nas.lan"), Some(ip("192.168.0.2")));
    }

    #[test]
    fn test_resolved_roundtrip() {
        let caches = LookupCaches::new();
        assert!(caches.resolved("example.com").is_none());

        caches.insert_resolved("example.com", ip("93.184.216.34"));
        assert_eq!(caches.resolved("example.com"), Some(ip("93.184.216.34")));
        assert_eq!(caches.resolved_len(), 1);
    }

    #[test]
    fn test_resolved_expiry() {
        let caches = LookupCaches::with_ttl(Duration::from_millis(10));
        caches.insert_resolved("example.com", ip("93.184.216.34"));

        std::thread::sleep(Duration::from_millis(20));
        assert!(caches.resolved("example.com").is_none());

        caches.evict_expired();
        assert_eq!(caches.resolved_len(), 0);
    }

    #[test]
    fn test_location_cache() {
        let caches = LookupCaches::new();
        caches.insert_location(ip("8.8.8.8"), "US");
        assert_eq!(caches.location(&ip("8.8.8.8")).as_deref(), Some("US"));
        assert_eq!(caches.location(&ip("1.1.1.1")), None);
        assert_eq!(caches.locations_len(), 1);
    }

    #[test]
    fn test_inside_cache() {
        let caches = LookupCaches::new();
        assert_eq!(caches.inside(&ip("8.8.8.8")), None);

        caches.insert_inside(ip("8.8.8.8"), false);
        caches.insert_inside(ip("114.114.114.114"), true);
        assert_eq!(caches.inside(&ip("8.8.8.8")), Some(false));
        assert_eq!(caches.inside(&ip("114.114.114.114")), Some(true));
        assert_eq!(caches.inside_len(), 2);

        // Expiry sweeps only touch resolutions
        caches.evict_expired();
        assert_eq!(caches.inside_len(), 2);
    }

    #[test]
    fn test_concurrent_inserts() {
        let caches = Arc::new(LookupCaches::new());
        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let caches = caches.clone();
                std::thread::spawn(move || {
                    for n in 0..100u8 {
                        let addr = IpAddr::from([10, t, 0, n]);
                        caches.insert_location(addr, format!("C{t}"));
                        caches.insert_resolved(format!("host-{t}-{n}"), addr);
                        let _ = caches.resolved(&format!("host-{t}-{n}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(caches.locations_len(), 400);
        assert_eq!(caches.resolved_len(), 400);
    }
}
