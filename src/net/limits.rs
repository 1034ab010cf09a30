//! Per-address connection caps

use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;

#[derive(Clone)]
pub struct ConnectionLimits {
    per_ip: Arc<DashMap<IpAddr, usize>>,
    max_per_ip: usize,
}

impl ConnectionLimits {
    pub fn new(max_per_ip: usize) -> Self {
        Self {
            per_ip: Arc::new(DashMap::new()),
            max_per_ip,
        }
    }

    /// Reserve a slot for `ip`; released when the permit drops
    pub fn try_acquire(&self, ip: IpAddr) -> Option<ConnectionPermit> {
        let mut count = self.per_ip.entry(ip).or_insert(0);
        if *count >= self.max_per_ip {
            return None;
        }
        *count += 1;
        Some(ConnectionPermit {
            per_ip: self.per_ip.clone(),
            ip,
        })
    }

    pub fn active(&self, ip: IpAddr) -> usize {
        self.per_ip.get(&ip).map(|count| *count).unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.per_ip.iter().map(|entry| *entry.value()).sum()
    }
}

pub struct ConnectionPermit {
    per_ip: Arc<DashMap<IpAddr, usize>>,
    ip: IpAddr,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.per_ip.remove_if_mut(&self.ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }
}
