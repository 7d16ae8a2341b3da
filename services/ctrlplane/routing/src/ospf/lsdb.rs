//! Link-state database of router LSAs

use super::{LsaLink, RouterLsa};
use ctrlplane_engine::Timestamp;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::debug;

/// Result of offering an LSA to the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsaInstall {
    /// First LSA from this router
    New,
    /// Replaced an older instance
    Newer,
    /// Same sequence as the stored instance
    Duplicate,
    /// Older than the stored instance; ignored
    Older,
}

impl LsaInstall {
    /// Whether the database changed and the LSA must be flooded on
    pub fn is_installed(&self) -> bool {
        matches!(self, LsaInstall::New | LsaInstall::Newer)
    }
}

/// A stored LSA with its install time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsdbEntry {
    /// The LSA
    pub lsa: RouterLsa,
    /// When this instance was installed
    pub installed_at: Timestamp,
}

/// Router LSAs of one area, keyed by advertising router
#[derive(Debug, Clone, Default)]
pub struct Lsdb {
    entries: BTreeMap<Ipv4Addr, LsdbEntry>,
}

impl Lsdb {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `lsa` if it is newer than the stored instance
    pub fn install(&mut self, lsa: RouterLsa, now: Timestamp) -> LsaInstall {
        let result = match self.entries.get(&lsa.advertising_router) {
            None => LsaInstall::New,
            Some(existing) if lsa.sequence > existing.lsa.sequence => LsaInstall::Newer,
            Some(existing) if lsa.sequence == existing.lsa.sequence => LsaInstall::Duplicate,
            Some(_) => LsaInstall::Older,
        };

        if result.is_installed() {
            debug!(
                "Installed LSA from {} (seq: {}, {} links)",
                lsa.advertising_router,
                lsa.sequence,
                lsa.links.len()
            );
            self.entries.insert(
                lsa.advertising_router,
                LsdbEntry {
                    lsa,
                    installed_at: now,
                },
            );
        }
        result
    }

    /// LSA of a router
    pub fn get(&self, router: &Ipv4Addr) -> Option<&RouterLsa> {
        self.entries.get(router).map(|entry| &entry.lsa)
    }

    /// Stored entry of a router
    pub fn entry(&self, router: &Ipv4Addr) -> Option<&LsdbEntry> {
        self.entries.get(router)
    }

    /// All LSAs in router-id order
    pub fn lsas(&self) -> impl Iterator<Item = &RouterLsa> {
        self.entries.values().map(|entry| &entry.lsa)
    }

    /// Whether `from` and `to` both list a point-to-point link to each other
    pub fn is_bidirectional(&self, from: Ipv4Addr, to: Ipv4Addr) -> bool {
        let lists = |router: Ipv4Addr, peer: Ipv4Addr| {
            self.get(&router).map_or(false, |lsa| {
                lsa.links
                    .iter()
                    .any(|link| matches!(link, LsaLink::PointToPoint { neighbor, .. } if *neighbor == peer))
            })
        };
        lists(from, to) && lists(to, from)
    }

    /// Remove LSAs older than `max_age`, never the LSA of `keep`
    pub fn remove_aged(&mut self, now: Timestamp, max_age: Duration, keep: Option<Ipv4Addr>) -> Vec<Ipv4Addr> {
        let aged: Vec<Ipv4Addr> = self
            .entries
            .iter()
            .filter(|(router, entry)| Some(**router) != keep && now.is_older_than(entry.installed_at, max_age))
            .map(|(router, _)| *router)
            .collect();
        for router in &aged {
            self.entries.remove(router);
        }
        aged
    }

    /// Number of LSAs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the database is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lsa(router: u8, sequence: u32, peers: &[u8]) -> RouterLsa {
        RouterLsa {
            advertising_router: Ipv4Addr::new(1, 1, 1, router),
            area: 0,
            sequence,
            links: peers
                .iter()
                .map(|peer| LsaLink::PointToPoint {
                    neighbor: Ipv4Addr::new(1, 1, 1, *peer),
                    cost: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn test_sequence_ordering() {
        let mut lsdb = Lsdb::new();
        assert_eq!(lsdb.install(lsa(1, 5, &[]), Timestamp::ZERO), LsaInstall::New);
        assert_eq!(lsdb.install(lsa(1, 5, &[2]), Timestamp::ZERO), LsaInstall::Duplicate);
        assert_eq!(lsdb.install(lsa(1, 4, &[2]), Timestamp::ZERO), LsaInstall::Older);
        assert!(lsdb.get(&Ipv4Addr::new(1, 1, 1, 1)).unwrap().links.is_empty());

        assert_eq!(lsdb.install(lsa(1, 6, &[2]), Timestamp::ZERO), LsaInstall::Newer);
        assert_eq!(lsdb.get(&Ipv4Addr::new(1, 1, 1, 1)).unwrap().links.len(), 1);
    }

    #[test]
    fn test_bidirectional_check() {
        let mut lsdb = Lsdb::new();
        lsdb.install(lsa(1, 1, &[2, 3]), Timestamp::ZERO);
        lsdb.install(lsa(2, 1, &[1]), Timestamp::ZERO);
        lsdb.install(lsa(3, 1, &[]), Timestamp::ZERO);

        let r = |n| Ipv4Addr::new(1, 1, 1, n);
        assert!(lsdb.is_bidirectional(r(1), r(2)));
        assert!(lsdb.is_bidirectional(r(2), r(1)));
        assert!(!lsdb.is_bidirectional(r(1), r(3)));
    }

    #[test]
    fn test_remove_aged_keeps_own() {
        let mut lsdb = Lsdb::new();
        lsdb.install(lsa(1, 1, &[]), Timestamp::ZERO);
        lsdb.install(lsa(2, 1, &[]), Timestamp::ZERO);
        lsdb.install(lsa(3, 1, &[]), Timestamp::from_secs(100));

        let max_age = Duration::from_secs(3600);
        assert!(lsdb
            .remove_aged(Timestamp::from_secs(3600), max_age, Some(Ipv4Addr::new(1, 1, 1, 1)))
            .is_empty());
        let aged = lsdb.remove_aged(Timestamp::from_secs(3601), max_age, Some(Ipv4Addr::new(1, 1, 1, 1)));
        assert_eq!(aged, vec![Ipv4Addr::new(1, 1, 1, 2)]);
        assert_eq!(lsdb.len(), 2);
    }
}
