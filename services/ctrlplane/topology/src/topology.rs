//! Point-to-point links between device interfaces.

use crate::error::{Result, ScenarioError};
use ctrlplane_engine::{LinkMetrics, LinkStatus};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// One side of a link
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    /// Device name
    pub device: String,
    /// Interface name
    pub interface: String,
}

impl Endpoint {
    /// Build an endpoint
    pub fn new(device: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            interface: interface.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.interface)
    }
}

#[derive(Debug, Clone)]
struct Attachment {
    peer: Endpoint,
    status: LinkStatus,
}

/// Link map of the simulated network.
///
/// Each linked endpoint stores its peer and the link status, so lookups
/// from either side are a single map access.
#[derive(Debug, Default)]
pub struct Topology {
    attachments: DashMap<Endpoint, Attachment>,
}

impl Topology {
    /// Empty topology
    pub fn new() -> Self {
        Self::default()
    }

    /// Link two endpoints; the link starts up
    pub fn connect(&self, a: Endpoint, b: Endpoint, metrics: LinkMetrics) -> Result<()> {
        if a == b {
            return Err(ScenarioError::SelfLink(a.to_string()));
        }
        for endpoint in [&a, &b] {
            if self.attachments.contains_key(endpoint) {
                return Err(ScenarioError::InterfaceAlreadyLinked {
                    device: endpoint.device.clone(),
                    interface: endpoint.interface.clone(),
                });
            }
        }

        let status = LinkStatus::up(metrics);
        info!("Linked {} <-> {} (cost {})", a, b, metrics.cost);
        self.attachments.insert(a.clone(), Attachment { peer: b.clone(), status });
        self.attachments.insert(b, Attachment { peer: a, status });
        Ok(())
    }

    /// Bring a link up or down from either end; returns whether the state changed
    pub fn set_link_state(&self, endpoint: &Endpoint, up: bool) -> Result<bool> {
        let peer = match self.attachments.get_mut(endpoint) {
            Some(mut attachment) => {
                if attachment.status.is_up == up {
                    return Ok(false);
                }
                attachment.status.is_up = up;
                attachment.peer.clone()
            }
            None => {
                return Err(ScenarioError::UnknownInterface {
                    device: endpoint.device.clone(),
                    interface: endpoint.interface.clone(),
                })
            }
        };
        if let Some(mut attachment) = self.attachments.get_mut(&peer) {
            attachment.status.is_up = up;
        }

        info!("Link {} <-> {} is now {}", endpoint, peer, if up { "up" } else { "down" });
        Ok(true)
    }

    /// Status of the link attached to `endpoint`, `None` if unlinked
    pub fn link_status(&self, endpoint: &Endpoint) -> Option<LinkStatus> {
        self.attachments.get(endpoint).map(|attachment| attachment.status)
    }

    /// Far end of the link attached to `endpoint`, regardless of state
    pub fn peer(&self, endpoint: &Endpoint) -> Option<Endpoint> {
        self.attachments.get(endpoint).map(|attachment| attachment.peer.clone())
    }

    /// Far end of the link attached to `endpoint` if the link is up
    pub fn active_peer(&self, endpoint: &Endpoint) -> Option<Endpoint> {
        self.attachments
            .get(endpoint)
            .filter(|attachment| attachment.status.is_up)
            .map(|attachment| attachment.peer.clone())
    }

    /// Every link once, ordered by its lower endpoint
    pub fn links(&self) -> Vec<(Endpoint, Endpoint, LinkStatus)> {
        let mut links: Vec<_> = self
            .attachments
            .iter()
            .filter(|entry| *entry.key() < entry.peer)
            .map(|entry| (entry.key().clone(), entry.peer.clone(), entry.status))
            .collect();
        links.sort_by(|a, b| a.0.cmp(&b.0));
        links
    }

    /// Number of links
    pub fn link_count(&self) -> usize {
        self.attachments.len() / 2
    }
}
