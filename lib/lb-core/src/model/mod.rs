//! Cloud network resources as seen by the reconcilers
//!
//! The shapes follow the provider's resource documents: every child
//! collection (rules, probes, frontend configs) is keyed by a name that is
//! case-preserving but compared case-insensitively.

pub mod load_balancer;
pub mod public_ip;
pub mod security_group;
pub mod subnet;

pub use load_balancer::{
    BackendAddressPool, FrontendIpConfiguration, LoadBalancer, LoadBalancingRule, LoadDistribution,
    Probe, ProbeProtocol, TransportProtocol,
};
pub use public_ip::{IpAllocationMethod, PublicIpAddress, CLUSTER_TAG, SERVICE_TAG};
pub use security_group::{
    SecurityGroup, SecurityRule, SecurityRuleAccess, SecurityRuleDirection, SecurityRuleProtocol,
};
pub use subnet::Subnet;

use serde::{Deserialize, Serialize};

/// Reference to another resource by its provider id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubResource {
    pub id: String,
}

impl SubResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Last path segment of the id, i.e. the referenced resource's name
    pub fn name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }
}
