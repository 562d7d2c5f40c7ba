use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag key recording which service owns a public IP
pub const SERVICE_TAG: &str = "service";
/// Tag key recording the cluster the owning service runs in
pub const CLUSTER_TAG: &str = "kubernetes-cluster-name";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip_allocation_method: Option<IpAllocationMethod>,
    /// Assigned by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl PublicIpAddress {
    /// A statically allocated address tagged for `service`
    pub fn for_service(
        name: impl Into<String>,
        location: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            public_ip_allocation_method: Some(IpAllocationMethod::Static),
            tags: BTreeMap::from([(SERVICE_TAG.to_string(), service.into())]),
            ..Default::default()
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.tags.insert(CLUSTER_TAG.to_string(), cluster.into());
        self
    }

    pub fn owner(&self) -> Option<&str> {
        self.tags.get(SERVICE_TAG).map(String::as_str)
    }

    pub fn cluster(&self) -> Option<&str> {
        self.tags.get(CLUSTER_TAG).map(String::as_str)
    }

    /// Tagged for `service` of `cluster`. Addresses created before the
    /// cluster tag existed count for every cluster.
    pub fn owned_by(&self, cluster: &str, service: &str) -> bool {
        self.owner() == Some(service)
            && self
                .cluster()
                .map_or(true, |tagged| tagged.eq_ignore_ascii_case(cluster))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpAllocationMethod {
    Static,
    Dynamic,
}
