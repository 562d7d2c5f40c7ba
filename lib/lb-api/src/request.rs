use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RequestError;

/// Path served by kube-proxy on the health check node port
pub const DEFAULT_HEALTH_CHECK_PATH: &str = "/healthz";

/// ExposureRequest describes how one service wants to be reachable from
/// outside the cluster. It is an immutable snapshot for one reconciliation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureRequest {
    pub namespace: String,
    pub name: String,
    pub uid: String,

    /// Exposed ports, in service order
    #[serde(default)]
    pub ports: Vec<PortMapping>,

    #[serde(default)]
    pub traffic_policy: TrafficPolicy,

    /// Allowed source CIDRs; empty means unrestricted
    #[serde(default)]
    pub source_ranges: Vec<String>,

    /// Place the frontend on an internal subnet instead of a public IP
    #[serde(default)]
    pub internal: bool,

    /// Subnet override for internal placement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_subnet: Option<String>,

    /// Pinned frontend address: private IP for internal placement,
    /// address of an existing public IP for external placement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer_ip: Option<String>,

    #[serde(default)]
    pub session_affinity: SessionAffinity,
}

/// One exposed port and the node port traffic is delivered to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub protocol: Protocol,
    pub port: u16,
    pub node_port: u16,
}

/// Transport protocol as requested by the service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

/// Health semantics of the exposure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum TrafficPolicy {
    /// Any node may forward traffic; probes hit the service's node port
    Cluster,
    /// Only nodes running a backend answer; probes hit a dedicated
    /// health check port and path
    #[serde(rename_all = "camelCase")]
    Local { health_check_node_port: u16, path: String },
}

impl Default for TrafficPolicy {
    fn default() -> Self {
        TrafficPolicy::Cluster
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionAffinity {
    #[default]
    None,
    ClientIp,
}

impl ExposureRequest {
    /// Create an external, cluster-policy request without ports
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: uid.into(),
            ports: Vec::new(),
            traffic_policy: TrafficPolicy::Cluster,
            source_ranges: Vec::new(),
            internal: false,
            internal_subnet: None,
            load_balancer_ip: None,
            session_affinity: SessionAffinity::None,
        }
    }

    pub fn with_port(mut self, protocol: Protocol, port: u16, node_port: u16) -> Self {
        self.ports.push(PortMapping::new(protocol, port, node_port));
        self
    }

    pub fn with_source_ranges<I, S>(mut self, ranges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_ranges = ranges.into_iter().map(Into::into).collect();
        self
    }

    pub fn internal(mut self, subnet: Option<&str>) -> Self {
        self.internal = true;
        self.internal_subnet = subnet.map(str::to_string);
        self
    }

    pub fn node_local(mut self, health_check_node_port: u16) -> Self {
        self.traffic_policy = TrafficPolicy::Local {
            health_check_node_port,
            path: DEFAULT_HEALTH_CHECK_PATH.to_string(),
        };
        self
    }

    /// `namespace/name`, used in logs and as the public IP owner tag
    pub fn service_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Subnet the frontend is pinned to. Only internal requests have one.
    pub fn subnet(&self) -> Option<&str> {
        if self.internal {
            self.internal_subnet.as_deref()
        } else {
            None
        }
    }

    /// The same request with the opposite placement
    pub fn flipped(&self) -> Self {
        let mut flipped = self.clone();
        flipped.internal = !self.internal;
        flipped
    }

    pub fn needs_health_check(&self) -> bool {
        matches!(self.traffic_policy, TrafficPolicy::Local { .. })
    }
}

impl PortMapping {
    pub fn new(protocol: Protocol, port: u16, node_port: u16) -> Self {
        Self {
            name: None,
            protocol,
            port,
            node_port,
        }
    }
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Sctp => "SCTP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            "SCTP" => Ok(Protocol::Sctp),
            other => Err(RequestError::UnknownProtocol(other.to_string())),
        }
    }
}
