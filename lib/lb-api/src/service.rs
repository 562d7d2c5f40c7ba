//! Conversion from Kubernetes `Service` objects

use k8s_openapi::api::core::v1::{Service, ServicePort};
use kube::ResourceExt;

use crate::request::DEFAULT_HEALTH_CHECK_PATH;
use crate::{
    ExposureRequest, PortMapping, Protocol, RequestError, Result, SessionAffinity, TrafficPolicy,
};

/// Annotation asking for an internal (subnet) frontend instead of a public IP
pub const ANNOTATION_INTERNAL: &str = "service.beta.kubernetes.io/azure-load-balancer-internal";
/// Annotation overriding the subnet of an internal frontend
pub const ANNOTATION_INTERNAL_SUBNET: &str =
    "service.beta.kubernetes.io/azure-load-balancer-internal-subnet";
/// Comma separated CIDRs, used when `spec.loadBalancerSourceRanges` is empty
pub const ANNOTATION_SOURCE_RANGES: &str = "service.beta.kubernetes.io/load-balancer-source-ranges";

const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";
const TRAFFIC_POLICY_LOCAL: &str = "Local";
const AFFINITY_CLIENT_IP: &str = "ClientIP";

impl ExposureRequest {
    /// Build a request from a Service of type LoadBalancer
    pub fn from_service(service: &Service) -> Result<Self> {
        let uid = service.uid().ok_or(RequestError::MissingField("metadata.uid"))?;
        let namespace = service.namespace().unwrap_or_else(|| "default".to_string());
        let annotations = service.annotations();
        let spec = service.spec.clone().unwrap_or_default();

        let ports = spec
            .ports
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(port_mapping)
            .collect::<Result<Vec<_>>>()?;

        let is_load_balancer = spec.type_.as_deref() == Some(SERVICE_TYPE_LOAD_BALANCER);
        let traffic_policy = if is_load_balancer
            && spec.external_traffic_policy.as_deref() == Some(TRAFFIC_POLICY_LOCAL)
        {
            let port = spec
                .health_check_node_port
                .ok_or(RequestError::MissingField("spec.healthCheckNodePort"))?;
            TrafficPolicy::Local {
                health_check_node_port: to_port("spec.healthCheckNodePort", port)?,
                path: DEFAULT_HEALTH_CHECK_PATH.to_string(),
            }
        } else {
            TrafficPolicy::Cluster
        };

        let mut source_ranges = spec.load_balancer_source_ranges.unwrap_or_default();
        if source_ranges.is_empty() {
            if let Some(value) = annotations.get(ANNOTATION_SOURCE_RANGES) {
                source_ranges = value
                    .split(',')
                    .map(str::trim)
                    .filter(|range| !range.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }

        let internal = annotations
            .get(ANNOTATION_INTERNAL)
            .map(|value| value == "true")
            .unwrap_or(false);
        let internal_subnet = annotations
            .get(ANNOTATION_INTERNAL_SUBNET)
            .filter(|subnet| !subnet.is_empty())
            .cloned();

        let session_affinity = match spec.session_affinity.as_deref() {
            Some(AFFINITY_CLIENT_IP) => SessionAffinity::ClientIp,
            _ => SessionAffinity::None,
        };

        Ok(Self {
            namespace,
            name: service.name_any(),
            uid,
            ports,
            traffic_policy,
            source_ranges,
            internal,
            internal_subnet,
            load_balancer_ip: spec.load_balancer_ip.filter(|ip| !ip.is_empty()),
            session_affinity,
        })
    }
}

fn port_mapping(port: &ServicePort) -> Result<PortMapping> {
    let protocol = match port.protocol.as_deref() {
        Some(protocol) => protocol.parse()?,
        None => Protocol::Tcp,
    };
    Ok(PortMapping {
        name: port.name.clone(),
        protocol,
        port: to_port("spec.ports[].port", port.port)?,
        node_port: to_port("spec.ports[].nodePort", port.node_port.unwrap_or(0))?,
    })
}

fn to_port(field: &'static str, value: i32) -> Result<u16> {
    u16::try_from(value).map_err(|_| RequestError::PortOutOfRange { field, value })
}
