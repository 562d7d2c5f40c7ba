//! Deterministic names and ids for provider resources
//!
//! Every name that a service owns starts with its service prefix, so a
//! reconciliation pass can find its own rules, probes and frontend configs
//! among those of unrelated services sharing the same balancer or group.
//! Names must stay bit-exact across releases: changing them orphans
//! everything created before.

use lb_api::{ExposureRequest, PortMapping};

use crate::client::ResourceKind;

const INTERNAL_LOAD_BALANCER_SUFFIX: &str = "-internal";
const MAX_SERVICE_PREFIX_LEN: usize = 32;

/// `a` + the service UID without dashes, at most 32 bytes
pub fn service_prefix(request: &ExposureRequest) -> String {
    let mut prefix: String = std::iter::once('a')
        .chain(request.uid.chars().filter(|c| *c != '-'))
        .collect();
    if prefix.len() > MAX_SERVICE_PREFIX_LEN {
        let mut end = MAX_SERVICE_PREFIX_LEN;
        while !prefix.is_char_boundary(end) {
            end -= 1;
        }
        prefix.truncate(end);
    }
    prefix
}

/// Whether `name` belongs to the service with `prefix` (case-insensitive)
pub fn owned_by(prefix: &str, name: &str) -> bool {
    if name.len() < prefix.len() || !name.is_char_boundary(prefix.len()) {
        return false;
    }
    let (head, rest) = name.split_at(prefix.len());
    head.eq_ignore_ascii_case(prefix) && (rest.is_empty() || rest.starts_with('-'))
}

/// Internal and external frontends never share a balancer
pub fn load_balancer_name(cluster: &str, internal: bool) -> String {
    if internal {
        format!("{}{}", cluster, INTERNAL_LOAD_BALANCER_SUFFIX)
    } else {
        cluster.to_string()
    }
}

pub fn backend_pool_name(cluster: &str) -> String {
    cluster.to_string()
}

pub fn frontend_ip_config_name(request: &ExposureRequest, subnet: Option<&str>) -> String {
    let prefix = service_prefix(request);
    match subnet {
        Some(subnet) => format!("{}-{}", prefix, subnet),
        None => prefix,
    }
}

/// Shared by a load balancing rule and its probe
pub fn load_balancer_rule_name(
    request: &ExposureRequest,
    port: &PortMapping,
    subnet: Option<&str>,
) -> String {
    let prefix = service_prefix(request);
    match subnet {
        Some(subnet) => format!("{}-{}-{}-{}", prefix, subnet, port.protocol, port.port),
        None => format!("{}-{}-{}", prefix, port.protocol, port.port),
    }
}

pub fn security_rule_name(request: &ExposureRequest, port: &PortMapping, source: &str) -> String {
    let safe_source = source.replace('/', "_");
    format!(
        "{}-{}-{}-{}",
        service_prefix(request),
        port.protocol,
        port.port,
        safe_source
    )
}

pub fn public_ip_name(cluster: &str, request: &ExposureRequest) -> String {
    format!("{}-{}", cluster, service_prefix(request))
}

/// Group key the subnet client is addressed with
pub fn subnet_scope(vnet_resource_group: &str, vnet_name: &str) -> String {
    format!("{}/{}", vnet_resource_group, vnet_name)
}

/// Full provider id of a top-level resource
pub fn resource_id(subscription: &str, kind: ResourceKind, group: &str, name: &str) -> String {
    match (kind, group.split_once('/')) {
        (ResourceKind::Subnet, Some((resource_group, vnet))) => format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/virtualNetworks/{}/subnets/{}",
            subscription, resource_group, vnet, name
        ),
        _ => format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/{}/{}",
            subscription,
            group,
            kind.resource_type(),
            name
        ),
    }
}

/// Id of a child collection entry of a load balancer
pub fn load_balancer_child_id(
    subscription: &str,
    resource_group: &str,
    load_balancer: &str,
    collection: &str,
    name: &str,
) -> String {
    format!(
        "{}/{}/{}",
        resource_id(subscription, ResourceKind::LoadBalancer, resource_group, load_balancer),
        collection,
        name
    )
}
