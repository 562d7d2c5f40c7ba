#![allow(dead_code)]

use lb_api::{ExposureRequest, Protocol, TrafficPolicy};
use lb_core::model::{
    IpAllocationMethod, LoadBalancer, ProbeProtocol, PublicIpAddress, SecurityGroup, SecurityRule,
    SecurityRuleAccess, SecurityRuleDirection, SecurityRuleProtocol, Subnet,
};
use lb_core::naming;
use lb_core::security_group::effective_source_ranges;
use lb_core::{Cloud, CloudConfig, MemoryProvider};

pub const CLUSTER: &str = "testCluster";
pub const GROUP: &str = "rg";
pub const SECURITY_GROUP: &str = "nsg";
pub const DEFAULT_SUBNET: &str = "subnet";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> CloudConfig {
    CloudConfig {
        tenant_id: "tenant".to_string(),
        subscription_id: "subscription".to_string(),
        resource_group: GROUP.to_string(),
        vnet_resource_group: GROUP.to_string(),
        location: "westus".to_string(),
        vnet_name: "vnet".to_string(),
        subnet_name: DEFAULT_SUBNET.to_string(),
        security_group_name: SECURITY_GROUP.to_string(),
        route_table_name: "rt".to_string(),
        ..Default::default()
    }
}

pub fn test_provider() -> MemoryProvider {
    init_tracing();
    MemoryProvider::new("subscription")
}

pub fn test_cloud() -> (MemoryProvider, Cloud) {
    let provider = test_provider();
    let cloud = Cloud::new(test_config(), provider.clients()).expect("cloud");
    (provider, cloud)
}

pub fn backend_port(port: u16) -> u16 {
    port + 10000
}

/// External, cluster-policy service whose UID equals its name
pub fn test_service(identifier: &str, protocol: Protocol, ports: &[u16]) -> ExposureRequest {
    ports.iter().fold(
        ExposureRequest::new("default", identifier, identifier),
        |request, port| request.with_port(protocol, *port, backend_port(*port)),
    )
}

pub fn internal_test_service(identifier: &str, ports: &[u16]) -> ExposureRequest {
    test_service(identifier, Protocol::Tcp, ports).internal(None)
}

/// Create the subnet the internal service lands on and pin the service to it
pub async fn add_test_subnet(provider: &MemoryProvider, request: &mut ExposureRequest) {
    assert!(request.internal, "subnet added to non-internal service");
    let name = request
        .internal_subnet
        .clone()
        .unwrap_or_else(|| DEFAULT_SUBNET.to_string());

    let scope = naming::subnet_scope(GROUP, "vnet");
    provider.subnets.insert(&scope, Subnet::new(&name)).await;
    request.internal_subnet = Some(name);
}

/// Store an untagged static address, as reserved by hand ahead of time
pub async fn reserve_public_ip(provider: &MemoryProvider, name: &str, ip: &str) -> PublicIpAddress {
    let pip = PublicIpAddress {
        name: name.to_string(),
        location: "westus".to_string(),
        public_ip_allocation_method: Some(IpAllocationMethod::Static),
        ip_address: Some(ip.to_string()),
        ..Default::default()
    };
    provider.public_ips.insert(GROUP, pip).await;
    provider.public_ips.snapshot(GROUP, name).await.expect("reserved public IP")
}

/// Store a security group holding the rules `services` would own
pub async fn seed_security_group(
    provider: &MemoryProvider,
    services: &[&ExposureRequest],
) -> SecurityGroup {
    let mut sg = SecurityGroup::new(SECURITY_GROUP, "westus");
    let mut priority = 500;
    for service in services {
        for port in &service.ports {
            for source in effective_source_ranges(service).expect("source ranges") {
                sg.security_rules.push(SecurityRule {
                    name: naming::security_rule_name(service, port, &source),
                    protocol: SecurityRuleProtocol::Tcp,
                    source_port_range: "*".to_string(),
                    destination_port_range: port.port.to_string(),
                    source_address_prefix: source,
                    destination_address_prefix: "*".to_string(),
                    access: SecurityRuleAccess::Allow,
                    direction: SecurityRuleDirection::Inbound,
                    priority: Some(priority),
                });
                priority += 1;
            }
        }
    }
    provider.security_groups.insert(GROUP, sg.clone()).await;
    sg
}

pub fn validate_load_balancer(lb: &LoadBalancer, services: &[&ExposureRequest]) {
    let mut expected_frontends = 0;
    let mut expected_rules = 0;
    let mut expected_probes = 0;

    for service in services {
        if !service.ports.is_empty() {
            expected_frontends += 1;
            let name = naming::frontend_ip_config_name(service, service.subnet());
            let frontend = lb
                .frontend_ip_configuration(&name)
                .unwrap_or_else(|| panic!("expected frontend IP configuration {name}"));
            if service.internal {
                let subnet = service.internal_subnet.as_deref().unwrap_or(DEFAULT_SUBNET);
                assert!(
                    frontend
                        .subnet_name()
                        .is_some_and(|actual| actual.eq_ignore_ascii_case(subnet)),
                    "frontend {name} expected on subnet {subnet}"
                );
            } else {
                assert!(frontend.public_ip_address.is_some(), "frontend {name} has no public IP");
            }
        }

        for port in &service.ports {
            expected_rules += 1;
            let rule_name = naming::load_balancer_rule_name(service, port, service.subnet());
            assert!(
                lb.load_balancing_rules.iter().any(|rule| {
                    rule.name.eq_ignore_ascii_case(&rule_name)
                        && rule.frontend_port == port.port
                        && rule.backend_port == port.port
                }),
                "expected load balancer rule {rule_name}"
            );

            if port.protocol == Protocol::Udp {
                continue;
            }

            expected_probes += 1;
            let found = lb.probes.iter().any(|probe| {
                if !probe.name.eq_ignore_ascii_case(&rule_name) {
                    return false;
                }
                match &service.traffic_policy {
                    TrafficPolicy::Local {
                        health_check_node_port,
                        path,
                    } => {
                        probe.port == *health_check_node_port
                            && probe.request_path.as_deref() == Some(path.as_str())
                            && probe.protocol == ProbeProtocol::Http
                    }
                    TrafficPolicy::Cluster => probe.port == port.node_port,
                }
            });
            assert!(found, "expected load balancer probe {rule_name}, found {:?}", lb.probes);
        }
    }

    assert_eq!(
        lb.frontend_ip_configurations.len(),
        expected_frontends,
        "frontend IP configurations: {:?}",
        lb.frontend_ip_configurations
    );
    assert_eq!(
        lb.load_balancing_rules.len(),
        expected_rules,
        "rules: {:?}",
        lb.load_balancing_rules
    );
    assert_eq!(lb.probes.len(), expected_probes, "probes: {:?}", lb.probes);
}

pub fn validate_security_group(sg: &SecurityGroup, services: &[&ExposureRequest]) {
    let mut expected_rules = 0;
    for service in services {
        for port in &service.ports {
            for source in effective_source_ranges(service).expect("source ranges") {
                expected_rules += 1;
                let rule_name = naming::security_rule_name(service, port, &source);
                assert!(
                    sg.security_rules.iter().any(|rule| {
                        rule.name.eq_ignore_ascii_case(&rule_name)
                            && rule.source_address_prefix == source
                            && rule.destination_port_range == port.port.to_string()
                    }),
                    "expected security group rule {rule_name}"
                );
            }
        }
    }

    assert_eq!(
        sg.security_rules.len(),
        expected_rules,
        "security rules: {:?}",
        sg.security_rules
    );
}
