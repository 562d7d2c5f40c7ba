//! Frontend configs, rules and probes of a service on the cluster balancer
//!
//! Internal and external placements live on separate balancers. Each
//! balancer is shared by every service with that placement; a service only
//! touches the entries its naming prefix owns.

use k8s_openapi::api::core::v1::Node;
use lb_api::{ExposureRequest, SessionAffinity, TrafficPolicy};
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::{ProviderClients, ResourceClient, ResourceKind};
use crate::config::CloudConfig;
use crate::model::{
    BackendAddressPool, FrontendIpConfiguration, IpAllocationMethod, LoadBalancer,
    LoadBalancingRule, LoadDistribution, Probe, ProbeProtocol, SubResource, Subnet,
};
use crate::naming;
use crate::protocol;
use crate::public_ip::PublicIpManager;
use crate::slots;
use crate::{CloudError, Result};

pub const PROBE_INTERVAL_SECONDS: u32 = 5;
pub const PROBE_COUNT: u32 = 2;

const FRONTEND_IP_CONFIGURATIONS: &str = "frontendIPConfigurations";
const BACKEND_ADDRESS_POOLS: &str = "backendAddressPools";
const PROBES: &str = "probes";

#[derive(Clone)]
pub struct LoadBalancerReconciler {
    config: Arc<CloudConfig>,
    load_balancers: Arc<dyn ResourceClient<LoadBalancer>>,
    subnets: Arc<dyn ResourceClient<Subnet>>,
    public_ips: PublicIpManager,
}

impl LoadBalancerReconciler {
    pub fn new(config: Arc<CloudConfig>, clients: &ProviderClients) -> Self {
        Self {
            public_ips: PublicIpManager::new(config.clone(), clients.public_ips.clone()),
            load_balancers: clients.load_balancers.clone(),
            subnets: clients.subnets.clone(),
            config,
        }
    }

    /// Converge the balancer for `request`'s placement.
    ///
    /// Returns the balancer as it stands afterwards, including when it was
    /// deleted for holding nothing anymore. Backend pool membership of
    /// `nodes` is managed on the nodes' interfaces, not here.
    pub async fn reconcile(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        nodes: &[Node],
        want: bool,
    ) -> Result<LoadBalancer> {
        let group = &self.config.resource_group;
        let lb_name = naming::load_balancer_name(cluster, request.internal);

        let (mut lb, existed) = match self.load_balancers.get(group, &lb_name).await {
            Ok(lb) => (lb, true),
            Err(e) if e.is_not_found() => {
                (LoadBalancer::new(&lb_name, &self.config.location), false)
            }
            Err(e) => return Err(e),
        };

        let prefix = naming::service_prefix(request);
        let owned = |name: &str| naming::owned_by(&prefix, name);
        let frontend_name = naming::frontend_ip_config_name(request, request.subnet());
        let want = want && !request.ports.is_empty();

        debug!(
            load_balancer = %lb_name,
            service = %request.service_name(),
            want,
            nodes = nodes.len(),
            "Reconciling load balancer"
        );

        let mut dirty = false;
        let (rules, probes) = if want {
            let pool_name = naming::backend_pool_name(cluster);
            if !lb
                .backend_address_pools
                .iter()
                .any(|pool| pool.name.eq_ignore_ascii_case(&pool_name))
            {
                lb.backend_address_pools.push(BackendAddressPool { name: pool_name });
                dirty = true;
            }

            // A moved subnet leaves an owned config under the old name
            let frontend = self
                .frontend_ip_configuration(cluster, request, &frontend_name)
                .await?;
            if slots::converge(&mut lb.frontend_ip_configurations, owned, vec![frontend]) {
                info!(
                    frontend = %frontend_name,
                    load_balancer = %lb_name,
                    "Updating frontend IP configuration"
                );
                dirty = true;
            }

            self.expected_slots(cluster, request, &lb_name, &frontend_name)?
        } else {
            dirty |= slots::converge(&mut lb.frontend_ip_configurations, owned, Vec::new());
            (Vec::new(), Vec::new())
        };

        dirty |= slots::converge(&mut lb.probes, owned, probes);
        dirty |= slots::converge(&mut lb.load_balancing_rules, owned, rules);

        if !dirty {
            debug!(load_balancer = %lb_name, "Load balancer unchanged");
            return Ok(lb);
        }

        if lb.frontend_ip_configurations.is_empty() && lb.load_balancing_rules.is_empty() {
            if existed {
                info!(load_balancer = %lb_name, "Deleting empty load balancer");
                self.load_balancers.delete(group, &lb_name).await?;
            }
            return Ok(lb);
        }

        info!(
            load_balancer = %lb_name,
            frontends = lb.frontend_ip_configurations.len(),
            rules = lb.load_balancing_rules.len(),
            probes = lb.probes.len(),
            "Updating load balancer"
        );
        self.load_balancers.create_or_update(group, &lb_name, lb).await
    }

    async fn frontend_ip_configuration(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        name: &str,
    ) -> Result<FrontendIpConfiguration> {
        if request.internal {
            let subnet_name = request
                .internal_subnet
                .as_deref()
                .unwrap_or(&self.config.subnet_name);
            let scope =
                naming::subnet_scope(&self.config.vnet_resource_group, &self.config.vnet_name);
            let subnet = self.subnets.get(&scope, subnet_name).await?;
            let subnet_id = match subnet.id {
                Some(id) => id,
                None => naming::resource_id(
                    &self.config.subscription_id,
                    ResourceKind::Subnet,
                    &scope,
                    &subnet.name,
                ),
            };

            let (method, address) = match &request.load_balancer_ip {
                Some(ip) => (IpAllocationMethod::Static, Some(ip.clone())),
                None => (IpAllocationMethod::Dynamic, None),
            };

            Ok(FrontendIpConfiguration {
                name: name.to_string(),
                subnet: Some(SubResource::new(subnet_id)),
                private_ip_allocation_method: Some(method),
                private_ip_address: address,
                ..Default::default()
            })
        } else {
            let pip = self
                .public_ips
                .acquire(cluster, request, true)
                .await?
                .ok_or_else(|| {
                    CloudError::not_found(
                        ResourceKind::PublicIpAddress,
                        naming::public_ip_name(cluster, request),
                    )
                })?;
            let pip_id = match pip.id {
                Some(id) => id,
                None => naming::resource_id(
                    &self.config.subscription_id,
                    ResourceKind::PublicIpAddress,
                    &self.config.resource_group,
                    &pip.name,
                ),
            };

            Ok(FrontendIpConfiguration {
                name: name.to_string(),
                public_ip_address: Some(SubResource::new(pip_id)),
                ..Default::default()
            })
        }
    }

    fn expected_slots(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        lb_name: &str,
        frontend_name: &str,
    ) -> Result<(Vec<LoadBalancingRule>, Vec<Probe>)> {
        let child_id = |collection: &str, name: &str| {
            SubResource::new(naming::load_balancer_child_id(
                &self.config.subscription_id,
                &self.config.resource_group,
                lb_name,
                collection,
                name,
            ))
        };
        let frontend = child_id(FRONTEND_IP_CONFIGURATIONS, frontend_name);
        let pool = child_id(BACKEND_ADDRESS_POOLS, &naming::backend_pool_name(cluster));
        let load_distribution = match request.session_affinity {
            SessionAffinity::ClientIp => LoadDistribution::SourceIP,
            SessionAffinity::None => LoadDistribution::Default,
        };

        let mut rules = Vec::with_capacity(request.ports.len());
        let mut probes = Vec::with_capacity(request.ports.len());
        for port in &request.ports {
            let protocols = protocol::translate(port.protocol)?;
            let name = naming::load_balancer_rule_name(request, port, request.subnet());

            let probe = protocols.probe.map(|probe_protocol| match &request.traffic_policy {
                TrafficPolicy::Local {
                    health_check_node_port,
                    path,
                } => Probe {
                    name: name.clone(),
                    protocol: ProbeProtocol::Http,
                    port: *health_check_node_port,
                    request_path: Some(path.clone()),
                    interval_in_seconds: PROBE_INTERVAL_SECONDS,
                    number_of_probes: PROBE_COUNT,
                },
                TrafficPolicy::Cluster => Probe {
                    name: name.clone(),
                    protocol: probe_protocol,
                    port: port.node_port,
                    request_path: None,
                    interval_in_seconds: PROBE_INTERVAL_SECONDS,
                    number_of_probes: PROBE_COUNT,
                },
            });

            rules.push(LoadBalancingRule {
                name: name.clone(),
                protocol: protocols.transport,
                frontend_port: port.port,
                backend_port: port.port,
                frontend_ip_configuration: frontend.clone(),
                backend_address_pool: pool.clone(),
                probe: probe.as_ref().map(|_| child_id(PROBES, &name)),
                load_distribution,
                enable_floating_ip: true,
            });
            probes.extend(probe);
        }

        Ok((rules, probes))
    }
}
