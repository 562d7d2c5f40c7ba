//! Inbound rules for a service in the cluster's security group

use ipnetwork::IpNetwork;
use lb_api::ExposureRequest;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::ResourceClient;
use crate::config::CloudConfig;
use crate::model::{SecurityGroup, SecurityRule, SecurityRuleAccess, SecurityRuleDirection};
use crate::naming;
use crate::priority::PriorityRange;
use crate::protocol;
use crate::{CloudError, Result};

/// Source prefix admitting any address
pub const INTERNET_SOURCE: &str = "Internet";

/// Source prefixes that get one rule per port.
///
/// Explicit ranges are normalised to their network address. No ranges, or
/// an allow-all range, means any source for external services and no rule
/// at all for internal ones.
pub fn effective_source_ranges(request: &ExposureRequest) -> Result<Vec<String>> {
    let mut ranges: Vec<String> = Vec::new();
    let mut allow_all = false;

    for range in &request.source_ranges {
        let network: IpNetwork = range.trim().parse().map_err(|e: ipnetwork::IpNetworkError| {
            CloudError::InvalidSourceRange {
                range: range.clone(),
                reason: e.to_string(),
            }
        })?;
        let normalized = IpNetwork::new(network.network(), network.prefix()).map_err(|e| {
            CloudError::InvalidSourceRange {
                range: range.clone(),
                reason: e.to_string(),
            }
        })?;

        allow_all |= normalized.prefix() == 0;
        let normalized = normalized.to_string();
        if !ranges.contains(&normalized) {
            ranges.push(normalized);
        }
    }

    if !ranges.is_empty() && !allow_all {
        Ok(ranges)
    } else if request.internal {
        Ok(Vec::new())
    } else {
        Ok(vec![INTERNET_SOURCE.to_string()])
    }
}

/// Keeps the rules a service owns in the cluster security group in line
/// with its request. The group itself is never deleted.
#[derive(Clone)]
pub struct SecurityGroupReconciler {
    config: Arc<CloudConfig>,
    security_groups: Arc<dyn ResourceClient<SecurityGroup>>,
    priorities: PriorityRange,
}

impl SecurityGroupReconciler {
    pub fn new(
        config: Arc<CloudConfig>,
        security_groups: Arc<dyn ResourceClient<SecurityGroup>>,
    ) -> Self {
        Self {
            config,
            security_groups,
            priorities: PriorityRange::default(),
        }
    }

    pub async fn reconcile(&self, request: &ExposureRequest, want: bool) -> Result<SecurityGroup> {
        let group = &self.config.resource_group;
        let name = &self.config.security_group_name;

        let mut security_group = match self.security_groups.get(group, name).await {
            Ok(sg) => sg,
            Err(e) if e.is_not_found() => SecurityGroup::new(name, &self.config.location),
            Err(e) => return Err(e),
        };

        let expected = if want { self.expected_rules(request)? } else { Vec::new() };
        let prefix = naming::service_prefix(request);

        let before = security_group.security_rules.len();
        security_group.security_rules.retain(|rule| {
            !naming::owned_by(&prefix, &rule.name)
                || expected.iter().any(|want| want.name.eq_ignore_ascii_case(&rule.name))
        });
        let mut dirty = security_group.security_rules.len() != before;

        for want in expected {
            let existing = security_group
                .security_rules
                .iter()
                .position(|rule| rule.name.eq_ignore_ascii_case(&want.name));

            match existing {
                Some(index) => {
                    let assigned = security_group.security_rules[index].priority;
                    let priority = match assigned {
                        Some(priority) => priority,
                        None => self.priorities.next_available(&security_group.security_rules)?,
                    };
                    let rule = &mut security_group.security_rules[index];
                    if !rule.same_settings(&want) || assigned.is_none() {
                        rule.protocol = want.protocol;
                        rule.source_port_range = want.source_port_range;
                        rule.destination_port_range = want.destination_port_range;
                        rule.source_address_prefix = want.source_address_prefix;
                        rule.destination_address_prefix = want.destination_address_prefix;
                        rule.access = want.access;
                        rule.direction = want.direction;
                        rule.priority = Some(priority);
                        dirty = true;
                    }
                }
                None => {
                    let priority = self.priorities.next_available(&security_group.security_rules)?;
                    debug!(rule = %want.name, priority, "Adding security rule");
                    security_group.security_rules.push(SecurityRule {
                        priority: Some(priority),
                        ..want
                    });
                    dirty = true;
                }
            }
        }

        if !dirty {
            debug!(service = %request.service_name(), "Security group unchanged");
            return Ok(security_group);
        }

        info!(
            security_group = %name,
            service = %request.service_name(),
            rules = security_group.security_rules.len(),
            "Updating security group"
        );
        self.security_groups
            .create_or_update(group, name, security_group)
            .await
    }

    fn expected_rules(&self, request: &ExposureRequest) -> Result<Vec<SecurityRule>> {
        let sources = effective_source_ranges(request)?;
        let destination = request
            .load_balancer_ip
            .clone()
            .unwrap_or_else(|| "*".to_string());

        let mut rules = Vec::with_capacity(request.ports.len() * sources.len());
        for port in &request.ports {
            let protocols = protocol::translate(port.protocol)?;
            for source in &sources {
                rules.push(SecurityRule {
                    name: naming::security_rule_name(request, port, source),
                    protocol: protocols.security_rule,
                    source_port_range: "*".to_string(),
                    destination_port_range: port.port.to_string(),
                    source_address_prefix: source.clone(),
                    destination_address_prefix: destination.clone(),
                    access: SecurityRuleAccess::Allow,
                    direction: SecurityRuleDirection::Inbound,
                    priority: None,
                });
            }
        }
        Ok(rules)
    }
}
