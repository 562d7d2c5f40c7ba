use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub security_rules: Vec<SecurityRule>,
}

impl SecurityGroup {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            ..Default::default()
        }
    }

    pub fn rule(&self, name: &str) -> Option<&SecurityRule> {
        self.security_rules
            .iter()
            .find(|rule| rule.name.eq_ignore_ascii_case(name))
    }
}

/// Inbound allow entry. Priority is unique within the group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRule {
    pub name: String,
    pub protocol: SecurityRuleProtocol,
    pub source_port_range: String,
    pub destination_port_range: String,
    pub source_address_prefix: String,
    pub destination_address_prefix: String,
    pub access: SecurityRuleAccess,
    pub direction: SecurityRuleDirection,
    /// Rules created outside this engine may carry no priority
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
}

impl SecurityRule {
    /// Everything but the name and priority matches
    pub fn same_settings(&self, other: &SecurityRule) -> bool {
        self.protocol == other.protocol
            && self.source_port_range == other.source_port_range
            && self.destination_port_range == other.destination_port_range
            && self.source_address_prefix == other.source_address_prefix
            && self.destination_address_prefix == other.destination_address_prefix
            && self.access == other.access
            && self.direction == other.direction
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityRuleProtocol {
    Tcp,
    Udp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityRuleAccess {
    Allow,
    Deny,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityRuleDirection {
    Inbound,
    Outbound,
}
