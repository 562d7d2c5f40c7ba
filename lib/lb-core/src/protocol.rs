//! Mapping from service protocols to the provider's protocol enumerations

use lb_api::Protocol;

use crate::model::{ProbeProtocol, SecurityRuleProtocol, TransportProtocol};
use crate::{CloudError, Result};

/// Provider protocols for one exposed port
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProviderProtocols {
    pub transport: TransportProtocol,
    pub security_rule: SecurityRuleProtocol,
    /// `None` for UDP: the provider cannot probe it
    pub probe: Option<ProbeProtocol>,
}

pub fn translate(protocol: Protocol) -> Result<ProviderProtocols> {
    match protocol {
        Protocol::Tcp => Ok(ProviderProtocols {
            transport: TransportProtocol::Tcp,
            security_rule: SecurityRuleProtocol::Tcp,
            probe: Some(ProbeProtocol::Tcp),
        }),
        Protocol::Udp => Ok(ProviderProtocols {
            transport: TransportProtocol::Udp,
            security_rule: SecurityRuleProtocol::Udp,
            probe: None,
        }),
        other => Err(CloudError::UnsupportedProtocol(other)),
    }
}
