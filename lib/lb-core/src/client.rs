//! Provider-facing resource clients
//!
//! Each resource kind gets the same capability set through one generic
//! trait. Retry, backoff and rate limiting live behind the implementation;
//! reconcilers only ever see success or a terminal error.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::model::{LoadBalancer, PublicIpAddress, SecurityGroup, Subnet};
use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    LoadBalancer,
    PublicIpAddress,
    Subnet,
    SecurityGroup,
}

impl ResourceKind {
    /// Provider resource type segment used in resource ids
    pub fn resource_type(&self) -> &'static str {
        match self {
            ResourceKind::LoadBalancer => "loadBalancers",
            ResourceKind::PublicIpAddress => "publicIPAddresses",
            ResourceKind::Subnet => "subnets",
            ResourceKind::SecurityGroup => "networkSecurityGroups",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ResourceKind::LoadBalancer => "load balancer",
            ResourceKind::PublicIpAddress => "public IP address",
            ResourceKind::Subnet => "subnet",
            ResourceKind::SecurityGroup => "security group",
        };
        f.write_str(kind)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    CreateOrUpdate,
    Delete,
    Get,
    List,
}

impl Verb {
    pub fn is_write(&self) -> bool {
        matches!(self, Verb::CreateOrUpdate | Verb::Delete)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Verb::CreateOrUpdate => "create-or-update",
            Verb::Delete => "delete",
            Verb::Get => "get",
            Verb::List => "list",
        };
        f.write_str(verb)
    }
}

/// A named top-level provider resource
pub trait Resource: Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn name(&self) -> &str;
    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);
}

/// CreateOrUpdate / Delete / Get / List for one resource kind.
///
/// `group` is the resource group; for subnets it is the virtual network
/// scope built by [`crate::naming::subnet_scope`].
#[async_trait]
pub trait ResourceClient<R: Resource>: Send + Sync {
    async fn create_or_update(&self, group: &str, name: &str, resource: R) -> Result<R>;

    async fn delete(&self, group: &str, name: &str) -> Result<()>;

    /// Fails with `CloudError::NotFound` when absent
    async fn get(&self, group: &str, name: &str) -> Result<R>;

    async fn list(&self, group: &str) -> Result<Vec<R>>;
}

/// The four clients the engine consumes
#[derive(Clone)]
pub struct ProviderClients {
    pub load_balancers: Arc<dyn ResourceClient<LoadBalancer>>,
    pub public_ips: Arc<dyn ResourceClient<PublicIpAddress>>,
    pub subnets: Arc<dyn ResourceClient<Subnet>>,
    pub security_groups: Arc<dyn ResourceClient<SecurityGroup>>,
}

macro_rules! impl_resource {
    ($ty:ty, $kind:expr) => {
        impl Resource for $ty {
            const KIND: ResourceKind = $kind;

            fn name(&self) -> &str {
                &self.name
            }

            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }

            fn set_id(&mut self, id: String) {
                self.id = Some(id);
            }
        }
    };
}

impl_resource!(LoadBalancer, ResourceKind::LoadBalancer);
impl_resource!(PublicIpAddress, ResourceKind::PublicIpAddress);
impl_resource!(Subnet, ResourceKind::Subnet);
impl_resource!(SecurityGroup, ResourceKind::SecurityGroup);
