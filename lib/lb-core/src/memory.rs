//! In-memory provider
//!
//! Behaves like the cloud API as far as the reconcilers can observe: it
//! assigns resource ids, allocates addresses, reports absence as
//! `NotFound` and compares names case-insensitively. Every call is
//! journaled, and a single call can be made to fail on demand.

use async_trait::async_trait;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::client::{ProviderClients, Resource, ResourceClient, ResourceKind, Verb};
use crate::model::{
    IpAllocationMethod, LoadBalancer, PublicIpAddress, SecurityGroup, Subnet,
};
use crate::naming;
use crate::{CloudError, Result};

/// One call received by the provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderCall {
    pub verb: Verb,
    pub kind: ResourceKind,
    pub name: String,
}

impl ProviderCall {
    pub fn new(verb: Verb, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            verb,
            kind,
            name: name.into(),
        }
    }
}

/// Ordered record of provider calls, shared by all clients of a provider
#[derive(Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<ProviderCall>>>,
}

impl Journal {
    pub async fn record(&self, call: ProviderCall) {
        self.calls.lock().await.push(call);
    }

    pub async fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().await.clone()
    }

    /// Only create-or-update and delete calls
    pub async fn writes(&self) -> Vec<ProviderCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.verb.is_write())
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.calls.lock().await.clear();
    }
}

/// Fields the provider fills in on create-or-update
pub trait Provision: Resource {
    /// `previous` is the stored version being replaced, if any
    fn provision(&mut self, _previous: Option<&Self>) {}
}

impl Provision for Subnet {}

impl Provision for SecurityGroup {}

impl Provision for PublicIpAddress {
    fn provision(&mut self, previous: Option<&Self>) {
        if self.public_ip_allocation_method != Some(IpAllocationMethod::Static)
            || self.ip_address.is_some()
        {
            return;
        }
        self.ip_address = previous
            .and_then(|pip| pip.ip_address.clone())
            .or_else(|| {
                let mut rng = rand::thread_rng();
                Some(format!(
                    "{}.{}.{}.{}",
                    rng.gen_range(1..224),
                    rng.gen_range(0..256),
                    rng.gen_range(0..256),
                    rng.gen_range(1..255)
                ))
            });
    }
}

impl Provision for LoadBalancer {
    fn provision(&mut self, previous: Option<&Self>) {
        for config in &mut self.frontend_ip_configurations {
            if config.subnet.is_none()
                || config.private_ip_address.is_some()
                || config.private_ip_allocation_method != Some(IpAllocationMethod::Dynamic)
            {
                continue;
            }
            config.private_ip_address = previous
                .and_then(|lb| lb.frontend_ip_configuration(&config.name))
                .and_then(|old| old.private_ip_address.clone())
                .or_else(|| {
                    let mut rng = rand::thread_rng();
                    Some(format!(
                        "10.{}.{}.{}",
                        rng.gen_range(0..256),
                        rng.gen_range(0..256),
                        rng.gen_range(4..255)
                    ))
                });
        }
    }
}

type Store<R> = HashMap<String, BTreeMap<String, R>>;

/// Stores resources of one kind, keyed by group and lowercase name
pub struct MemoryClient<R> {
    subscription: String,
    journal: Journal,
    store: RwLock<Store<R>>,
    rejection: Mutex<Option<(Verb, String)>>,
}

impl<R: Provision> MemoryClient<R> {
    pub fn new(subscription: impl Into<String>, journal: Journal) -> Self {
        Self {
            subscription: subscription.into(),
            journal,
            store: RwLock::new(HashMap::new()),
            rejection: Mutex::new(None),
        }
    }

    /// Fail the next `verb` call with `ProviderRejected`
    pub async fn reject(&self, verb: Verb, message: impl Into<String>) {
        *self.rejection.lock().await = Some((verb, message.into()));
    }

    /// Store `resource` as is, bypassing the journal
    pub async fn insert(&self, group: &str, mut resource: R) {
        if resource.id().is_none() {
            let id = naming::resource_id(&self.subscription, R::KIND, group, resource.name());
            resource.set_id(id);
        }
        self.store
            .write()
            .await
            .entry(group.to_ascii_lowercase())
            .or_default()
            .insert(resource.name().to_ascii_lowercase(), resource);
    }

    /// Stored version of `name`, bypassing the journal
    pub async fn snapshot(&self, group: &str, name: &str) -> Option<R> {
        self.store
            .read()
            .await
            .get(&group.to_ascii_lowercase())
            .and_then(|resources| resources.get(&name.to_ascii_lowercase()))
            .cloned()
    }

    pub async fn len(&self, group: &str) -> usize {
        self.store
            .read()
            .await
            .get(&group.to_ascii_lowercase())
            .map_or(0, BTreeMap::len)
    }

    async fn begin(&self, verb: Verb, name: &str) -> Result<()> {
        self.journal.record(ProviderCall::new(verb, R::KIND, name)).await;

        let mut rejection = self.rejection.lock().await;
        if rejection.as_ref().is_some_and(|(rejected, _)| *rejected == verb) {
            if let Some((_, message)) = rejection.take() {
                debug!(kind = %R::KIND, %verb, %name, "Rejecting provider call");
                return Err(CloudError::ProviderRejected {
                    kind: R::KIND,
                    verb,
                    name: name.to_string(),
                    message,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<R: Provision> ResourceClient<R> for MemoryClient<R> {
    async fn create_or_update(&self, group: &str, name: &str, mut resource: R) -> Result<R> {
        self.begin(Verb::CreateOrUpdate, name).await?;

        let mut store = self.store.write().await;
        let resources = store.entry(group.to_ascii_lowercase()).or_default();
        let key = name.to_ascii_lowercase();

        resource.set_id(naming::resource_id(&self.subscription, R::KIND, group, name));
        resource.provision(resources.get(&key));
        resources.insert(key, resource.clone());
        Ok(resource)
    }

    async fn delete(&self, group: &str, name: &str) -> Result<()> {
        self.begin(Verb::Delete, name).await?;

        self.store
            .write()
            .await
            .get_mut(&group.to_ascii_lowercase())
            .and_then(|resources| resources.remove(&name.to_ascii_lowercase()))
            .map(|_| ())
            .ok_or_else(|| CloudError::not_found(R::KIND, name))
    }

    async fn get(&self, group: &str, name: &str) -> Result<R> {
        self.begin(Verb::Get, name).await?;

        self.snapshot(group, name)
            .await
            .ok_or_else(|| CloudError::not_found(R::KIND, name))
    }

    async fn list(&self, group: &str) -> Result<Vec<R>> {
        self.begin(Verb::List, group).await?;

        Ok(self
            .store
            .read()
            .await
            .get(&group.to_ascii_lowercase())
            .map(|resources| resources.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// All four clients over one journal
#[derive(Clone)]
pub struct MemoryProvider {
    pub journal: Journal,
    pub load_balancers: Arc<MemoryClient<LoadBalancer>>,
    pub public_ips: Arc<MemoryClient<PublicIpAddress>>,
    pub subnets: Arc<MemoryClient<Subnet>>,
    pub security_groups: Arc<MemoryClient<SecurityGroup>>,
}

impl MemoryProvider {
    pub fn new(subscription: &str) -> Self {
        let journal = Journal::default();
        Self {
            load_balancers: Arc::new(MemoryClient::new(subscription, journal.clone())),
            public_ips: Arc::new(MemoryClient::new(subscription, journal.clone())),
            subnets: Arc::new(MemoryClient::new(subscription, journal.clone())),
            security_groups: Arc::new(MemoryClient::new(subscription, journal.clone())),
            journal,
        }
    }

    pub fn clients(&self) -> ProviderClients {
        ProviderClients {
            load_balancers: self.load_balancers.clone(),
            public_ips: self.public_ips.clone(),
            subnets: self.subnets.clone(),
            security_groups: self.security_groups.clone(),
        }
    }
}
