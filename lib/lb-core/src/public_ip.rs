//! Public IP lifecycle for externally placed services
//!
//! Acquiring and releasing are separate steps so an address is only
//! deleted once the balancer no longer references it.

use lb_api::ExposureRequest;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::ResourceClient;
use crate::config::CloudConfig;
use crate::model::PublicIpAddress;
use crate::naming;
use crate::{CloudError, Result};

/// Ensures a service's public IP exists while it is exposed externally and
/// releases it afterwards.
#[derive(Clone)]
pub struct PublicIpManager {
    config: Arc<CloudConfig>,
    public_ips: Arc<dyn ResourceClient<PublicIpAddress>>,
}

impl PublicIpManager {
    pub fn new(
        config: Arc<CloudConfig>,
        public_ips: Arc<dyn ResourceClient<PublicIpAddress>>,
    ) -> Self {
        Self { config, public_ips }
    }

    /// Name of the address the service's frontend should reference.
    ///
    /// A pinned `load_balancer_ip` resolves to whichever address in the
    /// resource group already carries that IP.
    pub async fn determine_name(&self, cluster: &str, request: &ExposureRequest) -> Result<String> {
        let Some(ip) = request.load_balancer_ip.as_deref() else {
            return Ok(naming::public_ip_name(cluster, request));
        };

        self.public_ips
            .list(&self.config.resource_group)
            .await?
            .into_iter()
            .find(|pip| pip.ip_address.as_deref() == Some(ip))
            .map(|pip| pip.name)
            .ok_or_else(|| CloudError::PinnedPublicIpNotFound(ip.to_string()))
    }

    /// Make sure the address `request` is exposed on exists.
    ///
    /// Returns `None` when the service is not exposed externally. An address
    /// under the service's own name tagged for someone else is replaced; a
    /// pinned address is adopted as it is.
    pub async fn acquire(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        want: bool,
    ) -> Result<Option<PublicIpAddress>> {
        if !want || request.internal || request.ports.is_empty() {
            return Ok(None);
        }

        let group = &self.config.resource_group;
        let service = request.service_name();
        let name = self.determine_name(cluster, request).await?;
        let pinned = request.load_balancer_ip.as_deref();

        match self.public_ips.get(group, &name).await {
            Ok(pip) if pinned.is_some() || pip.owned_by(cluster, &service) => return Ok(Some(pip)),
            Ok(pip) => {
                info!(
                    public_ip = %name,
                    service = %service,
                    owner = pip.owner().unwrap_or_default(),
                    "Replacing public IP address tagged for another service"
                );
                self.delete(&name).await?;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        if let Some(ip) = pinned {
            return Err(CloudError::PinnedPublicIpNotFound(ip.to_string()));
        }

        info!(public_ip = %name, service = %service, "Creating public IP address");
        let pip = PublicIpAddress::for_service(&name, &self.config.location, &service)
            .with_cluster(cluster);
        self.public_ips.create_or_update(group, &name, pip).await.map(Some)
    }

    /// Delete every address tagged for the service except `keep`.
    ///
    /// Without `keep` the service's synthesized address goes as well, tagged
    /// or not. Addresses that are already gone count as released.
    pub async fn release(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        keep: Option<&PublicIpAddress>,
    ) -> Result<()> {
        let service = request.service_name();
        let mut deleted = HashSet::new();

        for pip in self.public_ips.list(&self.config.resource_group).await? {
            let kept = keep.is_some_and(|keep| keep.name.eq_ignore_ascii_case(&pip.name));
            if kept || !pip.owned_by(cluster, &service) {
                continue;
            }

            info!(public_ip = %pip.name, service = %service, "Deleting public IP address");
            self.delete(&pip.name).await?;
            deleted.insert(pip.name.to_ascii_lowercase());
        }

        if keep.is_none() {
            let name = naming::public_ip_name(cluster, request);
            if !deleted.contains(&name.to_ascii_lowercase()) {
                debug!(public_ip = %name, service = %service, "Releasing public IP address");
                self.delete(&name).await?;
            }
        }
        Ok(())
    }

    /// Acquire then release in one step, for callers with no balancer in
    /// between.
    pub async fn reconcile(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        want: bool,
    ) -> Result<Option<PublicIpAddress>> {
        let pip = self.acquire(cluster, request, want).await?;
        self.release(cluster, request, pip.as_ref()).await?;
        Ok(pip)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        match self.public_ips.delete(&self.config.resource_group, name).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}
