//! Caller-facing operations over the three reconcilers
//!
//! Every operation is a strict sequence of reconciliation steps. A failing
//! step aborts the sequence; earlier steps are not rolled back and the next
//! pass converges from whatever state was left.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, Node};
use lb_api::ExposureRequest;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{ProviderClients, ResourceClient, ResourceKind};
use crate::config::CloudConfig;
use crate::load_balancer::LoadBalancerReconciler;
use crate::metrics::ReconcileMetrics;
use crate::model::{LoadBalancer, PublicIpAddress};
use crate::naming;
use crate::protocol;
use crate::public_ip::PublicIpManager;
use crate::security_group::{self, SecurityGroupReconciler};
use crate::{CloudError, Result};

/// Load balancer lifecycle as seen by a service controller
#[async_trait]
pub trait LoadBalancerProvider: Send + Sync {
    /// Status of the service's frontend.
    ///
    /// When the service has no frontend yet, or the public IP its frontend
    /// references is gone, this performs a full
    /// [`ensure_load_balancer`](Self::ensure_load_balancer) and reports the
    /// result.
    async fn get_load_balancer(
        &self,
        cluster: &str,
        request: &ExposureRequest,
    ) -> Result<LoadBalancerStatus>;

    async fn ensure_load_balancer(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        nodes: &[Node],
    ) -> Result<LoadBalancerStatus>;

    /// Same contract as [`ensure_load_balancer`](Self::ensure_load_balancer)
    async fn update_load_balancer(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        nodes: &[Node],
    ) -> Result<LoadBalancerStatus>;

    async fn ensure_load_balancer_deleted(
        &self,
        cluster: &str,
        request: &ExposureRequest,
    ) -> Result<()>;
}

/// Reconciliation engine for one subscription and resource group.
///
/// Holds no locks: callers must not run two operations concurrently
/// against the same cluster. [`crate::ReconcileWorker`] provides that.
#[derive(Clone)]
pub struct Cloud {
    config: Arc<CloudConfig>,
    load_balancer_client: Arc<dyn ResourceClient<LoadBalancer>>,
    public_ip_client: Arc<dyn ResourceClient<PublicIpAddress>>,
    load_balancers: LoadBalancerReconciler,
    security_groups: SecurityGroupReconciler,
    public_ips: PublicIpManager,
    metrics: ReconcileMetrics,
}

impl Cloud {
    pub fn new(config: CloudConfig, clients: ProviderClients) -> Result<Self> {
        let config = Arc::new(config);
        Ok(Self {
            load_balancer_client: clients.load_balancers.clone(),
            public_ip_client: clients.public_ips.clone(),
            load_balancers: LoadBalancerReconciler::new(config.clone(), &clients),
            security_groups: SecurityGroupReconciler::new(
                config.clone(),
                clients.security_groups.clone(),
            ),
            public_ips: PublicIpManager::new(config.clone(), clients.public_ips.clone()),
            metrics: ReconcileMetrics::new()?,
            config,
        })
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ReconcileMetrics {
        &self.metrics
    }

    /// Reject requests the provider cannot express before touching it
    pub fn validate(request: &ExposureRequest) -> Result<()> {
        for port in &request.ports {
            protocol::translate(port.protocol)?;
        }
        security_group::effective_source_ranges(request)?;
        Ok(())
    }

    async fn ensure(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        nodes: &[Node],
    ) -> Result<LoadBalancerStatus> {
        Self::validate(request)?;

        if request.ports.is_empty() {
            debug!(service = %request.service_name(), "No ports requested, removing exposure");
            self.delete(cluster, request).await?;
            return Ok(LoadBalancerStatus::default());
        }

        info!(
            service = %request.service_name(),
            internal = request.internal,
            ports = request.ports.len(),
            "Ensuring load balancer"
        );

        self.security_groups.reconcile(request, true).await?;

        // A service that switched placement must leave the other balancer
        // before its public IP can be released
        self.load_balancers
            .reconcile(cluster, &request.flipped(), nodes, false)
            .await?;

        let pip = self.public_ips.acquire(cluster, request, true).await?;
        let lb = self.load_balancers.reconcile(cluster, request, nodes, true).await?;

        // Addresses the frontend referenced before this pass are free now
        self.public_ips.release(cluster, request, pip.as_ref()).await?;

        self.status(&lb, request).await?.ok_or_else(|| {
            CloudError::not_found(
                ResourceKind::LoadBalancer,
                naming::frontend_ip_config_name(request, request.subnet()),
            )
        })
    }

    async fn delete(&self, cluster: &str, request: &ExposureRequest) -> Result<()> {
        info!(service = %request.service_name(), "Deleting load balancer exposure");

        self.security_groups.reconcile(request, false).await?;
        self.load_balancers.reconcile(cluster, request, &[], false).await?;
        self.load_balancers
            .reconcile(cluster, &request.flipped(), &[], false)
            .await?;
        self.public_ips.reconcile(cluster, request, false).await?;
        Ok(())
    }

    async fn get(&self, cluster: &str, request: &ExposureRequest) -> Result<LoadBalancerStatus> {
        let lb_name = naming::load_balancer_name(cluster, request.internal);
        let lb = match self
            .load_balancer_client
            .get(&self.config.resource_group, &lb_name)
            .await
        {
            Ok(lb) => Some(lb),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        if let Some(lb) = lb {
            if let Some(status) = self.status(&lb, request).await? {
                return Ok(status);
            }
        }

        warn!(service = %request.service_name(), "Load balancer frontend not found, ensuring");
        self.ensure(cluster, request, &[]).await
    }

    /// Ingress of the service's frontend on `lb`, `None` when it has none or
    /// its public IP is missing
    async fn status(
        &self,
        lb: &LoadBalancer,
        request: &ExposureRequest,
    ) -> Result<Option<LoadBalancerStatus>> {
        let frontend_name = naming::frontend_ip_config_name(request, request.subnet());
        let Some(frontend) = lb.frontend_ip_configuration(&frontend_name) else {
            return Ok(None);
        };

        let ip = if request.internal {
            frontend.private_ip_address.clone()
        } else {
            match &frontend.public_ip_address {
                Some(reference) => match self
                    .public_ip_client
                    .get(&self.config.resource_group, reference.name())
                    .await
                {
                    Ok(pip) => pip.ip_address,
                    Err(e) if e.is_not_found() => {
                        debug!(public_ip = %reference.name(), "Referenced public IP not found");
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                },
                None => None,
            }
        };

        let ingress = ip
            .map(|ip| LoadBalancerIngress {
                ip: Some(ip),
                ..Default::default()
            })
            .into_iter()
            .collect();

        Ok(Some(LoadBalancerStatus {
            ingress: Some(ingress),
        }))
    }

    async fn observed<T, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let result = future.await;
        self.metrics.observe(operation, result.is_ok(), started.elapsed());
        if let Err(e) = &result {
            warn!(operation, error = %e, "Load balancer operation failed");
        }
        result
    }
}

#[async_trait]
impl LoadBalancerProvider for Cloud {
    async fn get_load_balancer(
        &self,
        cluster: &str,
        request: &ExposureRequest,
    ) -> Result<LoadBalancerStatus> {
        self.observed("get", self.get(cluster, request)).await
    }

    async fn ensure_load_balancer(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        nodes: &[Node],
    ) -> Result<LoadBalancerStatus> {
        self.observed("ensure", self.ensure(cluster, request, nodes)).await
    }

    async fn update_load_balancer(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        nodes: &[Node],
    ) -> Result<LoadBalancerStatus> {
        self.observed("update", self.ensure(cluster, request, nodes)).await
    }

    async fn ensure_load_balancer_deleted(
        &self,
        cluster: &str,
        request: &ExposureRequest,
    ) -> Result<()> {
        self.observed("delete", self.delete(cluster, request)).await
    }
}
