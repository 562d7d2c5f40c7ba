//! Single-worker serialization of reconciliation passes
//!
//! Services sharing a balancer and a security group must never be
//! reconciled concurrently: both hold collections that every pass rewrites
//! as a whole. The worker owns the provider and runs one command at a time;
//! handles queue commands on a bounded channel and wait for the reply.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{LoadBalancerStatus, Node};
use lb_api::ExposureRequest;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cloud::LoadBalancerProvider;
use crate::{CloudError, Result};

/// Default queue depth of a worker
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

enum Command {
    Get {
        cluster: String,
        request: ExposureRequest,
        reply: oneshot::Sender<Result<LoadBalancerStatus>>,
    },
    Ensure {
        cluster: String,
        request: ExposureRequest,
        nodes: Vec<Node>,
        reply: oneshot::Sender<Result<LoadBalancerStatus>>,
    },
    Update {
        cluster: String,
        request: ExposureRequest,
        nodes: Vec<Node>,
        reply: oneshot::Sender<Result<LoadBalancerStatus>>,
    },
    Delete {
        cluster: String,
        request: ExposureRequest,
        reply: oneshot::Sender<Result<()>>,
    },
}

pub struct ReconcileWorker;

impl ReconcileWorker {
    /// Start the worker task.
    ///
    /// The task ends once every handle has been dropped and the queue is
    /// drained.
    pub fn spawn<P>(provider: Arc<P>, capacity: usize) -> (WorkerHandle, JoinHandle<()>)
    where
        P: LoadBalancerProvider + ?Sized + 'static,
    {
        let (sender, mut receiver) = mpsc::channel(capacity.max(1));

        let task = tokio::spawn(async move {
            info!("Reconcile worker started");
            while let Some(command) = receiver.recv().await {
                // A dropped reply means the caller gave up; the pass still ran
                match command {
                    Command::Get { cluster, request, reply } => {
                        debug!(service = %request.service_name(), "Worker running get");
                        let _ = reply.send(provider.get_load_balancer(&cluster, &request).await);
                    }
                    Command::Ensure {
                        cluster,
                        request,
                        nodes,
                        reply,
                    } => {
                        debug!(service = %request.service_name(), "Worker running ensure");
                        let result =
                            provider.ensure_load_balancer(&cluster, &request, &nodes).await;
                        let _ = reply.send(result);
                    }
                    Command::Update {
                        cluster,
                        request,
                        nodes,
                        reply,
                    } => {
                        debug!(service = %request.service_name(), "Worker running update");
                        let result =
                            provider.update_load_balancer(&cluster, &request, &nodes).await;
                        let _ = reply.send(result);
                    }
                    Command::Delete { cluster, request, reply } => {
                        debug!(service = %request.service_name(), "Worker running delete");
                        let result =
                            provider.ensure_load_balancer_deleted(&cluster, &request).await;
                        let _ = reply.send(result);
                    }
                }
            }
            info!("Reconcile worker stopped");
        });

        (WorkerHandle { sender }, task)
    }
}

/// Cloneable entry point to a [`ReconcileWorker`]
#[derive(Clone)]
pub struct WorkerHandle {
    sender: mpsc::Sender<Command>,
}

impl WorkerHandle {
    async fn call<T>(&self, command: Command, reply: oneshot::Receiver<Result<T>>) -> Result<T> {
        self.sender
            .send(command)
            .await
            .map_err(|_| CloudError::WorkerStopped)?;
        reply.await.map_err(|_| CloudError::WorkerStopped)?
    }
}

#[async_trait]
impl LoadBalancerProvider for WorkerHandle {
    async fn get_load_balancer(
        &self,
        cluster: &str,
        request: &ExposureRequest,
    ) -> Result<LoadBalancerStatus> {
        let (reply, receiver) = oneshot::channel();
        let command = Command::Get {
            cluster: cluster.to_string(),
            request: request.clone(),
            reply,
        };
        self.call(command, receiver).await
    }

    async fn ensure_load_balancer(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        nodes: &[Node],
    ) -> Result<LoadBalancerStatus> {
        let (reply, receiver) = oneshot::channel();
        let command = Command::Ensure {
            cluster: cluster.to_string(),
            request: request.clone(),
            nodes: nodes.to_vec(),
            reply,
        };
        self.call(command, receiver).await
    }

    async fn update_load_balancer(
        &self,
        cluster: &str,
        request: &ExposureRequest,
        nodes: &[Node],
    ) -> Result<LoadBalancerStatus> {
        let (reply, receiver) = oneshot::channel();
        let command = Command::Update {
            cluster: cluster.to_string(),
            request: request.clone(),
            nodes: nodes.to_vec(),
            reply,
        };
        self.call(command, receiver).await
    }

    async fn ensure_load_balancer_deleted(
        &self,
        cluster: &str,
        request: &ExposureRequest,
    ) -> Result<()> {
        let (reply, receiver) = oneshot::channel();
        let command = Command::Delete {
            cluster: cluster.to_string(),
            request: request.clone(),
            reply,
        };
        self.call(command, receiver).await
    }
}
