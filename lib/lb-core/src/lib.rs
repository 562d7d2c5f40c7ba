//! Load balancer convergence engine
//!
//! This library provides:
//! - Reconcilers for a service's load balancer entries, security rules and
//!   public IP address
//! - The caller-facing get/ensure/update/delete operations over them
//! - A single-worker queue serializing passes against shared resources
//! - An in-memory provider for tests and dry runs

pub mod client;
pub mod cloud;
pub mod config;
pub mod error;
pub mod load_balancer;
pub mod memory;
pub mod metrics;
pub mod model;
pub mod naming;
pub mod priority;
pub mod protocol;
pub mod public_ip;
pub mod security_group;
pub mod slots;
pub mod worker;

pub use client::{ProviderClients, Resource, ResourceClient, ResourceKind, Verb};
pub use cloud::{Cloud, LoadBalancerProvider};
pub use config::CloudConfig;
pub use error::{CloudError, Result};
pub use memory::{Journal, MemoryClient, MemoryProvider, ProviderCall};
pub use metrics::ReconcileMetrics;
pub use worker::{ReconcileWorker, WorkerHandle};
