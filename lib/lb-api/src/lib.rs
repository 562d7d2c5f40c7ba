//! Exposure request types for the cloud load balancer engine
//!
//! This library defines what a service asks of the cloud:
//! - ExposureRequest: ports, traffic policy, source ranges and placement
//! - PortMapping: one exposed port and the node port that backs it
//! - Conversion from Kubernetes `Service` objects and their annotations

pub mod error;
pub mod request;
pub mod service;

pub use error::{RequestError, Result};
pub use request::{ExposureRequest, PortMapping, Protocol, SessionAffinity, TrafficPolicy};
