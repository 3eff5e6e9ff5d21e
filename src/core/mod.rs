//! Aggregation core of mixgate
//!
//! Registry, dependency resolution, response caching, downstream dispatch
//! and the recursive engine that ties them together.

pub mod cache;
pub mod coordinate;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod resolver;
pub mod service;
pub mod status;

// Re-export commonly used types
pub use cache::{JsonMap, ResponseCache};
pub use coordinate::Coordinate;
pub use dispatcher::{Outcome, RequestDispatcher};
pub use engine::AggregationEngine;
pub use error::{GatewayError, GatewayResult};
pub use gateway::Gateway;
pub use registry::ServiceRegistry;
pub use resolver::DependencyResolver;
pub use service::{DependencyDescriptor, Service};
