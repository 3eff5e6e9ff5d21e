//! Gateway container and the MIX front controller.
//!
//! Owns the shared registry, cache and engine so request handlers never
//! touch raw shared state.

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::future::{join_all, FutureExt};
use log::{error, info};
use serde::Serialize;
use serde_json::{json, Value};

use super::{
    cache::ResponseCache,
    coordinate::Coordinate,
    dispatcher::RequestDispatcher,
    engine::AggregationEngine,
    error::{GatewayError, GatewayResult},
    registry::ServiceRegistry,
    resolver::DependencyResolver,
    service::Service,
};
use crate::config;

pub const METADATA_KEY: &str = "_metadata";

/// One row of the service status listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub creator: String,
    pub address: String,
    pub dependencies: Vec<String>,
}

pub struct Gateway {
    registry: Arc<ServiceRegistry>,
    engine: AggregationEngine,
}

impl Gateway {
    pub fn new(cfg: &config::Gateway) -> GatewayResult<Self> {
        let registry = Arc::new(ServiceRegistry::new());
        let cache = Arc::new(ResponseCache::new());
        let dispatcher = RequestDispatcher::new(
            registry.clone(),
            cache.clone(),
            cfg.scheme,
            cfg.dispatch_timeout(),
        )?;
        let engine = AggregationEngine::new(
            DependencyResolver::new(registry.clone()),
            cache,
            dispatcher,
            cfg.max_depth,
        );

        Ok(Self { registry, engine })
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn register(&self, service: Service) -> Arc<Service> {
        self.registry.register(service)
    }

    pub fn deregister(&self, address: &str) -> GatewayResult<()> {
        if self.registry.deregister(address) {
            Ok(())
        } else {
            Err(GatewayError::NotFound(format!("service {address}")))
        }
    }

    pub fn list_services(&self) -> Vec<ServiceSummary> {
        let snapshot = self.registry.snapshot();
        snapshot
            .values()
            .map(|service| ServiceSummary {
                name: service.name.clone(),
                creator: service.creator.clone(),
                address: service.address().to_string(),
                dependencies: self.engine.resolver().describe(service, &snapshot),
            })
            .collect()
    }

    /// Aggregate every registered service for `coordinate`.
    ///
    /// Each service contributes its body plus a `_metadata` block, even when
    /// the body degraded to `{}`. A service whose aggregation panics is
    /// deregistered and left out; the others are unaffected.
    pub async fn mix(&self, coordinate: Coordinate) -> Vec<Value> {
        let snapshot = self.registry.snapshot();
        info!(
            "Aggregating {} services for {coordinate}",
            snapshot.len()
        );

        let aggregations = snapshot.values().cloned().map(|service| async move {
            let result = AssertUnwindSafe(self.engine.aggregate(service.clone(), coordinate))
                .catch_unwind()
                .await;
            (service, result)
        });

        join_all(aggregations)
            .await
            .into_iter()
            .filter_map(|(service, result)| match result {
                Ok(mut body) => {
                    let metadata = service.metadata();
                    body.insert(
                        METADATA_KEY.to_string(),
                        json!({
                            "name": metadata.name,
                            "creator": metadata.creator,
                            "tile": metadata.tile,
                            "max-age": metadata.max_age,
                        }),
                    );
                    Some(Value::Object(body))
                }
                Err(_) => {
                    error!(
                        "Aggregation for {} panicked, deregistering",
                        service.address()
                    );
                    self.registry.deregister(service.address());
                    None
                }
            })
            .collect()
    }
}
