//! Recursive aggregation over a service's dependency graph.

use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use log::{debug, warn};
use serde_json::Value;

use super::{
    cache::{JsonMap, ResponseCache},
    coordinate::Coordinate,
    dispatcher::{Outcome, RequestDispatcher},
    error::{GatewayError, GatewayResult},
    resolver::DependencyResolver,
    service::Service,
};

pub const DEFAULT_MAX_DEPTH: usize = 32;

pub struct AggregationEngine {
    resolver: DependencyResolver,
    cache: Arc<ResponseCache>,
    dispatcher: RequestDispatcher,
    max_depth: usize,
}

impl AggregationEngine {
    pub fn new(
        resolver: DependencyResolver,
        cache: Arc<ResponseCache>,
        dispatcher: RequestDispatcher,
        max_depth: usize,
    ) -> Self {
        Self {
            resolver,
            cache,
            dispatcher,
            max_depth,
        }
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    /// Aggregate `service` for `coordinate`.
    ///
    /// A cycle or an overly deep call path anywhere below `service` aborts
    /// the whole aggregation and yields an empty body.
    pub async fn aggregate(&self, service: Arc<Service>, coordinate: Coordinate) -> JsonMap {
        let path = vec![service.address().to_string()];
        let address = service.address().to_string();

        match self.resolve(service, coordinate, path).await {
            Ok(body) => body,
            Err(err) => {
                warn!("Aggregation for {address} aborted: {err}");
                JsonMap::new()
            }
        }
    }

    /// `path` holds the addresses from the top-level service down to and
    /// including `service`.
    fn resolve<'a>(
        &'a self,
        service: Arc<Service>,
        coordinate: Coordinate,
        path: Vec<String>,
    ) -> BoxFuture<'a, GatewayResult<JsonMap>> {
        async move {
            if let Some(body) = self.cache.lookup(&coordinate, &service) {
                return Ok(body);
            }

            let dependencies = match self.resolver.dependencies(&service) {
                Ok(dependencies) => dependencies,
                Err(err) => {
                    warn!("Skipping {}: {err}", service.address());
                    return Ok(JsonMap::new());
                }
            };

            let children = dependencies
                .into_iter()
                .map(|dependency| {
                    if path.iter().any(|visited| visited == dependency.address()) {
                        return Err(GatewayError::CircularDependency(
                            dependency.address().to_string(),
                        ));
                    }
                    if path.len() >= self.max_depth {
                        return Err(GatewayError::DepthExceeded(self.max_depth));
                    }

                    let mut child_path = path.clone();
                    child_path.push(dependency.address().to_string());
                    Ok(self.resolve(dependency, coordinate, child_path))
                })
                .collect::<GatewayResult<Vec<_>>>()?;

            let mut body = request_body(&coordinate);
            // try_join_all keeps declaration order, so later dependencies
            // overwrite earlier ones on key conflicts.
            for child in try_join_all(children).await? {
                body.extend(child);
            }

            debug!(
                "Dispatching {} with {} merged keys",
                service.address(),
                body.len()
            );
            match self.dispatcher.dispatch(&service, &coordinate, &body).await {
                Outcome::Success { body, .. } => Ok(body),
                _ => Ok(JsonMap::new()),
            }
        }
        .boxed()
    }
}

fn request_body(coordinate: &Coordinate) -> JsonMap {
    let mut body = JsonMap::new();
    body.insert("latitude".to_string(), Value::from(coordinate.latitude()));
    body.insert("longitude".to_string(), Value::from(coordinate.longitude()));
    body
}
