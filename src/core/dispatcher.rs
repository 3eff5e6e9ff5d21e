//! Outbound calls to downstream services.

use std::{sync::Arc, time::Duration};

use http::header::CACHE_CONTROL;
use log::{debug, warn};
use serde_json::Value;

use super::{
    cache::{JsonMap, ResponseCache},
    coordinate::Coordinate,
    error::GatewayResult,
    registry::ServiceRegistry,
    service::Service,
};
use crate::config::DownstreamScheme;

pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(2);

/// Classified result of one downstream call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        body: JsonMap,
        cache_directive: Option<String>,
    },
    ClientError(u16),
    ServerError(u16),
    /// Success status with a body that is neither empty nor a JSON object.
    InvalidBody(String),
    TransportFailure(String),
}

impl Outcome {
    /// Whether this outcome marks the service as gone.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::ServerError(_) | Outcome::TransportFailure(_))
    }
}

pub struct RequestDispatcher {
    client: reqwest::Client,
    registry: Arc<ServiceRegistry>,
    cache: Arc<ResponseCache>,
    scheme: DownstreamScheme,
    timeout: Duration,
}

impl RequestDispatcher {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        cache: Arc<ResponseCache>,
        scheme: DownstreamScheme,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            registry,
            cache,
            scheme,
            timeout,
        })
    }

    /// Send `body` to `service` and classify the response.
    ///
    /// Server errors and transport failures deregister the service.
    /// Successful bodies are stored in the response cache.
    pub async fn dispatch(
        &self,
        service: &Service,
        coordinate: &Coordinate,
        body: &JsonMap,
    ) -> Outcome {
        let outcome = self.send(service, body).await;

        match &outcome {
            Outcome::Success {
                body,
                cache_directive,
            } => {
                self.cache
                    .store(coordinate, service, body.clone(), cache_directive.as_deref());
            }
            Outcome::ClientError(status) => {
                warn!(
                    "Service {} rejected request with status {status}",
                    service.address()
                );
            }
            Outcome::ServerError(status) => {
                warn!(
                    "Service {} failed with status {status}, deregistering",
                    service.address()
                );
            }
            Outcome::InvalidBody(err) => {
                warn!(
                    "Service {} returned an unusable body ({err})",
                    service.address()
                );
            }
            Outcome::TransportFailure(err) => {
                warn!(
                    "Service {} unreachable ({err}), deregistering",
                    service.address()
                );
            }
        }

        if outcome.is_fatal() {
            self.registry.deregister(service.address());
        }
        outcome
    }

    async fn send(&self, service: &Service, body: &JsonMap) -> Outcome {
        let url = format!("{}://{}/", self.scheme.as_str(), service.address());
        debug!("Dispatching to {url} with timeout {:?}", self.timeout);
        log::trace!("Request body for {url}: {body:?}");

        let response = match self.client.get(&url).json(body).send().await {
            Ok(response) => response,
            Err(err) => return Outcome::TransportFailure(err.to_string()),
        };

        let status = response.status();
        if status.is_server_error() {
            return Outcome::ServerError(status.as_u16());
        }
        if status.is_client_error() {
            return Outcome::ClientError(status.as_u16());
        }

        let cache_directive = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return Outcome::TransportFailure(err.to_string()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Outcome::Success {
                body: JsonMap::new(),
                cache_directive,
            };
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(body)) => Outcome::Success {
                body,
                cache_directive,
            },
            Ok(other) => Outcome::InvalidBody(format!("expected a JSON object, got {other}")),
            Err(err) => Outcome::InvalidBody(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    use super::*;

    fn setup(timeout: Duration) -> (Arc<ServiceRegistry>, Arc<ResponseCache>, RequestDispatcher) {
        let registry = Arc::new(ServiceRegistry::new());
        let cache = Arc::new(ResponseCache::new());
        let dispatcher = RequestDispatcher::new(
            registry.clone(),
            cache.clone(),
            DownstreamScheme::Http,
            timeout,
        )
        .unwrap();
        (registry, cache, dispatcher)
    }

    fn request_body(coord: &Coordinate) -> JsonMap {
        json!({"latitude": coord.latitude(), "longitude": coord.longitude()})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_stores_in_cache() {
        let server = MockServer::start_async().await;
        let coord = Coordinate::new(40.0, -88.0).unwrap();
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/")
                    .json_body(json!({"latitude": 40.0, "longitude": -88.0}));
                then.status(200)
                    .header("cache-control", "max-age=30")
                    .json_body(json!({"temp": 21}));
            })
            .await;

        let (registry, cache, dispatcher) = setup(DEFAULT_DISPATCH_TIMEOUT);
        let svc = registry.register(Service::new(
            server.address().to_string(),
            "weather",
            "tester",
            "tile",
            vec![],
        ));

        let outcome = dispatcher.dispatch(&svc, &coord, &request_body(&coord)).await;
        mock.assert_async().await;
        assert!(matches!(outcome, Outcome::Success { .. }));
        assert_eq!(svc.max_age(), Some(30));
        assert_eq!(
            cache.lookup(&coord, &svc),
            json!({"temp": 21}).as_object().cloned()
        );
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_client_error_keeps_service() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(404);
            })
            .await;

        let (registry, cache, dispatcher) = setup(DEFAULT_DISPATCH_TIMEOUT);
        let svc = registry.register(Service::new(
            server.address().to_string(),
            "weather",
            "tester",
            "tile",
            vec![],
        ));
        let coord = Coordinate::new(0.0, 0.0).unwrap();

        let outcome = dispatcher.dispatch(&svc, &coord, &request_body(&coord)).await;
        assert_eq!(outcome, Outcome::ClientError(404));
        assert_eq!(registry.len(), 1);
        assert!(cache.is_empty());
        assert_eq!(svc.max_age(), None);
    }

    #[tokio::test]
    async fn test_server_error_deregisters() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(503);
            })
            .await;

        let (registry, _cache, dispatcher) = setup(DEFAULT_DISPATCH_TIMEOUT);
        let svc = registry.register(Service::new(
            server.address().to_string(),
            "weather",
            "tester",
            "tile",
            vec![],
        ));
        let coord = Coordinate::new(0.0, 0.0).unwrap();

        let outcome = dispatcher.dispatch(&svc, &coord, &request_body(&coord)).await;
        assert_eq!(outcome, Outcome::ServerError(503));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_non_object_body_keeps_service() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).body("[1, 2, 3]");
            })
            .await;

        let (registry, cache, dispatcher) = setup(DEFAULT_DISPATCH_TIMEOUT);
        let svc = registry.register(Service::new(
            server.address().to_string(),
            "weather",
            "tester",
            "tile",
            vec![],
        ));
        let coord = Coordinate::new(0.0, 0.0).unwrap();

        let outcome = dispatcher.dispatch(&svc, &coord, &request_body(&coord)).await;
        assert!(matches!(outcome, Outcome::InvalidBody(_)));
        assert_eq!(registry.len(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_no_content_is_empty_success() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(204);
            })
            .await;

        let (registry, cache, dispatcher) = setup(DEFAULT_DISPATCH_TIMEOUT);
        let svc = registry.register(Service::new(
            server.address().to_string(),
            "quiet",
            "tester",
            "tile",
            vec![],
        ));
        let coord = Coordinate::new(0.0, 0.0).unwrap();

        let outcome = dispatcher.dispatch(&svc, &coord, &request_body(&coord)).await;
        assert_eq!(
            outcome,
            Outcome::Success {
                body: JsonMap::new(),
                cache_directive: None,
            }
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(svc.max_age(), Some(0));
    }

    #[tokio::test]
    async fn test_unreachable_deregisters() {
        let (registry, _cache, dispatcher) = setup(DEFAULT_DISPATCH_TIMEOUT);
        let svc = registry.register(Service::new("127.0.0.1:1", "gone", "tester", "tile", vec![]));
        let coord = Coordinate::new(0.0, 0.0).unwrap();

        let outcome = dispatcher.dispatch(&svc, &coord, &request_body(&coord)).await;
        assert!(matches!(outcome, Outcome::TransportFailure(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_transport_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200)
                    .delay(Duration::from_secs(2))
                    .json_body(json!({"slow": true}));
            })
            .await;

        let (registry, _cache, dispatcher) = setup(Duration::from_millis(200));
        let svc = registry.register(Service::new(
            server.address().to_string(),
            "slow",
            "tester",
            "tile",
            vec![],
        ));
        let coord = Coordinate::new(0.0, 0.0).unwrap();

        let outcome = dispatcher.dispatch(&svc, &coord, &request_body(&coord)).await;
        assert!(matches!(outcome, Outcome::TransportFailure(_)));
        assert!(registry.is_empty());
    }
}
