use std::sync::Arc;

use async_trait::async_trait;
use http::{Response, StatusCode};
use pingora::{
    apps::http_app::ServeHttp, protocols::http::ServerSession, services::listening::Service,
};
use serde::Serialize;

use crate::{
    config::Status,
    core::{status, Gateway},
    utils::response::{CommonErrors, ResponseBuilder},
};

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    services: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

/// Readiness probe on its own listener, apart from the gateway API.
pub struct StatusHttpApp {
    gateway: Arc<Gateway>,
}

impl StatusHttpApp {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub fn status_http_service(cfg: &Status, gateway: Arc<Gateway>) -> Service<Self> {
        let mut service = Service::new("Status HTTP".to_string(), Self::new(gateway));
        service.add_tcp(&cfg.address.to_string());
        service
    }

    fn ready(&self) -> Response<Vec<u8>> {
        if status::is_ready() {
            let body = ReadyResponse {
                status: "ok",
                services: Some(self.gateway.registry().len()),
                error: None,
            };
            ResponseBuilder::success_json(&body)
        } else {
            let body = ReadyResponse {
                status: "error",
                services: None,
                error: Some("Gateway not started yet"),
            };
            ResponseBuilder::json_with_status(StatusCode::SERVICE_UNAVAILABLE, &body)
        }
    }
}

#[async_trait]
impl ServeHttp for StatusHttpApp {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        http_session.set_keepalive(None);

        match http_session.req_header().uri.path() {
            "/status/ready" => self.ready(),
            _ => CommonErrors::not_found(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::{config, core::status::tests::TEST_LOCK};

    #[test]
    fn test_ready_endpoint() {
        let _guard = TEST_LOCK.lock().unwrap();
        let gateway = Arc::new(Gateway::new(&config::Gateway::default()).unwrap());
        let app = StatusHttpApp::new(gateway);

        status::reset();
        let response = app.ready();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "error");

        status::mark_ready(1);
        let response = app.ready();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body, json!({"status": "ok", "services": 0}));
        status::reset();
    }
}
