use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use http::{Method, Response};
use matchit::{Match, Router};
use pingora::{
    apps::http_app::ServeHttp, protocols::http::ServerSession, services::listening::Service,
};

use crate::{
    admin::{DeregisterHandler, ListHandler, RegisterHandler},
    config,
    core::{Gateway, GatewayResult},
    service::mix::{MixFormHandler, MixPathHandler},
    utils::response::{CommonErrors, ResponseBuilder},
};

/// One endpoint of the gateway API. `params` holds the matched path parameters.
#[async_trait]
pub trait Handler {
    async fn handle(
        &self,
        gateway: &Gateway,
        session: &mut ServerSession,
        params: BTreeMap<String, String>,
    ) -> GatewayResult<Response<Vec<u8>>>;
}

type MethodTable = HashMap<Method, Box<dyn Handler + Send + Sync>>;

/// Front door of the gateway: registration, listing and MIX aggregation.
pub struct GatewayHttpApp {
    gateway: Arc<Gateway>,
    router: Router<MethodTable>,
}

impl GatewayHttpApp {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let mut this = Self {
            gateway,
            router: Router::new(),
        };

        this.route("/microservice", Method::PUT, Box::new(RegisterHandler))
            .route("/microservice", Method::DELETE, Box::new(DeregisterHandler))
            .route("/microservices", Method::GET, Box::new(ListHandler))
            .route("/MIX", Method::POST, Box::new(MixFormHandler))
            .route("/MIX/{location}", Method::GET, Box::new(MixPathHandler));

        this
    }

    fn route(
        &mut self,
        path: &str,
        method: Method,
        handler: Box<dyn Handler + Send + Sync>,
    ) -> &mut Self {
        if let Ok(routes) = self.router.at_mut(path) {
            routes.value.insert(method, handler);
            return self;
        }

        let mut handlers: MethodTable = HashMap::new();
        handlers.insert(method.clone(), handler);
        if let Err(e) = self.router.insert(path, handlers) {
            log::error!("Failed to add route {method} {path}: {e}");
        }
        self
    }

    pub fn gateway_http_service(cfg: &config::Gateway, gateway: Arc<Gateway>) -> Service<Self> {
        let app = Self::new(gateway);
        let mut service = Service::new("Gateway HTTP".to_string(), app);
        for listener in &cfg.listeners {
            log::info!("Gateway listening on {}", listener.address);
            service.add_tcp(&listener.address.to_string());
        }
        service
    }

    async fn dispatch(
        &self,
        http_session: &mut ServerSession,
        path: &str,
        method: &Method,
    ) -> Response<Vec<u8>> {
        let Ok(Match { value, params }) = self.router.at(path) else {
            return CommonErrors::not_found();
        };
        let Some(handler) = value.get(method) else {
            return CommonErrors::method_not_allowed();
        };

        let params: BTreeMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        match handler.handle(&self.gateway, http_session, params).await {
            Ok(resp) => resp,
            Err(e) => ResponseBuilder::from_error(&e),
        }
    }
}

#[async_trait]
impl ServeHttp for GatewayHttpApp {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        http_session.set_keepalive(None);

        let (path, method) = {
            let req_header = http_session.req_header();
            (req_header.uri.path().to_string(), req_header.method.clone())
        };
        log::debug!("{method} {path}");

        self.dispatch(http_session, &path, &method).await
    }
}
