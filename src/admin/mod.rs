//! Registration API: add, remove and list downstream information modules.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use http::Response;
use once_cell::sync::Lazy;
use pingora::protocols::http::ServerSession;
use regex::Regex;
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use validator::{Validate, ValidationError};

use crate::{
    core::{DependencyDescriptor, Gateway, GatewayResult, Service},
    service::http::Handler,
    utils::{
        request::{read_request_body, validate_content_type},
        response::{content_type, ResponseBuilder},
    },
    validation_error,
};

static HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\[[0-9A-Fa-f:.]+\]|[0-9A-Fa-f:.]+|[A-Za-z0-9.\-_]+)$").unwrap());

fn validate_host(host: &str) -> Result<(), ValidationError> {
    if HOST_RE.is_match(host) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_host"))
    }
}

/// `host:port`, with bare IPv6 hosts wrapped in brackets.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Body of `PUT /microservice`.
///
/// `port` is accepted as either a JSON number or a numeric string.
#[serde_as]
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        required(message = "Required key ip not present in payload JSON."),
        custom(function = "validate_host")
    )]
    pub ip: Option<String>,

    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[validate(required(message = "Required key port not present in payload JSON."))]
    pub port: Option<u16>,

    #[validate(required(message = "Required key name not present in payload JSON."))]
    pub name: Option<String>,

    #[validate(required(message = "Required key creator not present in payload JSON."))]
    pub creator: Option<String>,

    #[validate(required(message = "Required key tile not present in payload JSON."))]
    pub tile: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

impl RegisterRequest {
    pub fn into_service(self) -> GatewayResult<Service> {
        self.validate()?;
        let (Some(ip), Some(port), Some(name), Some(creator), Some(tile)) =
            (self.ip, self.port, self.name, self.creator, self.tile)
        else {
            return Err(validation_error!("incomplete registration payload"));
        };

        let descriptors = self
            .dependencies
            .into_iter()
            .map(DependencySpec::into_descriptor)
            .collect();

        Ok(Service::new(
            join_host_port(&ip, port),
            name,
            creator,
            tile,
            descriptors,
        ))
    }
}

/// One entry of a registration's `dependencies` list.
///
/// Older clients send full nested registrations; the extra keys are ignored
/// and the entry resolves by endpoint.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Endpoint {
        ip: String,
        #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
        port: u16,
    },
    Address {
        address: String,
    },
    Identity {
        name: String,
        creator: String,
    },
}

impl DependencySpec {
    pub fn into_descriptor(self) -> DependencyDescriptor {
        match self {
            DependencySpec::Endpoint { ip, port } => DependencyDescriptor::ByAddress {
                address: join_host_port(&ip, port),
            },
            DependencySpec::Address { address } => DependencyDescriptor::ByAddress { address },
            DependencySpec::Identity { name, creator } => {
                DependencyDescriptor::ByIdentity { name, creator }
            }
        }
    }
}

/// Body of `DELETE /microservice`.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct DeregisterRequest {
    pub address: Option<String>,
    pub ip: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub port: Option<u16>,
}

impl DeregisterRequest {
    pub fn address(&self) -> GatewayResult<String> {
        match (&self.address, &self.ip, self.port) {
            (Some(address), _, _) => Ok(address.clone()),
            (None, Some(ip), Some(port)) => Ok(join_host_port(ip, port)),
            (None, None, _) => Err(validation_error!(
                "Required key ip not present in payload JSON."
            )),
            (None, Some(_), None) => Err(validation_error!(
                "Required key port not present in payload JSON."
            )),
        }
    }
}

pub fn register_service(gateway: &Gateway, body: &[u8]) -> GatewayResult<Arc<Service>> {
    let request: RegisterRequest = serde_json::from_slice(body)?;
    let service = request.into_service()?;
    Ok(gateway.register(service))
}

pub fn deregister_service(gateway: &Gateway, body: &[u8]) -> GatewayResult<String> {
    let request: DeregisterRequest = serde_json::from_slice(body)?;
    let address = request.address()?;
    gateway.deregister(&address)?;
    Ok(address)
}

fn success() -> Response<Vec<u8>> {
    ResponseBuilder::success_http(b"Success".to_vec(), Some(content_type::TEXT_PLAIN))
}

pub struct RegisterHandler;

#[async_trait]
impl Handler for RegisterHandler {
    async fn handle(
        &self,
        gateway: &Gateway,
        http_session: &mut ServerSession,
        _params: BTreeMap<String, String>,
    ) -> GatewayResult<Response<Vec<u8>>> {
        validate_content_type(http_session)?;
        let body = read_request_body(http_session).await?;
        register_service(gateway, &body)?;
        Ok(success())
    }
}

pub struct DeregisterHandler;

#[async_trait]
impl Handler for DeregisterHandler {
    async fn handle(
        &self,
        gateway: &Gateway,
        http_session: &mut ServerSession,
        _params: BTreeMap<String, String>,
    ) -> GatewayResult<Response<Vec<u8>>> {
        let body = read_request_body(http_session).await?;
        deregister_service(gateway, &body)?;
        Ok(success())
    }
}

pub struct ListHandler;

#[async_trait]
impl Handler for ListHandler {
    async fn handle(
        &self,
        gateway: &Gateway,
        _http_session: &mut ServerSession,
        _params: BTreeMap<String, String>,
    ) -> GatewayResult<Response<Vec<u8>>> {
        Ok(ResponseBuilder::success_json(&gateway.list_services()))
    }
}
