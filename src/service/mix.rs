//! MIX endpoints: aggregate every registered service for one coordinate.

use std::collections::BTreeMap;

use async_trait::async_trait;
use http::Response;
use pingora::protocols::http::ServerSession;

use crate::{
    core::{Coordinate, Gateway, GatewayResult},
    service::http::Handler,
    utils::{
        request::{decode_path_segment, get_form_value, read_request_body},
        response::ResponseBuilder,
    },
    validation_error,
};

const LOCATION: &str = "location";

/// Coordinate from a `location=<lat>,<lon>` form body.
pub fn coordinate_from_form(body: &[u8]) -> GatewayResult<Coordinate> {
    get_form_value(body, LOCATION)
        .ok_or_else(|| validation_error!("Required form field {} not present.", LOCATION))?
        .parse()
}

/// Coordinate from the `{location}` path parameter.
pub fn coordinate_from_params(params: &BTreeMap<String, String>) -> GatewayResult<Coordinate> {
    let raw = params
        .get(LOCATION)
        .ok_or_else(|| validation_error!("Missing {} path parameter", LOCATION))?;
    decode_path_segment(raw)?.parse()
}

async fn mix_response(gateway: &Gateway, coordinate: Coordinate) -> Response<Vec<u8>> {
    ResponseBuilder::success_json(&gateway.mix(coordinate).await)
}

/// `POST /MIX`
pub struct MixFormHandler;

#[async_trait]
impl Handler for MixFormHandler {
    async fn handle(
        &self,
        gateway: &Gateway,
        http_session: &mut ServerSession,
        _params: BTreeMap<String, String>,
    ) -> GatewayResult<Response<Vec<u8>>> {
        let body = read_request_body(http_session).await?;
        let coordinate = coordinate_from_form(&body)?;
        Ok(mix_response(gateway, coordinate).await)
    }
}

/// `GET /MIX/{location}`
pub struct MixPathHandler;

#[async_trait]
impl Handler for MixPathHandler {
    async fn handle(
        &self,
        gateway: &Gateway,
        _http_session: &mut ServerSession,
        params: BTreeMap<String, String>,
    ) -> GatewayResult<Response<Vec<u8>>> {
        let coordinate = coordinate_from_params(&params)?;
        Ok(mix_response(gateway, coordinate).await)
    }
}
