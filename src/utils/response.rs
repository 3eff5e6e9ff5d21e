//! Response builders shared by the gateway and status listeners.

use http::{header, HeaderValue, Response, StatusCode};
use serde::Serialize;

use crate::core::error::GatewayError;

/// Standard content types
pub mod content_type {
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const APPLICATION_JSON: &str = "application/json";
}

/// Builds `Response<Vec<u8>>` values for `ServeHttp` apps.
pub struct ResponseBuilder;

impl ResponseBuilder {
    pub fn with_status(
        status: StatusCode,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Response<Vec<u8>> {
        let mut builder = Response::builder()
            .status(status)
            .header(header::CONTENT_LENGTH, body.len());

        if let Some(ct) = content_type {
            match HeaderValue::from_str(ct) {
                Ok(header_value) => {
                    builder = builder.header(header::CONTENT_TYPE, header_value);
                }
                Err(e) => {
                    log::error!("Invalid content type '{ct}': {e}");
                }
            }
        }

        builder.body(body).unwrap_or_else(|e| {
            log::error!("Failed to build response: {e}");
            Self::error_http(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        })
    }

    pub fn success_http(body: Vec<u8>, content_type: Option<&str>) -> Response<Vec<u8>> {
        Self::with_status(StatusCode::OK, body, content_type)
    }

    pub fn error_http(status: StatusCode, message: &str) -> Response<Vec<u8>> {
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type::TEXT_PLAIN)
            .header(header::CONTENT_LENGTH, message.len())
            .body(message.as_bytes().to_vec())
            .unwrap_or_else(|e| {
                log::error!("Failed to build error response: {e}");
                let mut fallback = Response::new(b"Internal Server Error".to_vec());
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }

    pub fn json_with_status<T: Serialize>(status: StatusCode, data: &T) -> Response<Vec<u8>> {
        match serde_json::to_vec(data) {
            Ok(json_body) => {
                Self::with_status(status, json_body, Some(content_type::APPLICATION_JSON))
            }
            Err(e) => {
                log::error!("Failed to serialize JSON response: {e}");
                Self::error_http(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "JSON serialization failed",
                )
            }
        }
    }

    pub fn success_json<T: Serialize>(data: &T) -> Response<Vec<u8>> {
        Self::json_with_status(StatusCode::OK, data)
    }

    /// Maps a handler error onto its client-facing status.
    pub fn from_error(err: &GatewayError) -> Response<Vec<u8>> {
        let status = err.status();
        if status.is_server_error() {
            log::error!("Request failed: {err}");
            Self::error_http(status, "Internal Server Error")
        } else {
            log::debug!("Request rejected: {err}");
            Self::error_http(status, &err.to_string())
        }
    }
}

/// Common error response helpers
pub struct CommonErrors;

impl CommonErrors {
    pub fn not_found() -> Response<Vec<u8>> {
        ResponseBuilder::error_http(StatusCode::NOT_FOUND, "Not Found")
    }

    pub fn method_not_allowed() -> Response<Vec<u8>> {
        ResponseBuilder::error_http(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    }
}
