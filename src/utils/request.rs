use http::header;
use pingora::protocols::http::ServerSession;

use crate::core::error::{GatewayError, GatewayResult};
use crate::validation_error;

/// Reads the full request body into memory.
pub async fn read_request_body(http_session: &mut ServerSession) -> GatewayResult<Vec<u8>> {
    let mut body_data = Vec::new();
    while let Some(bytes) = http_session.read_request_body().await? {
        body_data.extend_from_slice(&bytes);
    }
    Ok(body_data)
}

/// Retrieves the value of a specific header from the request.
///
/// Returns `None` if the header is not present or its value is not valid UTF-8.
pub fn get_req_header_value<'a>(http_session: &'a ServerSession, key: &str) -> Option<&'a str> {
    http_session
        .get_header(key)
        .and_then(|value| value.to_str().ok())
}

/// Rejects requests whose `Content-Type` is not JSON. Parameters such as
/// `; charset=utf-8` are ignored.
pub fn validate_content_type(http_session: &ServerSession) -> GatewayResult<()> {
    match get_req_header_value(http_session, header::CONTENT_TYPE.as_str()) {
        Some(content_type) if is_json_content_type(content_type) => Ok(()),
        _ => Err(validation_error!("Content-Type must be application/json")),
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Extracts the first value of `name` from an `application/x-www-form-urlencoded` body.
pub fn get_form_value(body: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Percent-decodes a single path segment. A literal `+` stays a plus sign.
pub fn decode_path_segment(segment: &str) -> GatewayResult<String> {
    if segment.is_empty() {
        return Err(GatewayError::Validation("empty path segment".to_string()));
    }
    let escaped = format!("v={}", segment.replace('+', "%2B"));
    url::form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| validation_error!("invalid path segment: {segment}"))
}
