//! Decoding of upstream response bodies.
//!
//! Successful calls wrap their payload in a `response` member:
//!
//! ```text
//! friend/list  {"response": [123, "456", ...]}
//! profile/get  {"response": {"id": 123, "friendCount": 87, ...}}
//! ```
//!
//! Failures carry `{"error": {"code": "...", "message": "..."}}`. The servlet
//! container in front of the API answers unknown paths with an HTML page, so
//! error classification also falls back to scanning the raw body.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::client::transport::TransportError;
use crate::types::{FriendSet, UserId};

const CODE_INVALID_TOKEN: &str = "invalid_authorization.INVALID-TOKEN";
const CODE_OVER_LIMIT: &str = "forbidden.APP_OVER_INVOCATION_LIMIT";
const CODE_USER_NOT_EXIST: &str = "invalid_request.USER_NOT_EXIST";
const CODE_NO_RIGHT: &str = "forbidden.NO_RIGHT";
const MARKER_UNKNOWN_INTERFACE: &str = "The requested resource () is not available";

/// A response body that does not match the documented schema.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Body is not valid JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The expected member is missing.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A value has the wrong type or is out of range.
    #[error("invalid value for `{field}`: {value}")]
    InvalidValue {
        /// Member holding the bad value.
        field: &'static str,
        /// Offending value, rendered as JSON.
        value: String,
    },
}

#[derive(Deserialize)]
struct Envelope {
    response: Option<Value>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

/// Extracts the friend IDs from a `friend/list` body.
///
/// An empty list is returned as-is; telling "no friends" apart from a missing
/// user is up to the caller.
pub fn parse_friend_list(body: &str) -> Result<FriendSet, ParseError> {
    let envelope: Envelope = serde_json::from_str(body)?;
    let payload = envelope
        .response
        .ok_or(ParseError::MissingField("response"))?;
    let items = match payload {
        Value::Array(items) => items,
        other => return Err(invalid("response", &other)),
    };
    items.iter().map(user_id_from_value).collect()
}

/// Extracts the friend count from a `profile/get` body.
pub fn parse_degree(body: &str) -> Result<u64, ParseError> {
    let envelope: Envelope = serde_json::from_str(body)?;
    let payload = envelope
        .response
        .ok_or(ParseError::MissingField("response"))?;
    let count = payload
        .get("friendCount")
        .ok_or(ParseError::MissingField("friendCount"))?;
    match count {
        Value::Number(n) => n.as_u64().ok_or_else(|| invalid("friendCount", count)),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid("friendCount", count)),
        _ => Err(invalid("friendCount", count)),
    }
}

/// Whether a body carries an error envelope instead of a payload.
///
/// Some gateways answer with a success status and an error body.
pub fn is_error_body(body: &str) -> bool {
    serde_json::from_str::<ErrorEnvelope>(body).is_ok()
}

/// Maps a failed response onto the transport error taxonomy.
///
/// `status` is the HTTP status when one was received.
pub fn classify_error(status: Option<u16>, body: &str) -> TransportError {
    let code = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error);
    let classified = match code.as_ref().map(|e| e.code.as_str()) {
        Some(CODE_INVALID_TOKEN) => Some(TransportError::InvalidCredential),
        Some(CODE_OVER_LIMIT) => Some(TransportError::RateLimitExceeded),
        Some(CODE_USER_NOT_EXIST) | Some(CODE_NO_RIGHT) => Some(TransportError::ResourceNotFound),
        _ => None,
    };
    if let Some(err) = classified {
        return err;
    }
    if body.contains(CODE_INVALID_TOKEN) {
        TransportError::InvalidCredential
    } else if body.contains(CODE_OVER_LIMIT) {
        TransportError::RateLimitExceeded
    } else if body.contains(MARKER_UNKNOWN_INTERFACE) {
        TransportError::UnknownInterface
    } else if body.contains(CODE_USER_NOT_EXIST) || body.contains(CODE_NO_RIGHT) {
        TransportError::ResourceNotFound
    } else if matches!(status, Some(s) if s >= 500) {
        TransportError::Transient(format!("server returned {}", status.unwrap_or_default()))
    } else {
        let detail = match code {
            Some(ErrorBody { code, message }) => match message {
                Some(message) => format!("{code}: {message}"),
                None => code,
            },
            None => body.trim().chars().take(200).collect(),
        };
        TransportError::Upstream(detail)
    }
}

fn user_id_from_value(value: &Value) -> Result<UserId, ParseError> {
    match value {
        Value::Number(n) => n.as_u64().map(UserId).ok_or_else(|| invalid("response", value)),
        Value::String(s) => s.parse::<UserId>().map_err(|_| invalid("response", value)),
        _ => Err(invalid("response", value)),
    }
}

fn invalid(field: &'static str, value: &Value) -> ParseError {
    ParseError::InvalidValue {
        field,
        value: value.to_string(),
    }
}
