//! Wire messages exchanged with the remote-apps endpoint.
//!
//! Every frame is a JSON object with a mandatory `type` string. Apart from
//! the authentication exchange the body is opaque to this crate and kept as
//! a raw JSON map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tsr_core::{AppIdentity, ConnectionError};

/// Message type of the authentication exchange.
pub const AUTH_TYPE: &str = "auth";

/// Errors raised while decoding inbound frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame is not valid JSON.
    #[error("Frame is not valid JSON: {0}")]
    InvalidJson(String),

    /// The frame is JSON but not an object.
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// The frame has no string `type` field.
    #[error("Frame has no string `type` field")]
    MissingType,

    /// An `auth` frame without a string `payload.apiKey`.
    #[error("Malformed auth response: {0}")]
    MalformedAuth(String),
}

impl From<ProtocolError> for ConnectionError {
    fn from(err: ProtocolError) -> Self {
        ConnectionError::Protocol(err.to_string())
    }
}

/// Parses a raw text frame into any JSON value.
pub fn parse_value(text: &str) -> Result<Value, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
}

/// Parses a raw text frame into a JSON object.
pub fn parse_frame(text: &str) -> Result<Map<String, Value>, ProtocolError> {
    match parse_value(text)? {
        Value::Object(map) => Ok(map),
        _ => Err(ProtocolError::NotAnObject),
    }
}

/// Generic message envelope: a `type` plus arbitrary other fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type, e.g. `auth` or `clientMoved`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Remaining fields (`payload`, `content`, ...).
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Envelope {
    /// Creates an envelope with no body.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            body: Map::new(),
        }
    }

    /// Creates an envelope carrying a `payload` field.
    pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
        let mut envelope = Self::new(kind);
        envelope.body.insert("payload".to_string(), payload);
        envelope
    }

    /// Builds an envelope from a decoded JSON object.
    pub fn from_map(mut map: Map<String, Value>) -> Result<Self, ProtocolError> {
        match map.remove("type") {
            Some(Value::String(kind)) => Ok(Self { kind, body: map }),
            _ => Err(ProtocolError::MissingType),
        }
    }

    /// Parses a raw text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Self::from_map(parse_frame(text)?)
    }

    /// The `payload` field, if present.
    pub fn payload(&self) -> Option<&Value> {
        self.body.get("payload")
    }

    /// Returns true for the authentication message type.
    pub fn is_auth(&self) -> bool {
        self.kind == AUTH_TYPE
    }

    /// Converts the envelope back into a single JSON value.
    pub fn to_value(&self) -> Value {
        let mut map = self.body.clone();
        map.insert("type".to_string(), Value::String(self.kind.clone()));
        Value::Object(map)
    }
}

/// `content` section of the handshake request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContent {
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

/// `payload` section of the handshake request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub identifier: String,
    pub version: String,
    pub name: String,
    pub description: String,
    pub content: AuthContent,
}

/// Outbound handshake:
/// `{type:"auth", payload:{identifier, version, name, description, content:{apiKey}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: AuthPayload,
}

impl AuthRequest {
    /// Builds the handshake from the application identity and API key.
    pub fn new(identity: &AppIdentity, api_key: &str) -> Self {
        Self {
            kind: AUTH_TYPE.to_string(),
            payload: AuthPayload {
                identifier: identity.identifier.clone(),
                version: identity.version.clone(),
                name: identity.name.clone(),
                description: identity.description.clone(),
                content: AuthContent {
                    api_key: api_key.to_string(),
                },
            },
        }
    }

    /// Serializes the handshake into a text frame.
    pub fn to_frame(&self) -> Result<String, ConnectionError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponsePayload {
    #[serde(rename = "apiKey")]
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponseBody {
    payload: AuthResponsePayload,
}

/// Inbound handshake acceptance: `{type:"auth", payload:{apiKey}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    /// Key to use for future connections. May differ from the one sent.
    pub api_key: String,
}

impl AuthResponse {
    /// Interprets an `auth` envelope as a handshake acceptance.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        if !envelope.is_auth() {
            return Err(ProtocolError::MalformedAuth(format!(
                "unexpected type `{}`",
                envelope.kind
            )));
        }

        let body: AuthResponseBody = serde_json::from_value(Value::Object(envelope.body.clone()))
            .map_err(|e| ProtocolError::MalformedAuth(e.to_string()))?;

        Ok(Self {
            api_key: body.payload.api_key,
        })
    }
}
