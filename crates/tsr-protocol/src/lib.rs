//! tsremote protocol - wire messages for the remote-apps WebSocket API
//!
//! This crate provides the message envelope, the authentication handshake
//! messages and the names of the events a connection publishes.

pub mod events;
pub mod message;

pub use events::synthesized_event_name;
pub use message::{
    parse_frame, parse_value, AuthContent, AuthPayload, AuthRequest, AuthResponse, Envelope,
    ProtocolError, AUTH_TYPE,
};
