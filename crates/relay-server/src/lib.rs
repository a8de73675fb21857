//! WebSocket endpoint lifecycle.
//!
//! Each endpoint binds one port and serves at most one client at a time:
//! an accept loop upgrades raw TCP connections, then hands the socket to
//! a per-port actor that owns it for the connection's lifetime. Inbound
//! text frames are dispatched through `relay-commands`; outbound pushes
//! arrive over the endpoint's command channel. An [`EndpointRegistry`]
//! manages endpoints across ports.

#![deny(unsafe_code)]

mod acceptor;
mod config;
mod connection;
mod endpoint;
mod error;
mod registry;
mod upgrade;

pub use config::ServerConfig;
pub use endpoint::ListenEndpoint;
pub use error::ServerError;
pub use registry::EndpointRegistry;
