//! OSC over UDP: datagram codec, address routing, and the transport that feeds a
//! [`proxima_engine::EngineHandle`] and carries visibility commands back out.
#![forbid(unsafe_code)]

pub mod codec;
mod config;
mod dispatch;
pub mod route;
mod transport;

pub use codec::{DecodeError, OscArg, OscMessage};
pub use config::OscConfig;
pub use dispatch::{TransportEvent, default_display_name};
pub use route::{Inbound, InstanceUser, RouteError, Router};
pub use transport::{ConnectionState, OscSender, OscTransport, TransportError, TransportStatus};
