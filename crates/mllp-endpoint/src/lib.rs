//! MLLP client and server endpoints.
//!
//! This is the "just works" layer. Point [`MllpClient`] at a listener and
//! call [`MllpClient::send`]; start an [`MllpServer`] with a message handler
//! and every accepted connection gets its own worker thread that decodes
//! frames, invokes the handler, and writes acknowledgements back.
//!
//! Endpoints are configured through [`EndpointConfig`], constructed directly
//! or parsed from a `host:port?option=value` connection string.

pub mod ack;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod registry;
pub mod server;

mod worker;

pub use ack::{AckGenerator, AckStatus, Hl7AckGenerator};
pub use client::MllpClient;
pub use config::{Charset, ConfigError, EndpointConfig};
pub use error::{EndpointError, Result};
pub use handler::{HandlerError, MessageHandler};
pub use registry::{ConnectionGuard, ConnectionRegistry};
pub use server::{MllpServer, ServerHandle};
