//! # Lorekeep Server
//!
//! Reference tabular backend for Lorekeep's RPC gateway.
//!
//! This crate provides:
//! - Named tables of schema-free records, with server-assigned numeric ids
//!   and row positions on create
//! - The `Metadata` table, whose stamp for a collection changes on every
//!   successful mutation
//! - Authentication (HMAC-SHA256 bearer tokens with expiry and revocation)
//! - Request counting and fault injection for tests
//!
//! # Architecture
//!
//! The server runs in-process and implements
//! [`LoopbackServer`](lorekeep_remote::LoopbackServer), so an
//! [`RpcGateway`](lorekeep_remote::RpcGateway) over a
//! [`LoopbackClient`](lorekeep_remote::LoopbackClient) exercises the full
//! wire path without a socket.
//!
//! # Authentication
//!
//! Authentication is optional:
//!
//! ```rust
//! use lorekeep_server::{ServerConfig, TableServer};
//!
//! let config = ServerConfig::default().with_auth(b"my-secure-secret".to_vec());
//! let server = TableServer::new(config).unwrap();
//! let token = server.issue_token([1u8; 16]).unwrap();
//!
//! // Simulates every session expiring at once.
//! server.revoke_all();
//! # let _ = token;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod server;
mod tables;

pub use auth::{AuthConfig, TokenValidator};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::RequestHandler;
pub use server::TableServer;
pub use tables::Tables;
