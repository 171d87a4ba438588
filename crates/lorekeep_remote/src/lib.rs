//! # Lorekeep Remote
//!
//! Authenticated RPC gateway to the remote tabular backend.
//!
//! This crate provides:
//! - The [`Gateway`] trait: full scans, point fetches and batched
//!   create/update/delete across collections in one round trip
//! - [`RpcGateway`], which speaks the JSON wire format of
//!   `lorekeep_protocol` over any [`HttpClient`]
//! - [`ReqwestClient`] for real networks and [`LoopbackClient`] for
//!   in-process servers
//! - The [`AuthProvider`] seam through which credentials are obtained
//!
//! ## Failure Policy
//!
//! - An auth failure (401/403) triggers exactly one credential refresh and
//!   one retry of the same call; a second failure is
//!   [`RemoteError::AuthRequired`]
//! - Any other non-success status is [`RemoteError::Transport`]
//! - An unparseable body is [`RemoteError::MalformedResponse`]
//! - Nothing else is retried

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod error;
mod gateway;
mod http;

pub use auth::{AuthProvider, StaticCredential};
pub use config::GatewayConfig;
pub use error::{RemoteError, RemoteResult};
pub use gateway::{Gateway, RpcGateway};
pub use http::{HttpClient, HttpRequest, HttpResponse, LoopbackClient, LoopbackServer, ReqwestClient};
