//! # Courier - named HTTP clients with before-send interceptors
//!
//! Courier is a thin layer over `reqwest` for services that talk to several
//! HTTP backends.
//!
#![deny(unsafe_code)]

//! ## Features
//!
//! - **Named clients**: register `name -> base address` pairs once at startup
//!   and look clients up by name afterwards.
//! - **Before-send callbacks**: attach synchronous callbacks that edit every
//!   outgoing request of a client, optionally with access to a request-scoped
//!   [`ResolutionContext`](resolver::ResolutionContext).
//! - **JSON bodies**: POST/PUT/PATCH a `Serialize` value and read a
//!   `DeserializeOwned` value back.
//! - **Cancellation**: one `CancellationToken` covers the interceptor chain,
//!   the send and the body read.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use courier::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut registry = ClientRegistry::new();
//!     registry.register_clients_with(
//!         [("inventory", "https://inventory.example.test/api/")],
//!         |_name, _address, builder| {
//!             builder.with_logging().for_each_request(|request, _cancel| {
//!                 request
//!                     .headers_mut()
//!                     .insert("x-caller", HeaderValue::from_static("checkout"));
//!                 Ok(())
//!             });
//!             Ok(())
//!         },
//!     )?;
//!
//!     let factory = registry.build_with_config(
//!         Arc::new(ServiceRegistry::new()),
//!         &HttpConfig::default(),
//!     )?;
//!     let inventory = factory.client("inventory")?;
//!
//!     let cancel = CancellationToken::new();
//!     let response = inventory
//!         .post_json("reservations", &json!({"sku": "A-1", "qty": 2}), None, &cancel)
//!         .await?;
//!     let reservation: serde_json::Value = response.json(&cancel).await?;
//!     println!("{reservation}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod json;
pub mod resolver;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use client::{ClientBuilder, ClientFactory, ClientRegistry, NamedClient};
pub use error::{CourierError, ErrorCategory, Result};

/// Common imports
pub mod prelude {
    pub use crate::client::{ClientBuilder, ClientFactory, ClientRegistry, NamedClient};
    pub use crate::config::{ConfigLoader, CourierConfig};
    pub use crate::error::{CourierError, ErrorCategory, Result};
    pub use crate::interceptor::{Interceptor, LoggingInterceptor, Next};
    pub use crate::json::{JsonOptions, KeyCase, read_json_body};
    pub use crate::resolver::{
        RequestScope, ResolutionContext, ScopeAccessor, ServiceRegistry, TaskScopeAccessor,
    };
    pub use crate::transport::{HttpConfig, HttpTransport, ReqwestTransport};
    pub use crate::types::{HttpRequest, HttpResponse, JsonMethod};
    pub use reqwest::header::HeaderValue;
    pub use tokio_util::sync::CancellationToken;
}
