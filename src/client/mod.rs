//! Named HTTP clients
//!
//! Setup happens on a [`ClientRegistry`]: each registered name gets a
//! [`ClientBuilder`] holding its base address, default headers and ordered
//! interceptors. [`ClientRegistry::build`] freezes the builders into a
//! [`ClientFactory`], from which callers obtain [`NamedClient`] handles.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use courier::client::ClientRegistry;
//! use courier::resolver::ServiceRegistry;
//! use courier::transport::HttpConfig;
//!
//! # fn main() -> courier::Result<()> {
//! let mut registry = ClientRegistry::new();
//! registry.register_clients_with(
//!     [("billing", "https://billing.example.test/api/")],
//!     |_name, _address, builder| {
//!         builder
//!             .default_header("x-caller", "checkout")?
//!             .for_each_request(|request, _cancel| {
//!                 request.url_mut().query_pairs_mut().append_pair("via", "checkout");
//!                 Ok(())
//!             });
//!         Ok(())
//!     },
//! )?;
//!
//! let factory = registry.build_with_config(Arc::new(ServiceRegistry::new()), &HttpConfig::default())?;
//! let billing = factory.client("billing")?;
//! # let _ = billing;
//! # Ok(())
//! # }
//! ```

mod builder;
mod named;
mod registry;

pub use builder::{ClientBuilder, InterceptorFactory};
pub use named::NamedClient;
pub use registry::{ClientFactory, ClientRegistry};
