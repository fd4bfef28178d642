//! Named client registry
//!
//! Setup-time registry that maps logical names to client builders, and the
//! immutable [`ClientFactory`] it produces.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::builder::{ClientBuilder, parse_base_url};
use super::named::NamedClient;
use crate::config::CourierConfig;
use crate::error::{CourierError, Result};
use crate::resolver::ServiceRegistry;
use crate::transport::{HttpConfig, HttpTransport, ReqwestTransport};

/// Registry of named clients, mutable during setup only.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    builders: Vec<ClientBuilder>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client without a base address and return its builder.
    pub fn register(&mut self, name: &str) -> Result<&mut ClientBuilder> {
        self.check_name(name)?;
        self.builders.push(ClientBuilder::new(name, None));
        let index = self.builders.len() - 1;
        Ok(&mut self.builders[index])
    }

    /// Register one client per `name -> base address` entry.
    ///
    /// An empty mapping is a no-op. Every entry is validated before any client
    /// is added, so on error the registry is unchanged.
    pub fn register_clients<I, K, V>(&mut self, descriptors: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.register_clients_with(descriptors, |_, _, _| Ok(()))
    }

    /// Like [`register_clients`](Self::register_clients), then calls
    /// `on_registered(name, base_address, builder)` for each new client so the
    /// caller can attach per-client configuration. An error from the callback
    /// aborts the whole batch.
    pub fn register_clients_with<I, K, V, F>(
        &mut self,
        descriptors: I,
        mut on_registered: F,
    ) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
        F: FnMut(&str, &str, &mut ClientBuilder) -> Result<()>,
    {
        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for (name, address) in descriptors {
            let (name, address) = (name.as_ref(), address.as_ref());
            self.check_name(name)?;
            if !seen.insert(name.to_string()) {
                return Err(CourierError::invalid_argument(format!(
                    "Client '{name}' appears more than once"
                )));
            }
            let base_url = parse_base_url(address)?;
            pending.push((name.to_string(), address.to_string(), base_url));
        }

        let mut built = Vec::with_capacity(pending.len());
        for (name, address, base_url) in pending {
            let mut builder = ClientBuilder::new(name.as_str(), Some(base_url));
            on_registered(&name, &address, &mut builder)?;
            tracing::debug!(target: "courier::http", client = %name, base_url = %address, "registered client");
            built.push(builder);
        }
        self.builders.extend(built);
        Ok(self)
    }

    /// Register the `clients` table of a loaded configuration. A configuration
    /// without that table is rejected.
    pub fn register_from_config(&mut self, config: &CourierConfig) -> Result<&mut Self> {
        let clients = config.clients.as_ref().ok_or_else(|| {
            CourierError::invalid_argument("Configuration has no `clients` table")
        })?;
        self.register_clients(clients)
    }

    /// Re-open the builder of an already registered client.
    pub fn builder_mut(&mut self, name: &str) -> Option<&mut ClientBuilder> {
        self.builders.iter_mut().find(|b| b.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.iter().any(|b| b.name() == name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.builders.iter().map(ClientBuilder::name).collect()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Freeze every client. Interceptor factories run here, once each.
    pub fn build(
        &self,
        services: Arc<ServiceRegistry>,
        transport: Arc<dyn HttpTransport>,
    ) -> ClientFactory {
        let clients = self
            .builders
            .iter()
            .map(|b| (b.name().to_string(), b.build(&services, transport.clone())))
            .collect();
        ClientFactory { clients, services }
    }

    /// [`build`](Self::build) with a [`ReqwestTransport`] created from
    /// `http`.
    pub fn build_with_config(
        &self,
        services: Arc<ServiceRegistry>,
        http: &HttpConfig,
    ) -> Result<ClientFactory> {
        let transport = Arc::new(ReqwestTransport::new(http)?);
        Ok(self.build(services, transport))
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(CourierError::invalid_argument("Client name must not be empty"));
        }
        if self.contains(name) {
            return Err(CourierError::invalid_argument(format!(
                "Client '{name}' is already registered"
            )));
        }
        Ok(())
    }
}

/// Immutable set of built clients.
#[derive(Debug, Clone)]
pub struct ClientFactory {
    clients: BTreeMap<String, NamedClient>,
    services: Arc<ServiceRegistry>,
}

impl ClientFactory {
    /// Look up a client by name.
    pub fn client(&self, name: &str) -> Result<NamedClient> {
        self.clients
            .get(name)
            .cloned()
            .ok_or_else(|| CourierError::invalid_argument(format!("Unknown client '{name}'")))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.clients.keys().map(String::as_str).collect()
    }

    /// The process-wide registry the clients were built with.
    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }
}
