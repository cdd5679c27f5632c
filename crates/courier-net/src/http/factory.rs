//! Client factories.

use std::collections::HashMap;
use std::sync::Arc;

use courier_core::logging::targets;
use parking_lot::RwLock;

use super::client::{HttpClient, HttpClientBuilder};
use super::handler::HttpHandler;
use crate::error::Result;

/// Provides the transport clients request builders send through.
pub trait HttpClientFactory: Send + Sync {
    /// Create the default client.
    fn create_client(&self) -> HttpClient;

    /// Create a client from a named configuration.
    fn create_named_client(&self, name: &str) -> HttpClient;
}

/// A factory handing out clones of one pooled default client, plus clients
/// registered under a name.
///
/// Clones of a client share the underlying connection pool, so creating a
/// client per request is cheap.
pub struct DefaultClientFactory {
    default: HttpClient,
    named: RwLock<HashMap<String, HttpClient>>,
}

impl DefaultClientFactory {
    /// Create a factory with a reqwest-backed default client.
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(HttpClientBuilder::new().build()?))
    }

    /// Create a factory whose default client is `client`.
    pub fn with_client(client: HttpClient) -> Self {
        Self {
            default: client,
            named: RwLock::new(HashMap::new()),
        }
    }

    /// Create a factory whose default client sends through `handler`.
    pub fn with_handler(handler: Arc<dyn HttpHandler>) -> Self {
        Self::with_client(HttpClient::new(handler))
    }

    /// Build a client from `builder` and register it under `name`.
    pub fn register(&self, name: impl Into<String>, builder: HttpClientBuilder) -> Result<()> {
        self.register_client(name, builder.build()?);
        Ok(())
    }

    /// Register an existing client under `name`, replacing any previous one.
    pub fn register_client(&self, name: impl Into<String>, client: HttpClient) {
        self.named.write().insert(name.into(), client);
    }
}

impl HttpClientFactory for DefaultClientFactory {
    fn create_client(&self) -> HttpClient {
        self.default.clone()
    }

    fn create_named_client(&self, name: &str) -> HttpClient {
        match self.named.read().get(name) {
            Some(client) => client.clone(),
            None => {
                tracing::warn!(
                    target: targets::CLIENT,
                    name,
                    "no client registered under this name, using the default client"
                );
                self.default.clone()
            }
        }
    }
}

impl std::fmt::Debug for DefaultClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultClientFactory")
            .field("default", &self.default)
            .field("named", &self.named.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
