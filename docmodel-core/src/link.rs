//! Named connection configurations and session management.
//!
//! A [`LinkConfig`] holds named connections, one of which may be marked as the default.
//! A [`Linker`] resolves a connection by name (or the default when no name is given),
//! opens a backend session through a [`Connector`] on first use and reuses it afterwards.
//!
//! The configuration is read from JSON:
//!
//! ```json
//! {
//!     "connections": {
//!         "main": { "spec": "mongodb://localhost:27017", "db_name": "app", "default": true },
//!         "audit": { "spec": "mongodb://audit:27017", "db_name": "audit" }
//!     }
//! }
//! ```

use mea::mutex::Mutex;
use serde::{Deserialize, Serialize};
use std::{collections::{BTreeMap, HashMap}, path::Path, sync::Arc};
use tracing::{debug, warn};

use crate::{
    backend::Connector,
    error::{DocumentStoreError, DocumentStoreResult},
    model::{Model, ModelBuilder},
    scheme::Scheme,
};

/// One named connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Connection string understood by the connector.
    pub spec: String,
    /// Database the session is bound to.
    pub db_name: String,
    /// Whether this connection is used when no name is given.
    #[serde(default)]
    pub default: bool,
}

/// The set of named connections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default)]
    pub connections: BTreeMap<String, Link>,
}

impl LinkConfig {
    /// Parses a configuration from JSON text.
    pub fn from_json(text: &str) -> DocumentStoreResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| DocumentStoreError::Configuration(e.to_string()))
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> DocumentStoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DocumentStoreError::Configuration(format!("{}: {e}", path.display())))?;

        Self::from_json(&text)
    }

    /// Returns the name of the connection marked as default.
    ///
    /// Fails unless exactly one connection carries the default marker.
    pub fn default_name(&self) -> DocumentStoreResult<&str> {
        let mut defaults = self
            .connections
            .iter()
            .filter(|(_, link)| link.default)
            .map(|(name, _)| name.as_str());

        match (defaults.next(), defaults.next()) {
            (Some(name), None) => Ok(name),
            (None, _) => Err(DocumentStoreError::Connection("no default connection configured".into())),
            (Some(first), Some(second)) => Err(DocumentStoreError::Connection(format!(
                "more than one default connection configured ({first}, {second})"
            ))),
        }
    }

    /// Resolves a connection by name, or the default connection when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> DocumentStoreResult<(&str, &Link)> {
        if self.connections.is_empty() {
            warn!("no connections are configured");
        }

        let name = match name {
            Some(name) => name,
            None => self.default_name()?,
        };

        self.connections
            .get_key_value(name)
            .map(|(name, link)| (name.as_str(), link))
            .ok_or_else(|| DocumentStoreError::Connection(format!("connection {name} not found")))
    }
}

/// Resolves named connections into backend sessions, opening each one at most once.
pub struct Linker<C: Connector> {
    config: LinkConfig,
    connector: C,
    sessions: Mutex<HashMap<String, Arc<C::Backend>>>,
}

impl<C: Connector> Linker<C> {
    /// Creates a linker over the given configuration.
    pub fn new(config: LinkConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration this linker resolves against.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Returns the session for a connection, connecting on first use.
    ///
    /// `None` selects the default connection.
    pub async fn get(&self, name: Option<&str>) -> DocumentStoreResult<Arc<C::Backend>> {
        let (name, link) = self.config.resolve(name)?;
        let mut sessions = self.sessions.lock().await;

        if let Some(session) = sessions.get(name) {
            return Ok(session.clone());
        }

        let session = Arc::new(
            self.connector
                .connect(link)
                .await
                .map_err(|e| {
                    warn!(connection = name, error = %e, "unable to connect");
                    e
                })?,
        );
        debug!(connection = name, db = %link.db_name, "connected");
        sessions.insert(name.to_string(), session.clone());

        Ok(session)
    }

    /// Returns a model for scheme `S` on the given connection.
    pub async fn model<S: Scheme>(&self, name: Option<&str>) -> DocumentStoreResult<Model<S, Arc<C::Backend>>> {
        Ok(ModelBuilder::new(self.get(name).await?).build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "connections": {
            "main": { "spec": "mem://main", "db_name": "app", "default": true },
            "audit": { "spec": "mem://audit", "db_name": "audit" }
        }
    }"#;

    #[test]
    fn resolves_default_connection() {
        let config = LinkConfig::from_json(CONFIG).unwrap();
        let (name, link) = config.resolve(None).unwrap();

        assert_eq!(name, "main");
        assert_eq!(link.db_name, "app");
        assert!(link.default);
    }

    #[test]
    fn resolves_named_connection() {
        let config = LinkConfig::from_json(CONFIG).unwrap();
        let (name, link) = config.resolve(Some("audit")).unwrap();

        assert_eq!(name, "audit");
        assert!(!link.default);
    }

    #[test]
    fn unknown_name_is_a_connection_error() {
        let config = LinkConfig::from_json(CONFIG).unwrap();

        assert!(matches!(config.resolve(Some("missing")), Err(DocumentStoreError::Connection(_))));
    }

    #[test]
    fn missing_default_is_a_connection_error() {
        let config = LinkConfig::from_json(
            r#"{ "connections": { "a": { "spec": "x", "db_name": "a" } } }"#,
        )
        .unwrap();

        assert!(matches!(config.resolve(None), Err(DocumentStoreError::Connection(_))));
    }

    #[test]
    fn two_defaults_are_a_connection_error() {
        let config = LinkConfig::from_json(
            r#"{ "connections": {
                "a": { "spec": "x", "db_name": "a", "default": true },
                "b": { "spec": "y", "db_name": "b", "default": true }
            } }"#,
        )
        .unwrap();

        assert!(matches!(config.default_name(), Err(DocumentStoreError::Connection(_))));
    }

    #[test]
    fn empty_configuration_has_no_default() {
        let config = LinkConfig::from_json("{}").unwrap();

        assert!(config.connections.is_empty());
        assert!(config.resolve(None).is_err());
    }

    #[test]
    fn malformed_configuration_is_rejected() {
        assert!(matches!(
            LinkConfig::from_json(r#"{ "connections": 3 }"#),
            Err(DocumentStoreError::Configuration(_))
        ));
    }
}
