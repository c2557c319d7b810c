//! Connection handling.
//!
//! A connection owns the shared service handles plus the driver
//! configuration, and mints statements. Each statement starts from a copy
//! of the connection-level default session properties; nothing a statement
//! does mutates the connection.

use std::sync::Arc;

use tracing::info;

use crate::config::DriverConfig;
use crate::error::Result;
use crate::service::{HttpJobClient, Services};
use crate::session::SessionProperties;
use crate::statement::Statement;

/// A live connection to a job service.
pub struct Connection {
    services: Services,
    config: DriverConfig,
    defaults: SessionProperties,
}

impl Connection {
    /// Builds a connection from pre-constructed service handles. Used
    /// directly in tests; production callers go through [`connect`].
    pub fn new(services: Services, config: DriverConfig) -> Self {
        let defaults = SessionProperties::from_defaults(&config.properties);
        Self {
            services,
            config,
            defaults,
        }
    }

    /// Creates a forward-only statement.
    pub fn create_statement(&self) -> Statement {
        Statement::new(
            self.services.clone(),
            &self.config,
            self.defaults.clone(),
            false,
        )
    }

    /// Creates a statement with a recorded scrollability preference. The
    /// cursors it produces are forward-only either way.
    pub fn create_scrollable_statement(&self) -> Statement {
        Statement::new(
            self.services.clone(),
            &self.config,
            self.defaults.clone(),
            true,
        )
    }

    /// The configuration this connection was opened with.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// The connection-level default session properties.
    pub fn default_properties(&self) -> &SessionProperties {
        &self.defaults
    }
}

/// Opens a connection against the configured endpoint.
///
/// One HTTP client instance serves as the job, catalog and transfer handle.
pub fn connect(config: DriverConfig) -> Result<Connection> {
    let client = Arc::new(HttpJobClient::new(&config.endpoint)?);
    info!("connected to job service at {}", config.endpoint);

    let services = Services::new(client.clone(), client.clone(), client);
    Ok(Connection::new(services, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{MockCatalogService, MockJobService, MockTransferService};
    use pretty_assertions::assert_eq;

    fn mock_connection() -> Connection {
        let mut config = DriverConfig::from_endpoint("http://localhost:1").unwrap();
        config
            .properties
            .insert("engine.sql.mode".to_string(), "strict".to_string());

        let services = Services::new(
            Arc::new(MockJobService::new()),
            Arc::new(MockCatalogService::new(Vec::new())),
            Arc::new(MockTransferService::new(Vec::new())),
        );
        Connection::new(services, config)
    }

    #[test]
    fn test_statement_inherits_connection_defaults() {
        let connection = mock_connection();
        let statement = connection.create_statement();
        assert_eq!(
            statement.session_properties().get("engine.sql.mode"),
            Some("strict")
        );
    }

    #[tokio::test]
    async fn test_statement_property_changes_stay_local() {
        let connection = mock_connection();

        let mut statement = connection.create_statement();
        statement.execute("SET engine.sql.mode = lax").await.unwrap();
        assert_eq!(
            statement.session_properties().get("engine.sql.mode"),
            Some("lax")
        );

        // A fresh statement still sees the connection defaults.
        let fresh = connection.create_statement();
        assert_eq!(
            fresh.session_properties().get("engine.sql.mode"),
            Some("strict")
        );
    }

    #[test]
    fn test_scrollability_preference_recorded() {
        let connection = mock_connection();
        assert!(!connection.create_statement().is_scrollable());
        assert!(connection.create_scrollable_statement().is_scrollable());
    }

    #[test]
    fn test_connect_builds_connection() {
        let config = DriverConfig::from_endpoint("http://localhost:8080").unwrap();
        let connection = connect(config).unwrap();
        assert_eq!(connection.config().endpoint, "http://localhost:8080");
    }
}
