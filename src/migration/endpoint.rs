// ABOUTME: Verified connection to one side of a copy run
// ABOUTME: Normalizes the descriptor, connects, and proves liveness by listing tables

use crate::config::EndpointConfig;
use crate::drivers::{self, Dialect, Driver};
use crate::error::CopyError;
use anyhow::Result;

/// A live database connection whose table listing has succeeded.
pub struct Endpoint {
    descriptor: EndpointConfig,
    driver: Box<dyn Driver>,
    tables: Vec<String>,
}

impl Endpoint {
    /// Connect to `descriptor` and confirm the database answers.
    ///
    /// Any failure, including the liveness probe, is reported as
    /// [`CopyError::Connection`] with the password masked. No retries.
    pub async fn connect(descriptor: EndpointConfig) -> Result<Self> {
        let descriptor = descriptor.normalized();
        let shown = descriptor.to_string();

        let mut driver = drivers::connect(&descriptor)
            .await
            .map_err(|e| CopyError::connection(&shown, e))?;
        let tables = driver
            .list_tables()
            .await
            .map_err(|e| CopyError::connection(&shown, e))?;

        tracing::info!("✓ Connected to {} ({} tables)", shown, tables.len());

        Ok(Self {
            descriptor,
            driver,
            tables,
        })
    }

    pub fn descriptor(&self) -> &EndpointConfig {
        &self.descriptor
    }

    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    /// Tables seen when the connection was verified.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn driver(&mut self) -> &mut dyn Driver {
        self.driver.as_mut()
    }

    /// Re-read the table list, e.g. after the schema phase created tables.
    pub async fn refresh_tables(&mut self) -> Result<&[String]> {
        self.tables = self.driver.list_tables().await?;
        Ok(&self.tables)
    }
}
