//! Database connection pool management

use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    Error as SqlxError,
};

use crate::{
    config::{Config, DatabaseConfig},
    connection::set_db,
    error::{sanitize_url, DatabaseError, DatabaseOperation, Result},
};

/// Create a MySQL connection pool from configuration
///
/// Makes a single attempt. With `lazy_init` set the pool is returned without
/// opening a connection and the URL is only validated.
pub async fn connect(config: &DatabaseConfig) -> Result<MySqlPool> {
    let options = pool_options(config);

    let pool = if config.lazy_init {
        options.connect_lazy(&config.url)
    } else {
        options.connect(&config.url).await
    }
    .map_err(|e| connect_error(config, e))?;

    tracing::info!(
        url = %sanitize_url(&config.url),
        max = config.max_connections,
        min = config.min_connections,
        lazy = config.lazy_init,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Connect using the loaded configuration and install the pool as the default
/// connection
pub async fn init(config: &Config) -> Result<()> {
    let pool = connect(&config.database).await?;
    set_db(pool)
}

fn pool_options(config: &DatabaseConfig) -> MySqlPoolOptions {
    MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(config.connection_timeout())
}

fn connect_error(config: &DatabaseConfig, err: SqlxError) -> crate::error::Error {
    let url_safe = sanitize_url(&config.url);
    tracing::error!(url = %url_safe, error = %err, "Failed to connect to database");

    DatabaseError::from(err)
        .with_operation(DatabaseOperation::Connect)
        .add_context(url_safe)
        .into()
}
