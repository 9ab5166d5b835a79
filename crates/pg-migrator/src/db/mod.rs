//! Short-lived PostgreSQL sessions.
//!
//! Connections are never pooled: every stage opens the sessions it needs and
//! drops them when it returns, on success and error paths alike.

mod tls;

pub use tls::{CertVerification, TlsBuilder};

use crate::config::connection;
use crate::error::{MigrateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::config::SslMode;
use tokio_postgres::Client;
use tracing::debug;

/// Which endpoint a session or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Target => write!(f, "target"),
        }
    }
}

/// Options applied to every session.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    /// Bound on connection establishment.
    pub timeout: Duration,
    /// Verify server certificates when TLS is negotiated.
    pub verify_tls: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            verify_tls: false,
        }
    }
}

/// An open connection to one side.
///
/// Dropping the session drops the client, which closes the connection and
/// lets the background connection task finish.
pub struct PgSession {
    client: Client,
    side: Side,
    _connection: JoinHandle<()>,
}

impl PgSession {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn side(&self) -> Side {
        self.side
    }
}

/// Open a session to `url` within `options.timeout`.
pub async fn connect(url: &str, side: Side, options: &ConnectOptions) -> Result<PgSession> {
    let mut pg_config = connection::parse(url).map_err(|e| {
        MigrateError::Config(format!("{} connection string is invalid: {}", side, e))
    })?;
    pg_config.connect_timeout(options.timeout);

    let verification = CertVerification::from_flag(options.verify_tls);
    if pg_config.get_ssl_mode() == SslMode::Require {
        tls::warn_if_unverified(verification, &side.to_string());
    }
    let tls = TlsBuilder::new(verification).build()?;

    let (client, connection) = tokio::time::timeout(options.timeout, pg_config.connect(tls))
        .await
        .map_err(|_| {
            MigrateError::connectivity(
                side,
                format!(
                    "timed out after {}s connecting to {}",
                    options.timeout.as_secs(),
                    connection::redact_password(url)
                ),
            )
        })?
        .map_err(|e| MigrateError::connectivity(side, format!("unable to connect: {}", e)))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!("{} connection closed with error: {}", side, e);
        }
    });

    debug!("Opened {} session", side);

    Ok(PgSession {
        client,
        side,
        _connection: handle,
    })
}
