//! Connection string parsing.
//!
//! Resolves the host and port a gateway talks to from a connection string of
//! the form `scheme:protocol://host[:port]/database?...`.

use crate::error::{GatewayError, Result};
use url::Url;

/// Port used when the connection string does not name one.
pub const DEFAULT_PORT: u16 = 5432;

/// Driver-scheme prefix carried by JDBC-style connection strings.
const DRIVER_SCHEME_PREFIX: &str = "jdbc:";

/// Host and port resolved from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseAddress {
    host: String,
    port: u16,
}

impl DatabaseAddress {
    /// Parses the host and port out of a connection string.
    ///
    /// A leading `jdbc:` prefix is stripped first. A missing port resolves to
    /// [`DEFAULT_PORT`].
    pub fn parse(connection_string: &str) -> Result<Self> {
        let bare = bare_connection_string(connection_string);

        let url = Url::parse(bare).map_err(|e| {
            GatewayError::init(format!(
                "Unable to parse connection string '{}': {e}",
                redact(bare)
            ))
        })?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                GatewayError::init(format!(
                    "Connection string '{}' does not name a host",
                    redact(bare)
                ))
            })?
            .to_string();

        let port = url.port().unwrap_or(DEFAULT_PORT);

        Ok(Self { host, port })
    }

    /// Returns the resolved host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the resolved port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Strips the driver-scheme prefix, leaving a URI the driver understands.
pub fn bare_connection_string(connection_string: &str) -> &str {
    let trimmed = connection_string.trim();
    trimmed
        .strip_prefix(DRIVER_SCHEME_PREFIX)
        .unwrap_or(trimmed)
}

/// Masks the password component so connection strings can be logged.
pub fn redact(connection_string: &str) -> String {
    match Url::parse(connection_string) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        Ok(url) => url.to_string(),
        Err(_) => connection_string.to_string(),
    }
}
