//! Host validation for the configuration entry.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("host is empty")]
    Empty,
    #[error("host does not resolve: {host}: {source}")]
    Unresolvable {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("host resolved to no addresses: {0}")]
    NoAddresses(String),
    #[error("not a bare host name: {0:?}")]
    Malformed(String),
}

/// Checks that a configured host can be reached by name.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<(), HostError>;
}

/// Resolves hosts through the system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

#[async_trait]
impl HostResolver for DnsResolver {
    async fn resolve(&self, host: &str) -> Result<(), HostError> {
        let name = hostname(host)?;

        // Port is irrelevant for the lookup itself.
        let mut addrs = tokio::net::lookup_host((name, 0))
            .await
            .map_err(|source| HostError::Unresolvable {
                host: name.to_string(),
                source,
            })?;

        match addrs.next() {
            Some(addr) => {
                tracing::debug!(host = name, addr = %addr.ip(), "host resolved");
                Ok(())
            }
            None => Err(HostError::NoAddresses(name.to_string())),
        }
    }
}

/// Host name without its scheme and trailing slashes.
///
/// Anything [`EntryData::base_url`](crate::EntryData::base_url) could not use
/// verbatim is rejected: whitespace, a path, a port, a query or user info.
pub fn hostname(host: &str) -> Result<&str, HostError> {
    let name = host
        .strip_prefix("http://")
        .or_else(|| host.strip_prefix("https://"))
        .unwrap_or(host)
        .trim_end_matches('/');

    if name.is_empty() {
        return Err(HostError::Empty);
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | ':' | '?' | '#' | '@'))
    {
        return Err(HostError::Malformed(host.to_string()));
    }
    Ok(name)
}
