//! Optional public-address lookup for interaction records.

use async_trait::async_trait;
use serde::Deserialize;

/// Resolves the caller's public IP address. `None` means "unknown".
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Look up the address; never fails.
    async fn client_ip(&self) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct IpifyResponse {
    ip: String,
}

/// Resolver backed by an ipify-compatible endpoint returning `{"ip": "..."}`.
#[derive(Debug, Clone)]
pub struct IpifyResolver {
    client: reqwest::Client,
    url: String,
}

impl IpifyResolver {
    /// Resolver for `url` sharing `client`.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn fetch(&self) -> Result<String, reqwest::Error> {
        let body: IpifyResponse = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.ip)
    }
}

#[async_trait]
impl IpResolver for IpifyResolver {
    async fn client_ip(&self) -> Option<String> {
        match self.fetch().await {
            Ok(ip) => Some(ip),
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "client ip lookup failed");
                None
            }
        }
    }
}

/// Resolver that always answers with a fixed value.
#[derive(Debug, Clone, Default)]
pub struct FixedIp(pub Option<String>);

#[async_trait]
impl IpResolver for FixedIp {
    async fn client_ip(&self) -> Option<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_yields_none() {
        let resolver = IpifyResolver::new(reqwest::Client::new(), "http://127.0.0.1:9/ip");
        assert_eq!(resolver.client_ip().await, None);
    }

    #[tokio::test]
    async fn fixed_resolver_echoes_value() {
        let resolver = FixedIp(Some("203.0.113.7".to_string()));
        assert_eq!(resolver.client_ip().await.as_deref(), Some("203.0.113.7"));
        assert_eq!(FixedIp::default().client_ip().await, None);
    }
}
