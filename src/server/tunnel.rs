//! Public tunnel client for the localtunnel protocol.
//!
//! The tunnel server hands out a public URL and a TCP port; every socket we
//! open to that port carries one proxied HTTP connection to the local server.

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("tunnel request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid tunnel host '{0}'")]
    InvalidHost(String),
    #[error("tunnel server refused '{subdomain}': {message}")]
    Refused { subdomain: String, message: String },
}

/// Tunnel assignment returned by the tunnel server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TunnelInfo {
    pub id: String,
    pub port: u16,
    #[serde(default = "default_connections")]
    pub max_conn_count: usize,
    pub url: String,
}

fn default_connections() -> usize {
    1
}

/// Ask `host` for a tunnel named `subdomain`.
pub async fn request(host: &str, subdomain: &str) -> Result<TunnelInfo, TunnelError> {
    let endpoint = format!("{}/{}", host.trim_end_matches('/'), subdomain);
    let response = reqwest::get(&endpoint).await?;
    if !response.status().is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(TunnelError::Refused { subdomain: subdomain.to_string(), message });
    }
    Ok(response.json().await?)
}

/// Hostname of the tunnel server, where the proxy sockets connect.
pub fn remote_host(host: &str) -> Result<String, TunnelError> {
    reqwest::Url::parse(host)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .ok_or_else(|| TunnelError::InvalidHost(host.to_string()))
}

/// Open the tunnel and proxy connections to `local` until the task is
/// dropped.
pub async fn open(host: &str, subdomain: &str, local: SocketAddr) -> Result<(), TunnelError> {
    let remote = remote_host(host)?;
    let info = request(host, subdomain).await?;
    println!("Tunnel: {}", info.url);
    if !info.url.starts_with(&format!("https://{}.", subdomain)) {
        tracing::warn!("tunnel subdomain '{}' unavailable, got {}", subdomain, info.url);
    }

    let workers = (0..info.max_conn_count.max(1)).map(|_| proxy_forever(remote.clone(), info.port, local));
    futures::future::join_all(workers).await;
    Ok(())
}

async fn proxy_forever(remote_host: String, remote_port: u16, local: SocketAddr) {
    loop {
        if let Err(e) = proxy_once(&remote_host, remote_port, local).await {
            tracing::debug!("tunnel connection closed: {}", e);
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }
}

async fn proxy_once(remote_host: &str, remote_port: u16, local: SocketAddr) -> std::io::Result<()> {
    let mut remote = TcpStream::connect((remote_host, remote_port)).await?;
    let mut local = TcpStream::connect(local).await?;
    let (up, down) = tokio::io::copy_bidirectional(&mut remote, &mut local).await?;
    tracing::trace!("tunnel connection done ({} B in, {} B out)", up, down);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        let info: TunnelInfo = serde_json::from_str(
            r#"{"id":"venom","port":41234,"max_conn_count":10,"url":"https://venom.loca.lt"}"#,
        )
        .unwrap();
        assert_eq!(info.port, 41234);
        assert_eq!(info.max_conn_count, 10);
        assert_eq!(info.url, "https://venom.loca.lt");
    }

    #[test]
    fn test_missing_connection_count_defaults_to_one() {
        let info: TunnelInfo = serde_json::from_str(r#"{"id":"a","port":1,"url":"https://a.loca.lt"}"#).unwrap();
        assert_eq!(info.max_conn_count, 1);
    }

    #[test]
    fn test_remote_host() {
        assert_eq!(remote_host("https://localtunnel.me").unwrap(), "localtunnel.me");
        assert_eq!(remote_host("http://tunnel.local:8080/").unwrap(), "tunnel.local");
        assert!(matches!(remote_host("not a url"), Err(TunnelError::InvalidHost(_))));
    }
}
