use crate::base::neterror::FetchError;
use crate::socket::client::SocketType;
use crate::socket::pool::GroupId;
use crate::socket::tls::TlsConfig;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;

/// Manages the connection process: DNS -> TCP -> SSL.
/// Roughly equivalent to net::ConnectJob.
pub struct ConnectJob;

impl ConnectJob {
    /// Open a fresh transport to `group`, bounded by `timeout`.
    pub async fn connect(
        group: &GroupId,
        tls: &TlsConfig,
        timeout: Duration,
    ) -> Result<SocketType, FetchError> {
        match tokio::time::timeout(timeout, Self::connect_inner(group, tls)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(group = %group, ?timeout, "connect timed out");
                Err(FetchError::ConnectionTimedOut)
            }
        }
    }

    async fn connect_inner(group: &GroupId, tls: &TlsConfig) -> Result<SocketType, FetchError> {
        // url keeps IPv6 literals bracketed; the resolver wants them bare.
        let host = group.host.trim_start_matches('[').trim_end_matches(']');
        let port = group.port;

        // 1. DNS Resolution
        let addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| FetchError::dns_failed(host, e))?;

        // 2. TCP Connect
        let mut last_err = None;
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }

        let stream = match (stream, last_err) {
            (Some(s), _) => s,
            (None, Some(e)) => return Err(tcp_error(host, port, e)),
            (None, None) => {
                return Err(FetchError::NameNotResolved {
                    domain: host.to_string(),
                    message: "no addresses".to_string(),
                })
            }
        };
        let _ = stream.set_nodelay(true);

        // 3. SSL Handshake (if https)
        if group.scheme != "https" {
            return Ok(SocketType::Tcp(stream));
        }

        let connector = tls.connector()?;
        let mut config = connector
            .configure()
            .map_err(|_| FetchError::SslProtocolError)?;
        if !TlsConfig::should_set_sni(host) {
            config.set_use_server_name_indication(false);
            config.set_verify_hostname(false);
        }

        let tls_stream = tokio_boring::connect(config, host, stream)
            .await
            .map_err(|e| {
                tracing::debug!(host = %host, error = ?e, "SSL handshake failed");
                FetchError::SslProtocolError
            })?;

        Ok(SocketType::Ssl(tls_stream))
    }
}

/// A timed-out TCP connect reads as a timeout, anything else as a failure
/// naming the endpoint.
fn tcp_error(host: &str, port: u16, err: io::Error) -> FetchError {
    match err.kind() {
        io::ErrorKind::TimedOut => FetchError::ConnectionTimedOut,
        _ => FetchError::connection_failed_to(host, port, err),
    }
}
