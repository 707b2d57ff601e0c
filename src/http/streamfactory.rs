use crate::base::neterror::FetchError;
use crate::socket::client::SocketType;
use crate::socket::connectjob::ConnectJob;
use crate::socket::pool::{ConnectionPool, GroupId, Poolable, Pooled};
use crate::socket::tls::TlsConfig;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::spawn;

/// An HTTP/1.1 connection: hyper's request sender with its driver task
/// running in the background.
/// Equivalent to net::HttpStream.
#[derive(Debug)]
pub struct HttpStream {
    sender: http1::SendRequest<Full<Bytes>>,
    peer: Option<SocketAddr>,
}

impl HttpStream {
    /// Run the HTTP/1.1 handshake over `socket` and spawn the connection driver.
    pub async fn handshake(socket: SocketType) -> Result<Self, FetchError> {
        let peer = socket.peer_addr();
        let io = TokioIo::new(socket);
        let (sender, conn) = http1::handshake(io).await?;

        spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "connection driver ended with error");
            }
        });

        Ok(Self { sender, peer })
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub async fn send_request(
        &mut self,
        req: Request<Full<Bytes>>,
    ) -> Result<Response<Incoming>, FetchError> {
        self.sender.ready().await?;
        Ok(self.sender.send_request(req).await?)
    }
}

impl Poolable for HttpStream {
    fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Hands out HTTP streams, reusing idle pooled connections when possible.
pub struct HttpStreamFactory {
    pool: Arc<ConnectionPool<HttpStream>>,
    tls: TlsConfig,
}

impl HttpStreamFactory {
    pub fn new(pool: Arc<ConnectionPool<HttpStream>>, tls: TlsConfig) -> Self {
        Self { pool, tls }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<HttpStream>> {
        &self.pool
    }

    /// An idle stream for `group`, or a new one.
    pub async fn request_stream(
        &self,
        group: &GroupId,
        timeout: Duration,
    ) -> Result<Pooled<HttpStream>, FetchError> {
        self.pool
            .acquire(group, || self.connect(group, timeout))
            .await
    }

    /// A new stream that bypasses the idle queue.
    pub async fn fresh_stream(
        &self,
        group: &GroupId,
        timeout: Duration,
    ) -> Result<Pooled<HttpStream>, FetchError> {
        let conn = self.connect(group, timeout).await?;
        tracing::debug!(group = %group, "new connection");
        Ok(Pooled {
            conn,
            reused: false,
        })
    }

    /// Give a finished stream back to the pool for `ttl`.
    pub fn release(&self, group: &GroupId, stream: HttpStream, ttl: Duration) -> bool {
        self.pool.release(group, stream, ttl)
    }

    async fn connect(&self, group: &GroupId, timeout: Duration) -> Result<HttpStream, FetchError> {
        let socket = ConnectJob::connect(group, &self.tls, timeout).await?;
        HttpStream::handshake(socket).await
    }
}
