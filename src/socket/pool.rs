//! Keyed pool of idle keep-alive connections.
//!
//! Each [`GroupId`] owns an independent FIFO of idle connections guarded by
//! its own lock. The pool is unbounded per group: nothing caps how many idle
//! connections a host may accumulate. A production deployment would add a
//! per-group limit; here idle entries only leave through expiry, peer close,
//! or reuse.

use crate::base::neterror::FetchError;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Upper bound applied to a release ttl so `Instant` arithmetic cannot overflow.
const MAX_IDLE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Identifies a connection group (scheme, host, port).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupId {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl GroupId {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into().to_ascii_lowercase(),
            port,
        }
    }

    pub fn from_url(url: &Url) -> Option<Self> {
        Some(GroupId::new(
            url.scheme(),
            url.host_str()?,
            url.port_or_known_default()?,
        ))
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// A transport that can sit idle in the pool.
pub trait Poolable: Send + 'static {
    /// False once the peer (or our side) has closed the connection.
    fn is_open(&self) -> bool;
}

/// Idle connection with its expiry deadline.
struct IdleConnection<T> {
    conn: T,
    expires_at: Instant,
}

type HostQueue<T> = Arc<Mutex<VecDeque<IdleConnection<T>>>>;

/// A connection handed out by [`ConnectionPool::acquire`].
///
/// The holder owns the connection exclusively until it is given back with
/// [`ConnectionPool::release`] or dropped.
#[derive(Debug)]
pub struct Pooled<T> {
    pub conn: T,
    /// True when the connection came from the idle queue.
    pub reused: bool,
}

/// Per-group pool of idle keep-alive connections.
pub struct ConnectionPool<T> {
    groups: DashMap<GroupId, HostQueue<T>>,
}

impl<T> fmt::Debug for ConnectionPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl<T: Poolable> Default for ConnectionPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> ConnectionPool<T> {
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
        }
    }

    /// Clone the group's queue handle; the map shard lock is released on return.
    fn queue(&self, group: &GroupId) -> Option<HostQueue<T>> {
        self.groups.get(group).map(|q| Arc::clone(q.value()))
    }

    fn queue_or_insert(&self, group: &GroupId) -> HostQueue<T> {
        if let Some(queue) = self.queue(group) {
            return queue;
        }
        Arc::clone(self.groups.entry(group.clone()).or_default().value())
    }

    /// Pop the oldest live idle connection for `group`.
    ///
    /// Entries past their deadline or closed by the peer are dropped on the
    /// way; they are never handed out.
    pub fn checkout(&self, group: &GroupId) -> Option<T> {
        let queue = self.queue(group)?;
        let mut idle = queue.lock();
        let now = Instant::now();

        while let Some(entry) = idle.pop_front() {
            if entry.expires_at < now {
                tracing::debug!(group = %group, "discarding expired connection");
                continue;
            }
            if !entry.conn.is_open() {
                tracing::debug!(group = %group, "discarding connection closed by peer");
                continue;
            }
            tracing::debug!(group = %group, remaining = idle.len(), "reused connection");
            return Some(entry.conn);
        }
        None
    }

    /// Hand out an idle connection for `group`, or open one with `connect`.
    pub async fn acquire<F, Fut>(&self, group: &GroupId, connect: F) -> Result<Pooled<T>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        if let Some(conn) = self.checkout(group) {
            return Ok(Pooled { conn, reused: true });
        }

        let conn = connect().await?;
        tracing::debug!(group = %group, "new connection");
        Ok(Pooled {
            conn,
            reused: false,
        })
    }

    /// Return a connection to the idle queue with `expires_at = now + ttl`.
    ///
    /// Connections the peer already closed are destroyed instead. Returns
    /// whether the connection was queued.
    pub fn release(&self, group: &GroupId, conn: T, ttl: Duration) -> bool {
        if !conn.is_open() {
            tracing::debug!(group = %group, "dropping closed connection");
            return false;
        }

        let expires_at = Instant::now() + ttl.min(MAX_IDLE_TTL);
        self.queue_or_insert(group)
            .lock()
            .push_back(IdleConnection { conn, expires_at });
        tracing::debug!(group = %group, ?ttl, "cached connection");
        true
    }

    /// Number of idle connections queued for `group` (expired ones included
    /// until the next checkout or sweep).
    pub fn idle_count(&self, group: &GroupId) -> usize {
        self.queue(group).map(|q| q.lock().len()).unwrap_or(0)
    }

    /// Total idle connections across all groups.
    pub fn idle_socket_count(&self) -> usize {
        let queues: Vec<HostQueue<T>> = self.groups.iter().map(|e| Arc::clone(e.value())).collect();
        queues.iter().map(|q| q.lock().len()).sum()
    }

    /// Drop every expired or closed idle connection and forget empty groups.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let queues: Vec<(GroupId, HostQueue<T>)> = self
            .groups
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        for (group, queue) in queues {
            let mut idle = queue.lock();
            let before = idle.len();
            idle.retain(|entry| entry.expires_at >= now && entry.conn.is_open());
            if before != idle.len() {
                tracing::debug!(group = %group, removed = before - idle.len(), "swept idle connections");
            }
            let empty = idle.is_empty();
            drop(idle);
            if empty {
                self.groups
                    .remove_if(&group, |_, q| Arc::ptr_eq(q, &queue) && q.lock().is_empty());
            }
        }
    }

    /// Drop all idle connections.
    pub fn clear(&self) {
        self.groups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeConn {
        id: usize,
        open: Arc<AtomicBool>,
    }

    impl FakeConn {
        fn new(id: usize) -> Self {
            Self {
                id,
                open: Arc::new(AtomicBool::new(true)),
            }
        }
    }

    impl Poolable for FakeConn {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }
    }

    fn group() -> GroupId {
        GroupId::new("http", "example.test", 80)
    }

    #[test]
    fn test_group_id_from_url() {
        let url = Url::parse("https://Example.COM/path").unwrap();
        let gid = GroupId::from_url(&url).unwrap();
        assert_eq!(gid, GroupId::new("https", "example.com", 443));
        assert_eq!(gid.to_string(), "https://example.com:443");
    }

    #[test]
    fn test_checkout_empty() {
        let pool: ConnectionPool<FakeConn> = ConnectionPool::new();
        assert!(pool.checkout(&group()).is_none());
    }

    #[test]
    fn test_release_then_checkout_fifo() {
        let pool = ConnectionPool::new();
        let ttl = Duration::from_secs(60);
        assert!(pool.release(&group(), FakeConn::new(1), ttl));
        assert!(pool.release(&group(), FakeConn::new(2), ttl));
        assert_eq!(pool.idle_count(&group()), 2);

        assert_eq!(pool.checkout(&group()).unwrap().id, 1);
        assert_eq!(pool.checkout(&group()).unwrap().id, 2);
        assert!(pool.checkout(&group()).is_none());
    }

    #[test]
    fn test_expired_connection_discarded() {
        let pool = ConnectionPool::new();
        pool.release(&group(), FakeConn::new(1), Duration::from_millis(10));
        pool.release(&group(), FakeConn::new(2), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(30));

        // id 1 expired and is skipped; id 2 is still valid.
        assert_eq!(pool.checkout(&group()).unwrap().id, 2);
        assert_eq!(pool.idle_count(&group()), 0);
    }

    #[test]
    fn test_closed_connection_not_cached() {
        let pool = ConnectionPool::new();
        let conn = FakeConn::new(1);
        conn.open.store(false, Ordering::SeqCst);
        assert!(!pool.release(&group(), conn, Duration::from_secs(60)));
        assert_eq!(pool.idle_count(&group()), 0);
    }

    #[test]
    fn test_closed_while_idle_discarded() {
        let pool = ConnectionPool::new();
        let conn = FakeConn::new(1);
        let flag = Arc::clone(&conn.open);
        pool.release(&group(), conn, Duration::from_secs(60));
        flag.store(false, Ordering::SeqCst);
        assert!(pool.checkout(&group()).is_none());
    }

    #[test]
    fn test_groups_are_independent() {
        let pool = ConnectionPool::new();
        let other = GroupId::new("http", "other.test", 80);
        pool.release(&group(), FakeConn::new(1), Duration::from_secs(60));
        assert!(pool.checkout(&other).is_none());
        assert_eq!(pool.checkout(&group()).unwrap().id, 1);
    }

    #[test]
    fn test_cleanup_expired() {
        let pool = ConnectionPool::new();
        pool.release(&group(), FakeConn::new(1), Duration::from_millis(5));
        pool.release(
            &GroupId::new("http", "b.test", 80),
            FakeConn::new(2),
            Duration::from_secs(60),
        );
        std::thread::sleep(Duration::from_millis(20));
        pool.cleanup_expired();
        assert_eq!(pool.idle_socket_count(), 1);
        assert_eq!(pool.idle_count(&group()), 0);
    }

    #[tokio::test]
    async fn test_acquire_prefers_idle() {
        let pool = ConnectionPool::new();
        pool.release(&group(), FakeConn::new(7), Duration::from_secs(60));

        let pooled = pool
            .acquire(&group(), || async { Ok(FakeConn::new(99)) })
            .await
            .unwrap();
        assert!(pooled.reused);
        assert_eq!(pooled.conn.id, 7);

        let pooled = pool
            .acquire(&group(), || async { Ok(FakeConn::new(99)) })
            .await
            .unwrap();
        assert!(!pooled.reused);
        assert_eq!(pooled.conn.id, 99);
    }

    #[tokio::test]
    async fn test_acquire_propagates_connect_error() {
        let pool: ConnectionPool<FakeConn> = ConnectionPool::new();
        let err = pool
            .acquire(&group(), || async { Err(FetchError::ConnectionTimedOut) })
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::ConnectionTimedOut);
    }

    #[test]
    fn test_concurrent_checkout_is_exclusive() {
        let pool = Arc::new(ConnectionPool::new());
        for id in 0..8 {
            pool.release(&group(), FakeConn::new(id), Duration::from_secs(60));
        }

        let in_use = Arc::new(Mutex::new(HashSet::new()));
        let violations = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let in_use = Arc::clone(&in_use);
                let violations = Arc::clone(&violations);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        if let Some(conn) = pool.checkout(&group()) {
                            if !in_use.lock().insert(conn.id) {
                                violations.fetch_add(1, Ordering::SeqCst);
                            }
                            std::thread::yield_now();
                            in_use.lock().remove(&conn.id);
                            pool.release(&group(), conn, Duration::from_secs(60));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(violations.load(Ordering::SeqCst), 0);
        assert_eq!(pool.idle_count(&group()), 8);
    }
}
