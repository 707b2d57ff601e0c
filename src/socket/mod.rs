//! Socket and connection management.
//!
//! - [`pool`]: keyed pool of idle keep-alive connections with expiry
//! - [`connectjob`]: DNS → TCP → TLS connection flow
//! - [`client`]: plain/TLS socket enum
//! - [`tls`]: TLS configuration with BoringSSL

pub mod client;
pub mod connectjob;
pub mod pool;
pub mod tls;
