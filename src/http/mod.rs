//! HTTP layer: request assembly, body encoding, one-exchange transactions
//! and responses.

pub mod form;
pub mod middleware;
pub mod multipart;
pub mod orderedheaders;
pub mod requestbody;
pub mod response;
pub mod streamfactory;
pub mod transaction;

// Re-exports for convenience
pub use middleware::Middleware;
pub use orderedheaders::OrderedHeaderMap;
pub use requestbody::{FilePart, FormData, FormValue, Payload};
pub use response::Response;
pub use transaction::{PreparedRequest, RawResponse};
