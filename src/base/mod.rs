//! Base types and error handling.
//!
//! - [`FetchError`](neterror::FetchError): every error a fetch can surface
//! - [`LoadState`](loadstate::LoadState): states of a logical fetch
//! - [`expand_home`](filepath::expand_home): `~` expansion for on-disk paths

pub mod filepath;
pub mod loadstate;
pub mod neterror;
