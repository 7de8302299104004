//! Document-management-system integration.
//!
//! Three layers, each behind its own seam:
//!
//! 1. [`client`] — the raw HTTP surface ([`client::DmsApi`]): token exchange
//!    and multipart document upload, nothing else
//! 2. [`auth`]   — token lifecycle: lazy fetch, caching, invalidation on 401
//! 3. [`upload`] — one-document upload policy: metadata normalisation, the
//!    single re-authentication retry, and the never-throws contract
//!
//! [`bulk`] drives the layers: it walks the record store, skips documents
//! already uploaded, and throttles between consecutive upload attempts.

pub mod auth;
pub mod bulk;
pub mod client;
pub mod upload;
