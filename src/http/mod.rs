//! Authenticated request pipeline.
//!
//! Outbound, every non-public request gets the stored access token as a bearer
//! header. Inbound, a first 401 runs (or waits for) a single refresh cycle and the
//! request is re-issued once with the new token. Unrecoverable auth failures
//! clear credentials and send the screen layer back to login.

mod client;
mod coordinator;
mod error;
mod request;
mod routes;

#[cfg(test)]
mod tests;

pub use client::ApiClient;
pub use error::{ApiError, RefreshError};
pub use request::ApiRequest;
pub use routes::{is_public_route, LOGIN_ROUTE, PUBLIC_ROUTES, REFRESH_ROUTE};
