//! Typed wrappers over [`ApiClient`](crate::http::ApiClient) for the calls the
//! screens make. Domain errors come back as `ApiError::Status` untouched.

pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod profile;
pub mod vehicles;
pub mod wallet;
