pub mod auth;

pub use auth::{claims_from_request, AuthMiddleware};
