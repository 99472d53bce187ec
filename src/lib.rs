pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;

pub use config::AppConfig;
pub use db::DbPool;
pub use error::{ApiError, ApiResult};
