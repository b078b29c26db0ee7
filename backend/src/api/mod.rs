//! REST API modules.

pub mod error;
pub mod follows;
pub mod health;
pub mod posts;
pub mod response;
pub mod timeline;

pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
