pub mod http;

pub use http::{get_health, get_status, router, ApiError, AppState, ErrorResponse, HealthResponse, StatusServer};
