pub mod config;
pub mod errors;
pub mod session;
pub mod telemetry;

pub use config::AppConfig;
pub use errors::{AppError, AppResult, ErrorCode, StoreError};
pub use session::{AuthProvider, Session, StaticAuth};
