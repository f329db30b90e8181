pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::{AppConfig, LoggingConfig, PostgresStorageConfig, ServerConfig, StorageBackend};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{ServerBuilder, TesseraServer, build_app};
