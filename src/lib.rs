pub mod cli;
pub mod config;
pub mod protocol;
pub mod statement;
pub mod store;

pub use cli::{Command, prompt};
pub use config::ServerConfig;
pub use statement::{Statement, StatementKind};
pub use store::{SqliteStore, StoreBackend, StoreGuard, StoreLock};
