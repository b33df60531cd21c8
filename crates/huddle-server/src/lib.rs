pub mod config;
pub mod error;
pub mod relay;
pub mod server;
pub mod tasks;

pub use config::ServerConfig;
pub use relay::{Relay, RelayConfig};
pub use server::{build_router, start, AppState, ServerHandle};
