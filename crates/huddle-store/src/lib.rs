pub mod error;
pub mod tasks;

pub use error::StoreError;
pub use tasks::TaskStore;
