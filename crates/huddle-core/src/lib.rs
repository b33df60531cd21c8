pub mod chat;
pub mod ids;
pub mod task;

pub use chat::ChatMessage;
pub use ids::ConnId;
pub use task::{Task, TaskPatch, TaskStatus};
