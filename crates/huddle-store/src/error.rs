#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(u64),
}
