use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one chat connection for its whole lifetime.
/// Formatted as `conn_<uuid v7>`.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnId(String);

impl ConnId {
    const PREFIX: &'static str = "conn";

    pub fn new() -> Self {
        Self(format!("{}_{}", Self::PREFIX, Uuid::now_v7()))
    }

    /// Wrap an existing id without validating it.
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
