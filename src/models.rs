use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Envelope for successful JSON responses.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
