use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every failed request: `{"success": false, "error": {...}}`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}
