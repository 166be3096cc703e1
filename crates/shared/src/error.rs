use serde::{Deserialize, Serialize};

/// Error body returned by the backend on a non-success response.
///
/// Only `message` is guaranteed; everything else the server sends is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
