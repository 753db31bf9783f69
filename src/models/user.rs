use serde::{Deserialize, Serialize};

/// Minimal identity projection consumed by the core. Account management,
/// roles, and authentication live with the surrounding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub full_name: String,
}
