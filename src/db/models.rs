// Data models
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: i64,
    /// Canonical (escaped) catalog URL.
    pub href: String,
    pub date_added: i64,
}
