//! Tenant model - the root of data isolation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer organization. All data is strictly partitioned by tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant identifier
    pub id: Uuid,

    /// Unique machine name
    pub name: String,

    /// Human-readable display name
    pub display_name: String,

    /// Free-form tenant settings
    pub settings: serde_json::Value,

    /// Is this tenant active
    pub is_active: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Create a new active tenant.
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            display_name: display_name.into(),
            settings: serde_json::Value::Object(serde_json::Map::new()),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
