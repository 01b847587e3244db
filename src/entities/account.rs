use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;

/// A registered person: rider, driver or admin. Credentials live in the
/// upstream identity service; this document carries only profile data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub blocked: bool,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: String, email: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            role,
            blocked: false,
            phone: None,
            address: None,
            created_at: Utc::now(),
        }
    }
}
