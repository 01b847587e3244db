use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Rider,
    Driver,
    Admin,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rider => "rider",
            Self::Driver => "driver",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rider" => Some(Self::Rider),
            "driver" => Some(Self::Driver),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// An already-authenticated caller. Token issuance and verification happen
/// upstream; the engine only ever sees the verified subject and role.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
}

impl User {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}
