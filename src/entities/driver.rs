use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// A driver profile, keyed by the owning user's id (one profile per user).
/// `approval` is owned by admin; `availability` by the driver, except that
/// suspension forces it offline in the same update.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub vehicle_details: String,
    pub license_number: String,
    pub approval: Approval,
    pub availability: Availability,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approval {
    Pending,
    Approved,
    Suspended,
}

impl Approval {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Suspended => "suspended",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Online,
    Offline,
}

impl Availability {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl Driver {
    pub fn new(user_id: Uuid, vehicle_details: String, license_number: String) -> Self {
        Self {
            id: user_id,
            vehicle_details,
            license_number,
            approval: Approval::Pending,
            availability: Availability::Offline,
        }
    }

    /// Only approved, online drivers may see or accept requests.
    pub fn is_eligible(&self) -> bool {
        self.approval == Approval::Approved && self.availability == Availability::Online
    }

    #[tracing::instrument]
    pub fn set_availability(&mut self, availability: Availability) -> Result<(), Error> {
        if availability == Availability::Online && self.approval != Approval::Approved {
            return Err(Error::Forbidden(
                "your driver account must be approved before you can go online",
            ));
        }

        self.availability = availability;
        Ok(())
    }

    /// Suspension takes the driver offline in the same update, so the stored
    /// document never reads suspended-yet-online.
    #[tracing::instrument]
    pub fn set_approval(&mut self, approval: Approval) {
        if approval == Approval::Suspended {
            self.availability = Availability::Offline;
        }

        self.approval = approval;
    }
}
