mod memory;
mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Role;
use crate::entities::{Account, Driver, Ride, Status};
use crate::error::Error;

/// The storage boundary. Implementations must provide point lookup,
/// conditional (compare-on-status) update, in-set queries and atomic
/// multi-document units; all lifecycle coordination leans on these
/// guarantees rather than in-process locks.
pub trait Store: RideStore + DriverStore + AccountStore + Send + Sync {}

pub type DynStore = Arc<dyn Store>;

#[async_trait]
pub trait RideStore {
    async fn insert_ride(&self, ride: &Ride) -> Result<(), Error>;

    async fn find_ride(&self, id: Uuid) -> Result<Option<Ride>, Error>;

    /// Atomic claim of a requested ride by the driver named in `claimed`.
    /// Fails with `DriverBusy` if that driver already has an active ride, and
    /// with `RideUnavailable` if the stored ride is no longer `requested` at
    /// commit time. The busy-check and the conditional write happen in one
    /// atomic unit, serialized per driver.
    async fn claim_ride(&self, claimed: &Ride) -> Result<(), Error>;

    /// Conditional commit of a lifecycle transition: writes `ride` only if
    /// the stored status still equals `expected`. Returns false when another
    /// writer got there first.
    async fn commit_transition(&self, ride: &Ride, expected: Status) -> Result<bool, Error>;

    /// Idempotent: recording the same (ride, driver) pair twice is a no-op.
    async fn add_rejection(&self, ride_id: Uuid, driver_id: Uuid) -> Result<(), Error>;

    /// Requested rides the given driver has not rejected, oldest first.
    async fn pending_rides(&self, excluding_driver: Uuid) -> Result<Vec<Ride>, Error>;

    async fn active_ride_for_driver(&self, driver_id: Uuid) -> Result<Option<Ride>, Error>;

    async fn active_ride_for_rider(&self, rider_id: Uuid) -> Result<Option<Ride>, Error>;

    async fn list_rides(
        &self,
        filter: RideFilter,
        page: Page,
    ) -> Result<(Vec<Ride>, u64), Error>;

    async fn completed_rides_for_driver(&self, driver_id: Uuid) -> Result<Vec<Ride>, Error>;

    async fn count_rides(&self, status: Option<Status>) -> Result<u64, Error>;

    async fn total_completed_fares(&self) -> Result<f64, Error>;
}

#[async_trait]
pub trait DriverStore {
    async fn insert_driver(&self, driver: &Driver) -> Result<(), Error>;

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, Error>;

    async fn update_driver(&self, driver: &Driver) -> Result<(), Error>;

    /// Drivers whose id falls in the given set, for the admin listing joined
    /// against a prior account search.
    async fn list_drivers(&self, ids: &[Uuid], page: Page) -> Result<(Vec<Driver>, u64), Error>;
}

#[async_trait]
pub trait AccountStore {
    /// Inserts the account and, for driver registrations, the driver profile
    /// in the same atomic unit. Fails with `Validation` on a duplicate email.
    async fn insert_account(&self, account: &Account, driver: Option<&Driver>)
        -> Result<(), Error>;

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, Error>;

    /// In-set lookup used to join owning accounts onto driver listings.
    async fn find_accounts(&self, ids: &[Uuid]) -> Result<Vec<Account>, Error>;

    async fn update_account(&self, account: &Account) -> Result<(), Error>;

    /// Ids of accounts matching a role and an optional name/email search
    /// term, feeding the in-set driver listing.
    async fn search_account_ids(
        &self,
        role: Option<Role>,
        search: Option<&str>,
    ) -> Result<Vec<Uuid>, Error>;

    async fn list_accounts(
        &self,
        role: Option<Role>,
        search: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Account>, u64), Error>;

    async fn count_accounts(&self, role: Option<Role>) -> Result<u64, Error>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RideFilter {
    pub rider_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub status: Option<Status>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(10).max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub meta: PageMeta,
    pub data: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: Page, total: u64) -> Self {
        let total_pages = (total + u64::from(page.limit) - 1) / u64::from(page.limit);

        Self {
            meta: PageMeta {
                page: page.page,
                limit: page.limit,
                total,
                total_pages,
            },
            data,
        }
    }
}
