use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{Role, User};
use crate::entities::{Account, Approval, Availability, Coordinates, Driver, Ride, Status};
use crate::error::Error;
use crate::store::{Page, Paginated};

#[async_trait]
pub trait RideAPI {
    async fn create_ride(
        &self,
        user: User,
        pickup: Coordinates,
        destination: Coordinates,
        fare: f64,
    ) -> Result<Ride, Error>;

    async fn find_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    async fn accept_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    async fn reject_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    async fn advance_ride(&self, user: User, id: Uuid, to: Status) -> Result<Ride, Error>;

    async fn pending_requests(&self, user: User) -> Result<Vec<Ride>, Error>;

    async fn active_ride_for_rider(&self, user: User) -> Result<Option<Ride>, Error>;

    async fn active_ride_for_driver(&self, user: User) -> Result<Option<Ride>, Error>;

    async fn rider_history(
        &self,
        user: User,
        status: Option<Status>,
        page: Page,
    ) -> Result<Paginated<Ride>, Error>;

    async fn driver_history(
        &self,
        user: User,
        status: Option<Status>,
        page: Page,
    ) -> Result<Paginated<Ride>, Error>;
}

#[async_trait]
pub trait DriverAPI {
    async fn set_availability(
        &self,
        user: User,
        availability: Availability,
    ) -> Result<Driver, Error>;

    async fn driver_earnings(&self, user: User) -> Result<Earnings, Error>;
}

#[async_trait]
pub trait AccountAPI {
    async fn create_account(&self, params: NewAccount) -> Result<Account, Error>;

    async fn my_profile(&self, user: User) -> Result<Account, Error>;

    async fn update_profile(&self, user: User, update: ProfileUpdate) -> Result<Account, Error>;
}

#[async_trait]
pub trait AdminAPI {
    async fn list_accounts(
        &self,
        user: User,
        role: Option<Role>,
        search: Option<String>,
        page: Page,
    ) -> Result<Paginated<Account>, Error>;

    async fn list_drivers(
        &self,
        user: User,
        search: Option<String>,
        page: Page,
    ) -> Result<Paginated<DriverProfile>, Error>;

    async fn list_rides(
        &self,
        user: User,
        status: Option<Status>,
        page: Page,
    ) -> Result<Paginated<Ride>, Error>;

    async fn analytics(&self, user: User) -> Result<Analytics, Error>;

    async fn set_driver_approval(
        &self,
        user: User,
        driver_id: Uuid,
        approval: Approval,
    ) -> Result<Driver, Error>;

    async fn set_account_block(
        &self,
        user: User,
        account_id: Uuid,
        blocked: bool,
    ) -> Result<Account, Error>;
}

pub trait API: RideAPI + DriverAPI + AccountAPI + AdminAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;

#[derive(Clone, Debug, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub vehicle_details: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Admin view of a driver with the owning account joined on the read path.
#[derive(Debug, Serialize)]
pub struct DriverProfile {
    pub driver: Driver,
    pub account: Account,
}

#[derive(Debug, Serialize)]
pub struct Earnings {
    pub total_earnings: f64,
    pub completed_rides: u64,
    pub monthly: Vec<MonthlyEarnings>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct MonthlyEarnings {
    pub year: i32,
    pub month: u32,
    pub total_earnings: f64,
    pub total_rides: u64,
}

#[derive(Debug, Serialize)]
pub struct Analytics {
    pub total_riders: u64,
    pub total_drivers: u64,
    pub total_rides: u64,
    pub total_revenue: f64,
}
