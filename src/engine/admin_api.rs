use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use super::Engine;
use crate::api::{AdminAPI, Analytics, DriverProfile};
use crate::auth::{Role, User};
use crate::entities::{Account, Approval, Driver, Ride, Status};
use crate::error::Error;
use crate::store::{Page, Paginated, RideFilter};

#[async_trait]
impl AdminAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn list_accounts(
        &self,
        user: User,
        role: Option<Role>,
        search: Option<String>,
        page: Page,
    ) -> Result<Paginated<Account>, Error> {
        self.authorize(&user, &[Role::Admin])?;

        let (accounts, total) = self
            .store
            .list_accounts(role, search.as_deref(), page)
            .await?;

        Ok(Paginated::new(accounts, page, total))
    }

    #[tracing::instrument(skip(self))]
    async fn list_drivers(
        &self,
        user: User,
        search: Option<String>,
        page: Page,
    ) -> Result<Paginated<DriverProfile>, Error> {
        self.authorize(&user, &[Role::Admin])?;

        // search runs against accounts, then narrows drivers by in-set query
        let ids = self
            .store
            .search_account_ids(Some(Role::Driver), search.as_deref())
            .await?;
        let (drivers, total) = self.store.list_drivers(&ids, page).await?;

        let owner_ids: Vec<Uuid> = drivers.iter().map(|d| d.id).collect();
        let mut accounts: HashMap<Uuid, Account> = self
            .store
            .find_accounts(&owner_ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let profiles = drivers
            .into_iter()
            .map(|driver| {
                let account = accounts
                    .remove(&driver.id)
                    .ok_or_else(|| Error::Internal("driver without an owning account".into()))?;
                Ok(DriverProfile { driver, account })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Paginated::new(profiles, page, total))
    }

    #[tracing::instrument(skip(self))]
    async fn list_rides(
        &self,
        user: User,
        status: Option<Status>,
        page: Page,
    ) -> Result<Paginated<Ride>, Error> {
        self.authorize(&user, &[Role::Admin])?;

        let filter = RideFilter {
            status,
            ..Default::default()
        };
        let (rides, total) = self.store.list_rides(filter, page).await?;

        Ok(Paginated::new(rides, page, total))
    }

    #[tracing::instrument(skip(self))]
    async fn analytics(&self, user: User) -> Result<Analytics, Error> {
        self.authorize(&user, &[Role::Admin])?;

        Ok(Analytics {
            total_riders: self.store.count_accounts(Some(Role::Rider)).await?,
            total_drivers: self.store.count_accounts(Some(Role::Driver)).await?,
            total_rides: self.store.count_rides(None).await?,
            total_revenue: self.store.total_completed_fares().await?,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn set_driver_approval(
        &self,
        user: User,
        driver_id: Uuid,
        approval: Approval,
    ) -> Result<Driver, Error> {
        self.authorize(&user, &[Role::Admin])?;

        let mut driver = self
            .store
            .find_driver(driver_id)
            .await?
            .ok_or(Error::NotFound("driver profile"))?;

        driver.set_approval(approval);
        self.store.update_driver(&driver).await?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn set_account_block(
        &self,
        user: User,
        account_id: Uuid,
        blocked: bool,
    ) -> Result<Account, Error> {
        self.authorize(&user, &[Role::Admin])?;

        let mut account = self
            .store
            .find_account(account_id)
            .await?
            .ok_or(Error::NotFound("account"))?;

        account.blocked = blocked;
        self.store.update_account(&account).await?;

        Ok(account)
    }
}
