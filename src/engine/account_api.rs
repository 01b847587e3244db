use async_trait::async_trait;

use super::Engine;
use crate::api::{AccountAPI, NewAccount, ProfileUpdate};
use crate::auth::{Role, User};
use crate::entities::{Account, Driver};
use crate::error::Error;

#[async_trait]
impl AccountAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_account(&self, params: NewAccount) -> Result<Account, Error> {
        if params.name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".into()));
        }

        if !params.email.contains('@') {
            return Err(Error::Validation("email must be a valid address".into()));
        }

        let mut account = Account::new(params.name, params.email, params.role);
        account.phone = params.phone;
        account.address = params.address;

        // a driver registration carries its profile; both documents land in
        // the same atomic unit
        let driver = match params.role {
            Role::Driver => {
                let vehicle_details = params.vehicle_details.ok_or_else(|| {
                    Error::Validation("vehicle_details is required for drivers".into())
                })?;
                let license_number = params.license_number.ok_or_else(|| {
                    Error::Validation("license_number is required for drivers".into())
                })?;

                Some(Driver::new(account.id, vehicle_details, license_number))
            }
            _ => None,
        };

        self.store
            .insert_account(&account, driver.as_ref())
            .await?;

        Ok(account)
    }

    #[tracing::instrument(skip(self))]
    async fn my_profile(&self, user: User) -> Result<Account, Error> {
        self.store
            .find_account(user.id)
            .await?
            .ok_or(Error::NotFound("account"))
    }

    #[tracing::instrument(skip(self))]
    async fn update_profile(&self, user: User, update: ProfileUpdate) -> Result<Account, Error> {
        let mut account = self
            .store
            .find_account(user.id)
            .await?
            .ok_or(Error::NotFound("account"))?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(Error::Validation("name must not be empty".into()));
            }
            account.name = name;
        }
        if let Some(phone) = update.phone {
            account.phone = Some(phone);
        }
        if let Some(address) = update.address {
            account.address = Some(address);
        }

        self.store.update_account(&account).await?;

        Ok(account)
    }
}
