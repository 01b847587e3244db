use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Datelike;

use super::Engine;
use crate::api::{DriverAPI, Earnings, MonthlyEarnings};
use crate::auth::{Role, User};
use crate::entities::{Availability, Driver};
use crate::error::Error;

#[async_trait]
impl DriverAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn set_availability(
        &self,
        user: User,
        availability: Availability,
    ) -> Result<Driver, Error> {
        self.authorize(&user, &[Role::Driver])?;

        let mut driver = self
            .store
            .find_driver(user.id)
            .await?
            .ok_or(Error::NotFound("driver profile"))?;

        driver.set_availability(availability)?;
        self.store.update_driver(&driver).await?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn driver_earnings(&self, user: User) -> Result<Earnings, Error> {
        self.authorize(&user, &[Role::Driver])?;

        self.store
            .find_driver(user.id)
            .await?
            .ok_or(Error::NotFound("driver profile"))?;

        let rides = self.store.completed_rides_for_driver(user.id).await?;

        let mut by_month: BTreeMap<(i32, u32), (f64, u64)> = BTreeMap::new();
        for ride in &rides {
            let key = (ride.created_at.year(), ride.created_at.month());
            let entry = by_month.entry(key).or_insert((0.0, 0));
            entry.0 += ride.fare;
            entry.1 += 1;
        }

        let monthly = by_month
            .into_iter()
            .map(|((year, month), (total_earnings, total_rides))| MonthlyEarnings {
                year,
                month,
                total_earnings,
                total_rides,
            })
            .collect();

        Ok(Earnings {
            total_earnings: rides.iter().map(|r| r.fare).sum(),
            completed_rides: rides.len() as u64,
            monthly,
        })
    }
}
