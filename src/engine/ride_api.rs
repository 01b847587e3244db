use async_trait::async_trait;
use uuid::Uuid;

use super::Engine;
use crate::api::RideAPI;
use crate::auth::{Role, User};
use crate::entities::{Coordinates, Driver, Ride, Status};
use crate::error::Error;
use crate::store::{Page, Paginated, RideFilter};

/// Conditional commits retry on conflict. The status set only moves toward a
/// terminal state, so a handful of attempts always settles the call.
const COMMIT_ATTEMPTS: usize = 4;

#[async_trait]
impl RideAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_ride(
        &self,
        user: User,
        pickup: Coordinates,
        destination: Coordinates,
        fare: f64,
    ) -> Result<Ride, Error> {
        self.authorize(&user, &[Role::Rider])?;

        if !fare.is_finite() || fare <= 0.0 {
            return Err(Error::Validation("fare must be a positive number".into()));
        }

        if !pickup.is_valid() || !destination.is_valid() {
            return Err(Error::Validation(
                "pickup and destination must be valid coordinates".into(),
            ));
        }

        let ride = Ride::new(user.id, pickup, destination, fare);
        self.store.insert_ride(&ride).await?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let ride = self
            .store
            .find_ride(id)
            .await?
            .ok_or(Error::NotFound("ride"))?;

        let involved = ride.rider_id == user.id || ride.driver_id == Some(user.id);
        if !involved && user.role != Role::Admin {
            return Err(Error::Forbidden("you are not a party to this ride"));
        }

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        self.authorize(&user, &[Role::Rider])?;

        for _ in 0..COMMIT_ATTEMPTS {
            let mut ride = self
                .store
                .find_ride(id)
                .await?
                .ok_or(Error::NotFound("ride"))?;

            if ride.rider_id != user.id {
                return Err(Error::Forbidden(
                    "only the requesting rider may cancel this ride",
                ));
            }

            let expected = ride.status;
            ride.cancel()?;

            if self.store.commit_transition(&ride, expected).await? {
                return Ok(ride);
            }

            tracing::warn!(ride_id = %id, "ride changed while cancelling, retrying");
        }

        Err(Error::Internal("could not settle ride cancellation".into()))
    }

    #[tracing::instrument(skip(self))]
    async fn accept_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        self.authorize(&user, &[Role::Driver])?;

        let driver = self.eligible_driver(&user).await?;

        let mut ride = self
            .store
            .find_ride(id)
            .await?
            .ok_or(Error::NotFound("ride"))?;

        ride.assign_driver(driver.id)?;

        // single-winner claim: the busy-check and the conditional write run
        // as one atomic unit in the store
        self.store.claim_ride(&ride).await?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn reject_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        self.authorize(&user, &[Role::Driver])?;

        self.store
            .find_driver(user.id)
            .await?
            .ok_or(Error::NotFound("driver profile"))?;

        let ride = self
            .store
            .find_ride(id)
            .await?
            .ok_or(Error::NotFound("ride"))?;

        if !ride.is_requested() {
            return Err(Error::InvalidTransition(format!(
                "cannot reject a ride with status {}",
                ride.status.name()
            )));
        }

        self.store.add_rejection(ride.id, user.id).await?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn advance_ride(&self, user: User, id: Uuid, to: Status) -> Result<Ride, Error> {
        self.authorize(&user, &[Role::Driver])?;

        for _ in 0..COMMIT_ATTEMPTS {
            let mut ride = self
                .store
                .find_ride(id)
                .await?
                .ok_or(Error::NotFound("ride"))?;

            if ride.driver_id != Some(user.id) {
                return Err(Error::Forbidden("you are not assigned to this ride"));
            }

            let expected = ride.status;
            ride.advance(to)?;

            if self.store.commit_transition(&ride, expected).await? {
                return Ok(ride);
            }

            tracing::warn!(ride_id = %id, "ride changed while advancing, retrying");
        }

        Err(Error::Internal("could not settle ride status update".into()))
    }

    #[tracing::instrument(skip(self))]
    async fn pending_requests(&self, user: User) -> Result<Vec<Ride>, Error> {
        self.authorize(&user, &[Role::Driver])?;

        self.eligible_driver(&user).await?;

        self.store.pending_rides(user.id).await
    }

    #[tracing::instrument(skip(self))]
    async fn active_ride_for_rider(&self, user: User) -> Result<Option<Ride>, Error> {
        self.authorize(&user, &[Role::Rider])?;

        self.store.active_ride_for_rider(user.id).await
    }

    #[tracing::instrument(skip(self))]
    async fn active_ride_for_driver(&self, user: User) -> Result<Option<Ride>, Error> {
        self.authorize(&user, &[Role::Driver])?;

        self.store.active_ride_for_driver(user.id).await
    }

    #[tracing::instrument(skip(self))]
    async fn rider_history(
        &self,
        user: User,
        status: Option<Status>,
        page: Page,
    ) -> Result<Paginated<Ride>, Error> {
        self.authorize(&user, &[Role::Rider])?;

        let filter = RideFilter {
            rider_id: Some(user.id),
            status,
            ..Default::default()
        };
        let (rides, total) = self.store.list_rides(filter, page).await?;

        Ok(Paginated::new(rides, page, total))
    }

    #[tracing::instrument(skip(self))]
    async fn driver_history(
        &self,
        user: User,
        status: Option<Status>,
        page: Page,
    ) -> Result<Paginated<Ride>, Error> {
        self.authorize(&user, &[Role::Driver])?;

        let filter = RideFilter {
            driver_id: Some(user.id),
            status,
            ..Default::default()
        };
        let (rides, total) = self.store.list_rides(filter, page).await?;

        Ok(Paginated::new(rides, page, total))
    }
}

impl Engine {
    /// Gate shared by the request-visibility and accept paths: the caller
    /// must own a driver profile that is approved and online.
    async fn eligible_driver(&self, user: &User) -> Result<Driver, Error> {
        let driver = self
            .store
            .find_driver(user.id)
            .await?
            .ok_or(Error::NotFound("driver profile"))?;

        if !driver.is_eligible() {
            return Err(Error::Forbidden(
                "you must be an approved and online driver to serve requests",
            ));
        }

        Ok(driver)
    }
}
