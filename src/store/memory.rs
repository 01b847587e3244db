use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::Role;
use crate::entities::{Account, Driver, Ride, Status};
use crate::error::Error;
use crate::store::{AccountStore, DriverStore, Page, RideFilter, RideStore, Store};

/// Embedded store used for local development and tests. The writer lock is
/// the atomicity guarantee here: every mutating operation runs as one
/// critical section, which is exactly the unit the Postgres store gets from
/// a transaction.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    drivers: HashMap<Uuid, Driver>,
    rides: HashMap<Uuid, Ride>,
    rejections: HashMap<Uuid, HashSet<Uuid>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {}

#[async_trait]
impl RideStore for MemStore {
    async fn insert_ride(&self, ride: &Ride) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.rides.insert(ride.id, ride.clone());
        Ok(())
    }

    async fn find_ride(&self, id: Uuid) -> Result<Option<Ride>, Error> {
        let inner = self.inner.read().await;
        Ok(inner.rides.get(&id).cloned())
    }

    async fn claim_ride(&self, claimed: &Ride) -> Result<(), Error> {
        let driver_id = claimed
            .driver_id
            .ok_or_else(|| Error::Internal("claim without a driver".into()))?;

        let mut inner = self.inner.write().await;

        if !inner.drivers.contains_key(&driver_id) {
            return Err(Error::NotFound("driver profile"));
        }

        let busy = inner
            .rides
            .values()
            .any(|r| r.driver_id == Some(driver_id) && r.status.is_active());
        if busy {
            return Err(Error::DriverBusy);
        }

        let stored = inner
            .rides
            .get_mut(&claimed.id)
            .ok_or(Error::NotFound("ride"))?;

        if stored.status != Status::Requested {
            return Err(Error::RideUnavailable);
        }

        *stored = claimed.clone();
        Ok(())
    }

    async fn commit_transition(&self, ride: &Ride, expected: Status) -> Result<bool, Error> {
        let mut inner = self.inner.write().await;

        let stored = inner
            .rides
            .get_mut(&ride.id)
            .ok_or(Error::NotFound("ride"))?;

        if stored.status != expected {
            return Ok(false);
        }

        *stored = ride.clone();
        Ok(true)
    }

    async fn add_rejection(&self, ride_id: Uuid, driver_id: Uuid) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.rejections.entry(ride_id).or_default().insert(driver_id);
        Ok(())
    }

    async fn pending_rides(&self, excluding_driver: Uuid) -> Result<Vec<Ride>, Error> {
        let inner = self.inner.read().await;

        let mut rides: Vec<Ride> = inner
            .rides
            .values()
            .filter(|r| r.status == Status::Requested)
            .filter(|r| {
                inner
                    .rejections
                    .get(&r.id)
                    .map_or(true, |set| !set.contains(&excluding_driver))
            })
            .cloned()
            .collect();

        rides.sort_by_key(|r| r.created_at);
        Ok(rides)
    }

    async fn active_ride_for_driver(&self, driver_id: Uuid) -> Result<Option<Ride>, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .rides
            .values()
            .find(|r| r.driver_id == Some(driver_id) && r.status.is_active())
            .cloned())
    }

    async fn active_ride_for_rider(&self, rider_id: Uuid) -> Result<Option<Ride>, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .rides
            .values()
            .find(|r| r.rider_id == rider_id && r.status.is_active())
            .cloned())
    }

    async fn list_rides(
        &self,
        filter: RideFilter,
        page: Page,
    ) -> Result<(Vec<Ride>, u64), Error> {
        let inner = self.inner.read().await;

        let mut rides: Vec<Ride> = inner
            .rides
            .values()
            .filter(|r| filter.rider_id.map_or(true, |id| r.rider_id == id))
            .filter(|r| filter.driver_id.map_or(true, |id| r.driver_id == Some(id)))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();

        rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = rides.len() as u64;
        let rides = paginate(rides, page);

        Ok((rides, total))
    }

    async fn completed_rides_for_driver(&self, driver_id: Uuid) -> Result<Vec<Ride>, Error> {
        let inner = self.inner.read().await;

        let mut rides: Vec<Ride> = inner
            .rides
            .values()
            .filter(|r| r.driver_id == Some(driver_id) && r.status == Status::Completed)
            .cloned()
            .collect();

        rides.sort_by_key(|r| r.created_at);
        Ok(rides)
    }

    async fn count_rides(&self, status: Option<Status>) -> Result<u64, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .rides
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .count() as u64)
    }

    async fn total_completed_fares(&self) -> Result<f64, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .rides
            .values()
            .filter(|r| r.status == Status::Completed)
            .map(|r| r.fare)
            .sum())
    }
}

#[async_trait]
impl DriverStore for MemStore {
    async fn insert_driver(&self, driver: &Driver) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.drivers.insert(driver.id, driver.clone());
        Ok(())
    }

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, Error> {
        let inner = self.inner.read().await;
        Ok(inner.drivers.get(&id).cloned())
    }

    async fn update_driver(&self, driver: &Driver) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.drivers.insert(driver.id, driver.clone());
        Ok(())
    }

    async fn list_drivers(&self, ids: &[Uuid], page: Page) -> Result<(Vec<Driver>, u64), Error> {
        let inner = self.inner.read().await;
        let wanted: HashSet<&Uuid> = ids.iter().collect();

        let mut drivers: Vec<Driver> = inner
            .drivers
            .values()
            .filter(|d| wanted.contains(&d.id))
            .cloned()
            .collect();

        drivers.sort_by_key(|d| d.id);

        let total = drivers.len() as u64;
        let drivers = paginate(drivers, page);

        Ok((drivers, total))
    }
}

#[async_trait]
impl AccountStore for MemStore {
    async fn insert_account(
        &self,
        account: &Account,
        driver: Option<&Driver>,
    ) -> Result<(), Error> {
        let mut inner = self.inner.write().await;

        if inner.accounts.values().any(|a| a.email == account.email) {
            return Err(Error::Validation("email is already registered".into()));
        }

        inner.accounts.insert(account.id, account.clone());
        if let Some(driver) = driver {
            inner.drivers.insert(driver.id, driver.clone());
        }

        Ok(())
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, Error> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn find_accounts(&self, ids: &[Uuid]) -> Result<Vec<Account>, Error> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.accounts.get(id).cloned())
            .collect())
    }

    async fn update_account(&self, account: &Account) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn search_account_ids(
        &self,
        role: Option<Role>,
        search: Option<&str>,
    ) -> Result<Vec<Uuid>, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .filter(|a| role.map_or(true, |r| a.role == r))
            .filter(|a| search.map_or(true, |term| matches_search(a, term)))
            .map(|a| a.id)
            .collect())
    }

    async fn list_accounts(
        &self,
        role: Option<Role>,
        search: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Account>, u64), Error> {
        let inner = self.inner.read().await;

        let mut accounts: Vec<Account> = inner
            .accounts
            .values()
            .filter(|a| role.map_or(true, |r| a.role == r))
            .filter(|a| search.map_or(true, |term| matches_search(a, term)))
            .cloned()
            .collect();

        accounts.sort_by(|a, b| a.email.cmp(&b.email));

        let total = accounts.len() as u64;
        let accounts = paginate(accounts, page);

        Ok((accounts, total))
    }

    async fn count_accounts(&self, role: Option<Role>) -> Result<u64, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .filter(|a| role.map_or(true, |r| a.role == r))
            .count() as u64)
    }
}

fn matches_search(account: &Account, term: &str) -> bool {
    let term = term.to_lowercase();
    account.name.to_lowercase().contains(&term) || account.email.to_lowercase().contains(&term)
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Coordinates;

    fn point() -> Coordinates {
        Coordinates {
            latitude: 23.8103,
            longitude: 90.4125,
        }
    }

    fn approved_driver(store: &MemStore) -> Uuid {
        let mut driver = Driver::new(Uuid::new_v4(), "Toyota Axio".into(), "DHK-4417".into());
        driver.set_approval(crate::entities::Approval::Approved);
        driver
            .set_availability(crate::entities::Availability::Online)
            .unwrap();
        let id = driver.id;
        tokio_test::block_on(store.insert_driver(&driver)).unwrap();
        id
    }

    #[test]
    fn claim_is_single_winner() {
        let store = MemStore::new();
        let driver_a = approved_driver(&store);
        let driver_b = approved_driver(&store);

        let ride = Ride::new(Uuid::new_v4(), point(), point(), 15.0);
        tokio_test::block_on(store.insert_ride(&ride)).unwrap();

        let mut claim_a = ride.clone();
        claim_a.assign_driver(driver_a).unwrap();
        tokio_test::block_on(store.claim_ride(&claim_a)).unwrap();

        let mut claim_b = ride.clone();
        claim_b.assign_driver(driver_b).unwrap();
        let result = tokio_test::block_on(store.claim_ride(&claim_b));
        assert!(matches!(result, Err(Error::RideUnavailable)));

        let stored = tokio_test::block_on(store.find_ride(ride.id))
            .unwrap()
            .unwrap();
        assert_eq!(stored.driver_id, Some(driver_a));
        assert_eq!(stored.status, Status::Accepted);
    }

    #[test]
    fn claim_refuses_a_busy_driver() {
        let store = MemStore::new();
        let driver = approved_driver(&store);

        let first = Ride::new(Uuid::new_v4(), point(), point(), 10.0);
        let second = Ride::new(Uuid::new_v4(), point(), point(), 20.0);
        tokio_test::block_on(store.insert_ride(&first)).unwrap();
        tokio_test::block_on(store.insert_ride(&second)).unwrap();

        let mut claim = first.clone();
        claim.assign_driver(driver).unwrap();
        tokio_test::block_on(store.claim_ride(&claim)).unwrap();

        let mut other = second.clone();
        other.assign_driver(driver).unwrap();
        let result = tokio_test::block_on(store.claim_ride(&other));
        assert!(matches!(result, Err(Error::DriverBusy)));

        let stored = tokio_test::block_on(store.find_ride(second.id))
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, Status::Requested);
        assert_eq!(stored.driver_id, None);
    }

    #[test]
    fn commit_transition_is_conditional() {
        let store = MemStore::new();
        let ride = Ride::new(Uuid::new_v4(), point(), point(), 15.0);
        tokio_test::block_on(store.insert_ride(&ride)).unwrap();

        let mut cancelled = ride.clone();
        cancelled.cancel().unwrap();
        assert!(
            tokio_test::block_on(store.commit_transition(&cancelled, Status::Requested)).unwrap()
        );

        // a second writer holding the stale `requested` snapshot loses
        let mut stale = ride.clone();
        stale.cancel().unwrap();
        assert!(
            !tokio_test::block_on(store.commit_transition(&stale, Status::Requested)).unwrap()
        );
    }

    #[test]
    fn rejections_filter_only_the_rejecting_driver() {
        let store = MemStore::new();
        let rejecting = Uuid::new_v4();
        let other = Uuid::new_v4();

        let ride = Ride::new(Uuid::new_v4(), point(), point(), 15.0);
        tokio_test::block_on(store.insert_ride(&ride)).unwrap();

        tokio_test::block_on(store.add_rejection(ride.id, rejecting)).unwrap();
        tokio_test::block_on(store.add_rejection(ride.id, rejecting)).unwrap();

        let hidden = tokio_test::block_on(store.pending_rides(rejecting)).unwrap();
        assert!(hidden.is_empty());

        let visible = tokio_test::block_on(store.pending_rides(other)).unwrap();
        assert_eq!(visible.len(), 1);

        let stored = tokio_test::block_on(store.find_ride(ride.id))
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, Status::Requested);
        assert_eq!(stored.driver_id, None);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let store = MemStore::new();
        let first = Account::new("Anika".into(), "anika@example.com".into(), Role::Rider);
        let second = Account::new("Anika R".into(), "anika@example.com".into(), Role::Rider);

        tokio_test::block_on(store.insert_account(&first, None)).unwrap();
        let result = tokio_test::block_on(store.insert_account(&second, None));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn ride_listing_paginates_newest_first() {
        let store = MemStore::new();
        let rider = Uuid::new_v4();

        for fare in 1..=5 {
            let ride = Ride::new(rider, point(), point(), f64::from(fare));
            tokio_test::block_on(store.insert_ride(&ride)).unwrap();
        }

        let (first_page, total) = tokio_test::block_on(store.list_rides(
            RideFilter {
                rider_id: Some(rider),
                ..Default::default()
            },
            Page {
                page: 1,
                limit: 2,
            },
        ))
        .unwrap();

        assert_eq!(total, 5);
        assert_eq!(first_page.len(), 2);

        let (last_page, _) = tokio_test::block_on(store.list_rides(
            RideFilter {
                rider_id: Some(rider),
                ..Default::default()
            },
            Page {
                page: 3,
                limit: 2,
            },
        ))
        .unwrap();

        assert_eq!(last_page.len(), 1);
    }
}
