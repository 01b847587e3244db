use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{types::Json, Acquire, Executor, Pool, Postgres, Row};
use uuid::Uuid;

use crate::auth::Role;
use crate::entities::{Account, Driver, Ride, Status};
use crate::error::Error;
use crate::store::{AccountStore, DriverStore, Page, RideFilter, RideStore, Store};

const ACTIVE_STATUSES: &str = "('accepted', 'picked_up', 'in_transit')";

/// Production store. Documents live in `data` JSONB columns with the
/// queryable fields promoted to real columns; lifecycle commits are
/// conditional on the promoted `status` column.
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    #[tracing::instrument(name = "PgStore::new", skip_all)]
    pub async fn new(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        // TODO: move this to migrations
        pool.execute(
            "CREATE TABLE IF NOT EXISTS accounts (id UUID PRIMARY KEY, role VARCHAR NOT NULL, email VARCHAR NOT NULL UNIQUE, data JSONB NOT NULL)",
        )
        .await?;
        pool.execute(
            "CREATE TABLE IF NOT EXISTS drivers (id UUID PRIMARY KEY, approval VARCHAR NOT NULL, availability VARCHAR NOT NULL, data JSONB NOT NULL)",
        )
        .await?;
        pool.execute(
            "CREATE TABLE IF NOT EXISTS rides (id UUID PRIMARY KEY, status VARCHAR NOT NULL, rider_id UUID NOT NULL, driver_id UUID, created_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL)",
        )
        .await?;
        pool.execute(
            "CREATE TABLE IF NOT EXISTS ride_rejections (ride_id UUID NOT NULL, driver_id UUID NOT NULL, PRIMARY KEY (ride_id, driver_id))",
        )
        .await?;

        Ok(Self { pool })
    }
}

impl Store for PgStore {}

#[async_trait]
impl RideStore for PgStore {
    async fn insert_ride(&self, ride: &Ride) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query(
                "INSERT INTO rides (id, status, rider_id, driver_id, created_at, data) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&ride.id)
            .bind(ride.status.name())
            .bind(&ride.rider_id)
            .bind(&ride.driver_id)
            .bind(&ride.created_at)
            .bind(Json(ride)),
        )
        .await?;

        Ok(())
    }

    async fn find_ride(&self, id: Uuid) -> Result<Option<Ride>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_row = conn
            .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1").bind(&id))
            .await?;

        match maybe_row {
            Some(row) => {
                let Json(ride): Json<Ride> = row.try_get("data")?;
                Ok(Some(ride))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, claimed), fields(ride_id = %claimed.id))]
    async fn claim_ride(&self, claimed: &Ride) -> Result<(), Error> {
        let driver_id = claimed
            .driver_id
            .ok_or_else(|| Error::Internal("claim without a driver".into()))?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        // locking the driver row serializes claims by the same driver, so
        // the busy-check below cannot pass twice concurrently
        tx.fetch_optional(
            sqlx::query("SELECT id FROM drivers WHERE id = $1 FOR UPDATE").bind(&driver_id),
        )
        .await?
        .ok_or(Error::NotFound("driver profile"))?;

        let count_active = format!(
            "SELECT COUNT(*) AS active FROM rides WHERE driver_id = $1 AND status IN {ACTIVE_STATUSES}"
        );
        let row = tx
            .fetch_one(sqlx::query(&count_active).bind(&driver_id))
            .await?;
        let active: i64 = row.try_get("active")?;

        if active > 0 {
            return Err(Error::DriverBusy);
        }

        let result = tx
            .execute(
                sqlx::query(
                    "UPDATE rides SET status = $2, driver_id = $3, data = $4 WHERE id = $1 AND status = 'requested'",
                )
                .bind(&claimed.id)
                .bind(claimed.status.name())
                .bind(&driver_id)
                .bind(Json(claimed)),
            )
            .await?;

        if result.rows_affected() == 0 {
            let exists = tx
                .fetch_optional(
                    sqlx::query("SELECT id FROM rides WHERE id = $1").bind(&claimed.id),
                )
                .await?;

            return match exists {
                Some(_) => Err(Error::RideUnavailable),
                None => Err(Error::NotFound("ride")),
            };
        }

        tx.commit().await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, ride), fields(ride_id = %ride.id))]
    async fn commit_transition(&self, ride: &Ride, expected: Status) -> Result<bool, Error> {
        let mut conn = self.pool.acquire().await?;

        let result = conn
            .execute(
                sqlx::query(
                    "UPDATE rides SET status = $2, data = $3 WHERE id = $1 AND status = $4",
                )
                .bind(&ride.id)
                .bind(ride.status.name())
                .bind(Json(ride))
                .bind(expected.name()),
            )
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_rejection(&self, ride_id: Uuid, driver_id: Uuid) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query(
                "INSERT INTO ride_rejections (ride_id, driver_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(&ride_id)
            .bind(&driver_id),
        )
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn pending_rides(&self, excluding_driver: Uuid) -> Result<Vec<Ride>, Error> {
        let mut conn = self.pool.acquire().await?;

        let query = "
            SELECT
                r.data
            FROM
                rides r
                LEFT JOIN ride_rejections rr ON rr.ride_id = r.id AND rr.driver_id = $1
            WHERE
                r.status = 'requested'
                AND rr.driver_id IS NULL
            ORDER BY
                r.created_at ASC
        ";

        let rows = conn
            .fetch_all(sqlx::query(query).bind(&excluding_driver))
            .await?;

        decode_docs(rows)
    }

    async fn active_ride_for_driver(&self, driver_id: Uuid) -> Result<Option<Ride>, Error> {
        let mut conn = self.pool.acquire().await?;

        let query = format!(
            "SELECT data FROM rides WHERE driver_id = $1 AND status IN {ACTIVE_STATUSES} LIMIT 1"
        );
        let maybe_row = conn
            .fetch_optional(sqlx::query(&query).bind(&driver_id))
            .await?;

        match maybe_row {
            Some(row) => {
                let Json(ride): Json<Ride> = row.try_get("data")?;
                Ok(Some(ride))
            }
            None => Ok(None),
        }
    }

    async fn active_ride_for_rider(&self, rider_id: Uuid) -> Result<Option<Ride>, Error> {
        let mut conn = self.pool.acquire().await?;

        let query = format!(
            "SELECT data FROM rides WHERE rider_id = $1 AND status IN {ACTIVE_STATUSES} LIMIT 1"
        );
        let maybe_row = conn
            .fetch_optional(sqlx::query(&query).bind(&rider_id))
            .await?;

        match maybe_row {
            Some(row) => {
                let Json(ride): Json<Ride> = row.try_get("data")?;
                Ok(Some(ride))
            }
            None => Ok(None),
        }
    }

    async fn list_rides(
        &self,
        filter: RideFilter,
        page: Page,
    ) -> Result<(Vec<Ride>, u64), Error> {
        let mut conn = self.pool.acquire().await?;
        let status = filter.status.map(|s| s.name());

        let rows = conn
            .fetch_all(
                sqlx::query(
                    "SELECT data FROM rides
                     WHERE ($1::uuid IS NULL OR rider_id = $1)
                       AND ($2::uuid IS NULL OR driver_id = $2)
                       AND ($3::varchar IS NULL OR status = $3)
                     ORDER BY created_at DESC
                     LIMIT $4 OFFSET $5",
                )
                .bind(&filter.rider_id)
                .bind(&filter.driver_id)
                .bind(&status)
                .bind(page.limit as i64)
                .bind(page.offset() as i64),
            )
            .await?;

        let row = conn
            .fetch_one(
                sqlx::query(
                    "SELECT COUNT(*) AS total FROM rides
                     WHERE ($1::uuid IS NULL OR rider_id = $1)
                       AND ($2::uuid IS NULL OR driver_id = $2)
                       AND ($3::varchar IS NULL OR status = $3)",
                )
                .bind(&filter.rider_id)
                .bind(&filter.driver_id)
                .bind(&status),
            )
            .await?;
        let total: i64 = row.try_get("total")?;

        Ok((decode_docs(rows)?, total as u64))
    }

    async fn completed_rides_for_driver(&self, driver_id: Uuid) -> Result<Vec<Ride>, Error> {
        let mut conn = self.pool.acquire().await?;

        let rows = conn
            .fetch_all(
                sqlx::query(
                    "SELECT data FROM rides WHERE driver_id = $1 AND status = 'completed' ORDER BY created_at ASC",
                )
                .bind(&driver_id),
            )
            .await?;

        decode_docs(rows)
    }

    async fn count_rides(&self, status: Option<Status>) -> Result<u64, Error> {
        let mut conn = self.pool.acquire().await?;

        let row = conn
            .fetch_one(
                sqlx::query(
                    "SELECT COUNT(*) AS total FROM rides WHERE ($1::varchar IS NULL OR status = $1)",
                )
                .bind(status.map(|s| s.name())),
            )
            .await?;
        let total: i64 = row.try_get("total")?;

        Ok(total as u64)
    }

    async fn total_completed_fares(&self) -> Result<f64, Error> {
        let mut conn = self.pool.acquire().await?;

        let row = conn
            .fetch_one(sqlx::query(
                "SELECT COALESCE(SUM((data->>'fare')::float8), 0) AS total FROM rides WHERE status = 'completed'",
            ))
            .await?;

        Ok(row.try_get("total")?)
    }
}

#[async_trait]
impl DriverStore for PgStore {
    async fn insert_driver(&self, driver: &Driver) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query(
                "INSERT INTO drivers (id, approval, availability, data) VALUES ($1, $2, $3, $4)",
            )
            .bind(&driver.id)
            .bind(driver.approval.name())
            .bind(driver.availability.name())
            .bind(Json(driver)),
        )
        .await?;

        Ok(())
    }

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_row = conn
            .fetch_optional(sqlx::query("SELECT data FROM drivers WHERE id = $1").bind(&id))
            .await?;

        match maybe_row {
            Some(row) => {
                let Json(driver): Json<Driver> = row.try_get("data")?;
                Ok(Some(driver))
            }
            None => Ok(None),
        }
    }

    async fn update_driver(&self, driver: &Driver) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query(
                "UPDATE drivers SET approval = $2, availability = $3, data = $4 WHERE id = $1",
            )
            .bind(&driver.id)
            .bind(driver.approval.name())
            .bind(driver.availability.name())
            .bind(Json(driver)),
        )
        .await?;

        Ok(())
    }

    async fn list_drivers(&self, ids: &[Uuid], page: Page) -> Result<(Vec<Driver>, u64), Error> {
        let mut conn = self.pool.acquire().await?;

        let rows = conn
            .fetch_all(
                sqlx::query(
                    "SELECT data FROM drivers WHERE id = ANY($1) ORDER BY id LIMIT $2 OFFSET $3",
                )
                .bind(ids)
                .bind(page.limit as i64)
                .bind(page.offset() as i64),
            )
            .await?;

        let row = conn
            .fetch_one(
                sqlx::query("SELECT COUNT(*) AS total FROM drivers WHERE id = ANY($1)").bind(ids),
            )
            .await?;
        let total: i64 = row.try_get("total")?;

        Ok((decode_docs(rows)?, total as u64))
    }
}

#[async_trait]
impl AccountStore for PgStore {
    #[tracing::instrument(skip(self, account, driver), fields(account_id = %account.id))]
    async fn insert_account(
        &self,
        account: &Account,
        driver: Option<&Driver>,
    ) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let taken = tx
            .fetch_optional(
                sqlx::query("SELECT id FROM accounts WHERE email = $1").bind(&account.email),
            )
            .await?;
        if taken.is_some() {
            return Err(Error::Validation("email is already registered".into()));
        }

        tx.execute(
            sqlx::query("INSERT INTO accounts (id, role, email, data) VALUES ($1, $2, $3, $4)")
                .bind(&account.id)
                .bind(account.role.name())
                .bind(&account.email)
                .bind(Json(account)),
        )
        .await?;

        if let Some(driver) = driver {
            tx.execute(
                sqlx::query(
                    "INSERT INTO drivers (id, approval, availability, data) VALUES ($1, $2, $3, $4)",
                )
                .bind(&driver.id)
                .bind(driver.approval.name())
                .bind(driver.availability.name())
                .bind(Json(driver)),
            )
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_row = conn
            .fetch_optional(sqlx::query("SELECT data FROM accounts WHERE id = $1").bind(&id))
            .await?;

        match maybe_row {
            Some(row) => {
                let Json(account): Json<Account> = row.try_get("data")?;
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    async fn find_accounts(&self, ids: &[Uuid]) -> Result<Vec<Account>, Error> {
        let mut conn = self.pool.acquire().await?;

        let rows = conn
            .fetch_all(sqlx::query("SELECT data FROM accounts WHERE id = ANY($1)").bind(ids))
            .await?;

        decode_docs(rows)
    }

    async fn update_account(&self, account: &Account) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query("UPDATE accounts SET role = $2, email = $3, data = $4 WHERE id = $1")
                .bind(&account.id)
                .bind(account.role.name())
                .bind(&account.email)
                .bind(Json(account)),
        )
        .await?;

        Ok(())
    }

    async fn search_account_ids(
        &self,
        role: Option<Role>,
        search: Option<&str>,
    ) -> Result<Vec<Uuid>, Error> {
        let mut conn = self.pool.acquire().await?;
        let pattern = search.map(|term| format!("%{term}%"));

        let rows = conn
            .fetch_all(
                sqlx::query(
                    "SELECT id FROM accounts
                     WHERE ($1::varchar IS NULL OR role = $1)
                       AND ($2::varchar IS NULL OR email ILIKE $2 OR data->>'name' ILIKE $2)",
                )
                .bind(role.map(|r| r.name()))
                .bind(&pattern),
            )
            .await?;

        rows.into_iter()
            .map(|row| Ok(row.try_get("id")?))
            .collect()
    }

    async fn list_accounts(
        &self,
        role: Option<Role>,
        search: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Account>, u64), Error> {
        let mut conn = self.pool.acquire().await?;
        let role = role.map(|r| r.name());
        let pattern = search.map(|term| format!("%{term}%"));

        let rows = conn
            .fetch_all(
                sqlx::query(
                    "SELECT data FROM accounts
                     WHERE ($1::varchar IS NULL OR role = $1)
                       AND ($2::varchar IS NULL OR email ILIKE $2 OR data->>'name' ILIKE $2)
                     ORDER BY email ASC
                     LIMIT $3 OFFSET $4",
                )
                .bind(&role)
                .bind(&pattern)
                .bind(page.limit as i64)
                .bind(page.offset() as i64),
            )
            .await?;

        let row = conn
            .fetch_one(
                sqlx::query(
                    "SELECT COUNT(*) AS total FROM accounts
                     WHERE ($1::varchar IS NULL OR role = $1)
                       AND ($2::varchar IS NULL OR email ILIKE $2 OR data->>'name' ILIKE $2)",
                )
                .bind(&role)
                .bind(&pattern),
            )
            .await?;
        let total: i64 = row.try_get("total")?;

        Ok((decode_docs(rows)?, total as u64))
    }

    async fn count_accounts(&self, role: Option<Role>) -> Result<u64, Error> {
        let mut conn = self.pool.acquire().await?;

        let row = conn
            .fetch_one(
                sqlx::query(
                    "SELECT COUNT(*) AS total FROM accounts WHERE ($1::varchar IS NULL OR role = $1)",
                )
                .bind(role.map(|r| r.name())),
            )
            .await?;
        let total: i64 = row.try_get("total")?;

        Ok(total as u64)
    }
}

fn decode_docs<T: serde::de::DeserializeOwned>(rows: Vec<PgRow>) -> Result<Vec<T>, Error> {
    rows.into_iter()
        .map(|row| {
            let Json(doc): Json<T> = row.try_get("data")?;
            Ok(doc)
        })
        .collect()
}
