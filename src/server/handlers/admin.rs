use axum::extract::{Extension, Json, Path, Query};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{Analytics, DriverProfile, DynAPI};
use crate::auth::Role;
use crate::entities::{Account, Approval, Driver, Ride};
use crate::error::Error;
use crate::server::extract::Identity;
use crate::server::HistoryQuery;
use crate::store::{Page, Paginated};

#[derive(Serialize, Deserialize)]
pub struct ListQuery {
    role: Option<String>,
    #[serde(rename = "searchTerm")]
    search_term: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Serialize, Deserialize)]
pub struct ApprovalParams {
    status: String,
}

#[derive(Serialize, Deserialize)]
pub struct BlockParams {
    blocked: bool,
}

pub async fn list_accounts(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<Account>>, Error> {
    let role = match &query.role {
        Some(value) => Some(Role::parse(value).ok_or_else(|| {
            Error::Validation(format!("role must be rider, driver or admin, got {value}"))
        })?),
        None => None,
    };
    let page = Page::new(query.page, query.limit);

    let accounts = api
        .list_accounts(user, role, query.search_term, page)
        .await?;

    Ok(accounts.into())
}

pub async fn list_drivers(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<DriverProfile>>, Error> {
    let page = Page::new(query.page, query.limit);
    let drivers = api.list_drivers(user, query.search_term, page).await?;

    Ok(drivers.into())
}

pub async fn list_rides(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Paginated<Ride>>, Error> {
    let (status, page) = query.into_parts()?;
    let rides = api.list_rides(user, status, page).await?;

    Ok(rides.into())
}

pub async fn analytics(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
) -> Result<Json<Analytics>, Error> {
    let analytics = api.analytics(user).await?;

    Ok(analytics.into())
}

pub async fn driver_approval(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Path(id): Path<Uuid>,
    Json(params): Json<ApprovalParams>,
) -> Result<Json<Driver>, Error> {
    let approval = match params.status.as_str() {
        "approved" => Approval::Approved,
        "suspended" => Approval::Suspended,
        other => {
            return Err(Error::Validation(format!(
                "approval status must be approved or suspended, got {other}"
            )))
        }
    };

    let driver = api.set_driver_approval(user, id, approval).await?;

    Ok(driver.into())
}

pub async fn block_account(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Path(id): Path<Uuid>,
    Json(params): Json<BlockParams>,
) -> Result<Json<Account>, Error> {
    let account = api.set_account_block(user, id, params.blocked).await?;

    Ok(account.into())
}
