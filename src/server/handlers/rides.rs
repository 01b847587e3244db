use axum::extract::{Extension, Json, Path, Query};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::DynAPI;
use crate::entities::{Coordinates, Ride, Status};
use crate::error::Error;
use crate::server::extract::Identity;
use crate::server::HistoryQuery;
use crate::store::Paginated;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    pickup: Coordinates,
    destination: Coordinates,
    fare: f64,
}

#[derive(Serialize, Deserialize)]
pub struct AdvanceParams {
    status: String,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Json(params): Json<CreateParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api
        .create_ride(user, params.pickup, params.destination, params.fare)
        .await?;

    Ok(ride.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.find_ride(user, id).await?;

    Ok(ride.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.cancel_ride(user, id).await?;

    Ok(ride.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.accept_ride(user, id).await?;

    Ok(ride.into())
}

pub async fn reject(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.reject_ride(user, id).await?;

    Ok(ride.into())
}

pub async fn advance(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Path(id): Path<Uuid>,
    Json(params): Json<AdvanceParams>,
) -> Result<Json<Ride>, Error> {
    let to = Status::parse(&params.status)?;
    let ride = api.advance_ride(user, id, to).await?;

    Ok(ride.into())
}

pub async fn pending(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
) -> Result<Json<Vec<Ride>>, Error> {
    let rides = api.pending_requests(user).await?;

    Ok(rides.into())
}

pub async fn active_rider(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
) -> Result<Json<Option<Ride>>, Error> {
    let ride = api.active_ride_for_rider(user).await?;

    Ok(ride.into())
}

pub async fn active_driver(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
) -> Result<Json<Option<Ride>>, Error> {
    let ride = api.active_ride_for_driver(user).await?;

    Ok(ride.into())
}

pub async fn rider_history(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Paginated<Ride>>, Error> {
    let (status, page) = query.into_parts()?;
    let rides = api.rider_history(user, status, page).await?;

    Ok(rides.into())
}

pub async fn driver_history(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Paginated<Ride>>, Error> {
    let (status, page) = query.into_parts()?;
    let rides = api.driver_history(user, status, page).await?;

    Ok(rides.into())
}
