use axum::extract::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::{DynAPI, Earnings};
use crate::entities::{Availability, Driver};
use crate::error::Error;
use crate::server::extract::Identity;

#[derive(Serialize, Deserialize)]
pub struct AvailabilityParams {
    availability: String,
}

pub async fn update_availability(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Json(params): Json<AvailabilityParams>,
) -> Result<Json<Driver>, Error> {
    let availability = match params.availability.as_str() {
        "online" => Availability::Online,
        "offline" => Availability::Offline,
        other => {
            return Err(Error::Validation(format!(
                "availability must be online or offline, got {other}"
            )))
        }
    };

    let driver = api.set_availability(user, availability).await?;

    Ok(driver.into())
}

pub async fn earnings(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
) -> Result<Json<Earnings>, Error> {
    let earnings = api.driver_earnings(user).await?;

    Ok(earnings.into())
}
