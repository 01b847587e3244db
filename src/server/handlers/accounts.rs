use axum::extract::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::{DynAPI, NewAccount, ProfileUpdate};
use crate::auth::Role;
use crate::entities::Account;
use crate::error::Error;
use crate::server::extract::Identity;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    name: String,
    email: String,
    role: String,
    phone: Option<String>,
    address: Option<String>,
    vehicle_details: Option<String>,
    license_number: Option<String>,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<CreateParams>,
) -> Result<Json<Account>, Error> {
    let role = Role::parse(&params.role).ok_or_else(|| {
        Error::Validation(format!(
            "role must be rider, driver or admin, got {}",
            params.role
        ))
    })?;

    let account = api
        .create_account(NewAccount {
            name: params.name,
            email: params.email,
            role,
            phone: params.phone,
            address: params.address,
            vehicle_details: params.vehicle_details,
            license_number: params.license_number,
        })
        .await?;

    Ok(account.into())
}

pub async fn me(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
) -> Result<Json<Account>, Error> {
    let account = api.my_profile(user).await?;

    Ok(account.into())
}

pub async fn update_me(
    Extension(api): Extension<DynAPI>,
    Identity(user): Identity,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Account>, Error> {
    let account = api.update_profile(user, update).await?;

    Ok(account.into())
}
