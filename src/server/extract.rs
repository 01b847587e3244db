use axum::async_trait;
use axum::extract::{FromRequest, RequestParts};
use uuid::Uuid;

use crate::auth::{Role, User};
use crate::error::Error;

/// Caller identity established by the upstream authentication gateway. The
/// gateway verifies the signed token and forwards the subject and role as
/// trusted headers; this service never sees credentials.
pub struct Identity(pub User);

#[async_trait]
impl<B> FromRequest<B> for Identity
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let headers = req.headers();

        let id = headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or(Error::Unauthorized)?;

        let role = headers
            .get("x-user-role")
            .and_then(|value| value.to_str().ok())
            .and_then(Role::parse)
            .ok_or(Error::Unauthorized)?;

        Ok(Identity(User::new(id, role)))
    }
}
