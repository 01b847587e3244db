mod account_api;
mod admin_api;
mod driver_api;
mod ride_api;

use crate::api::API;
use crate::auth::{authorizor, Role, User};
use crate::error::Error;
use crate::store::DynStore;

/// The lifecycle engine. All state lives behind the store boundary; the
/// engine is request-scoped and holds no mutable state of its own.
pub struct Engine {
    store: DynStore,
}

impl Engine {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    fn authorize(&self, user: &User, allowed: &[Role]) -> Result<(), Error> {
        authorizor::require_role(user, allowed)
    }
}

impl API for Engine {}
