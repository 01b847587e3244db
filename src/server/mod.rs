pub mod extract;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;

use crate::api::{DynAPI, API};
use crate::entities::Status;
use crate::error::Error;
use crate::server::handlers::{accounts, admin, drivers, rides};
use crate::store::Page;

pub fn app<T: API + Send + Sync + 'static>(api: T) -> Router {
    let api = Arc::new(api) as DynAPI;

    Router::new()
        .route("/accounts", post(accounts::create))
        .route("/accounts/me", get(accounts::me).patch(accounts::update_me))
        .route("/rides", post(rides::create))
        .route("/rides/:id", get(rides::find))
        .route("/rides/:id/cancel", patch(rides::cancel))
        .route("/rides/:id/accept", patch(rides::accept))
        .route("/rides/:id/reject", patch(rides::reject))
        .route("/rides/:id/status", patch(rides::advance))
        .route("/riders/active", get(rides::active_rider))
        .route("/riders/history", get(rides::rider_history))
        .route("/drivers/requests", get(rides::pending))
        .route("/drivers/active", get(rides::active_driver))
        .route("/drivers/history", get(rides::driver_history))
        .route("/drivers/availability", patch(drivers::update_availability))
        .route("/drivers/earnings", get(drivers::earnings))
        .route("/admin/accounts", get(admin::list_accounts))
        .route("/admin/accounts/:id/block", patch(admin::block_account))
        .route("/admin/drivers", get(admin::list_drivers))
        .route("/admin/drivers/:id/approval", patch(admin::driver_approval))
        .route("/admin/rides", get(admin::list_rides))
        .route("/admin/analytics", get(admin::analytics))
        .layer(Extension(api))
}

pub async fn serve<T: API + Send + Sync + 'static>(api: T, addr: SocketAddr) {
    let app = app(api);

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}

/// Shared query shape for the paginated, status-filterable ride listings.
#[derive(Deserialize)]
pub struct HistoryQuery {
    status: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

impl HistoryQuery {
    pub fn into_parts(self) -> Result<(Option<Status>, Page), Error> {
        let status = match &self.status {
            Some(value) => Some(Status::parse(value)?),
            None => None,
        };

        Ok((status, Page::new(self.page, self.limit)))
    }
}
