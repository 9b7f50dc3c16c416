//! In-memory stand-in for the cooperative REST API.
//!
//! Serves `/auth`, `/farmers` and `/crops` with bearer-token auth over a
//! seeded store (`admin@agtech.com` / `admin123`, `john@agtech.com` /
//! `farmer123`). Errors are `{"message": ...}` bodies.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, sync::RwLock};

pub mod error;
pub mod models;
mod routes;
pub mod store;

pub use error::ApiError;
pub use models::{CropType, Role};
pub use store::{Caller, Store};

pub type Db = Arc<RwLock<Store>>;

/// Router over a freshly seeded store.
pub fn app() -> Router {
    router(Arc::new(RwLock::new(Store::seeded())))
}

/// Router over `db`, so a test can keep a handle on the store.
pub fn router(db: Db) -> Router {
    Router::new()
        .route("/auth/login", post(routes::login))
        .route("/auth/register", post(routes::register))
        .route("/auth/profile", get(routes::profile))
        .route("/auth/change-password", post(routes::change_password))
        .route("/farmers", get(routes::list_farmers).post(routes::create_farmer))
        .route("/farmers/stats", get(routes::farmer_stats))
        .route(
            "/farmers/{id}",
            get(routes::get_farmer)
                .patch(routes::update_farmer)
                .delete(routes::delete_farmer),
        )
        .route("/crops", get(routes::list_crops).post(routes::create_crop))
        .route("/crops/stats", get(routes::crop_stats))
        .route(
            "/crops/{id}",
            get(routes::get_crop)
                .patch(routes::update_crop)
                .delete(routes::delete_crop),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Serve `db` on `listener`.
pub async fn run_with(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, router(db)).await
}
