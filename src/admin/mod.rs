//! Admin API.
//!
//! Bearer-token protected JSON endpoints over the engine's control surface.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::engine::RelayEngine;

#[derive(Clone)]
pub struct AdminState {
    pub engine: Arc<RelayEngine>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(engine: Arc<RelayEngine>, api_key: &str) -> Self {
        Self {
            engine,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/settings", get(get_settings).patch(patch_settings))
        .route("/admin/balancers", get(get_balancers))
        .route("/admin/balancers/switch", post(switch_balancer))
        .route("/admin/balancers/test", get(test_balancers))
        .route("/admin/stats", get(get_stats).delete(reset_stats))
        .route("/admin/blocked", get(check_blocked))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
