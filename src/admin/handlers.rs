use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::config::schema::{RelaySettings, SettingsPatch};
use crate::health::prober::ProbeReport;
use crate::load_balancer::balancer::BalancerSpec;
use crate::relay::stats::RelayStats;

#[derive(Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub ready: bool,
    pub enabled: bool,
    pub intercepting: bool,
    pub current_balancer: Option<BalancerSpec>,
    pub active_balancers: usize,
    pub stats: RelayStats,
}

#[derive(Serialize, Deserialize)]
pub struct BalancerList {
    pub current: Option<BalancerSpec>,
    pub balancers: Vec<BalancerSpec>,
}

#[derive(Serialize, Deserialize)]
pub struct SwitchResult {
    pub switched: bool,
    pub current: Option<BalancerSpec>,
}

#[derive(Deserialize)]
pub struct BlockedQuery {
    pub url: String,
}

#[derive(Serialize, Deserialize)]
pub struct BlockedResult {
    pub url: String,
    pub blocked: bool,
}

#[derive(Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let engine = &state.engine;
    let status = if !engine.is_ready() {
        "disposed"
    } else if engine.is_enabled() {
        "operational"
    } else {
        "disabled"
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: status.to_string(),
        ready: engine.is_ready(),
        enabled: engine.is_enabled(),
        intercepting: engine.boundary().is_installed(),
        current_balancer: engine.current_balancer(),
        active_balancers: engine.balancers().len(),
        stats: engine.stats(),
    })
}

pub async fn get_settings(State(state): State<AdminState>) -> Json<RelaySettings> {
    Json(state.engine.settings())
}

pub async fn patch_settings(
    State(state): State<AdminState>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<RelaySettings>, (StatusCode, Json<ApiError>)> {
    let invalid = |message: &str| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError {
                error: message.to_string(),
            }),
        )
    };
    if patch.timeout_ms == Some(0) {
        return Err(invalid("timeout_ms must be greater than 0"));
    }
    if patch.retry_count == Some(0) {
        return Err(invalid("retry_count must be greater than 0"));
    }

    Ok(Json(state.engine.update_settings(&patch)))
}

pub async fn get_balancers(State(state): State<AdminState>) -> Json<BalancerList> {
    Json(BalancerList {
        current: state.engine.current_balancer(),
        balancers: state.engine.balancers(),
    })
}

pub async fn switch_balancer(State(state): State<AdminState>) -> Json<SwitchResult> {
    let switched = state.engine.switch_balancer().is_some();
    Json(SwitchResult {
        switched,
        current: state.engine.current_balancer(),
    })
}

pub async fn test_balancers(State(state): State<AdminState>) -> Json<Vec<ProbeReport>> {
    Json(state.engine.test_all_balancers().await)
}

pub async fn get_stats(State(state): State<AdminState>) -> Json<RelayStats> {
    Json(state.engine.stats())
}

pub async fn reset_stats(State(state): State<AdminState>) -> Json<RelayStats> {
    state.engine.reset_stats();
    Json(state.engine.stats())
}

pub async fn check_blocked(
    State(state): State<AdminState>,
    Query(query): Query<BlockedQuery>,
) -> Json<BlockedResult> {
    let blocked = state.engine.is_blocked(&query.url);
    Json(BlockedResult {
        url: query.url,
        blocked,
    })
}
