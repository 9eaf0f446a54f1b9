use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::health::{HealthSnapshot, HealthState};
use super::latency::LatencyStats;
use crate::analyzer::activity::trade_activity;
use crate::analyzer::report::{ActivityReport, CategoryReportSet, ItemDetail, ItemDetailReport, RankingReport};
use crate::error::AppError;
use crate::store::{DataKind, PartitionStore};
use crate::types::Category;

const DEFAULT_ACTIVITY_PERIOD_DAYS: i64 = 7;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<PartitionStore>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    /// How far back to look for the most recent report.
    pub max_hours_back: i64,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/report/profit", get(get_profit_report))
        .route("/report/items/:id", get(get_item_report))
        .route("/report/trends", get(get_trends_report))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ProfitQuery {
    pub category: Option<String>,
}

#[derive(Deserialize)]
pub struct ItemQuery {
    pub level: Option<u8>,
}

#[derive(Deserialize)]
pub struct TrendsQuery {
    pub period: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn latest_report<T: DeserializeOwned>(state: &ApiState, kind: DataKind) -> Result<T, AppError> {
    state
        .store
        .latest::<T>(kind, Utc::now(), state.max_hours_back)
        .await?
        .map(|(_, doc)| doc)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "no {kind} document in the last {} hours",
                state.max_hours_back
            ))
        })
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthSnapshot> {
    Json(state.health.snapshot())
}

async fn get_profit_report(
    State(state): State<ApiState>,
    Query(params): Query<ProfitQuery>,
) -> Result<Json<RankingReport>, AppError> {
    let Some(name) = params.category else {
        return latest_report::<RankingReport>(&state, DataKind::ReportOverall)
            .await
            .map(Json);
    };

    let category = Category::from_name(&name);
    let set: CategoryReportSet = latest_report(&state, DataKind::ReportCategory).await?;
    set.get(category)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no ranking for category '{name}'")))
}

async fn get_item_report(
    State(state): State<ApiState>,
    Path(item_id): Path<u32>,
    Query(params): Query<ItemQuery>,
) -> Result<Json<Vec<ItemDetail>>, AppError> {
    let report: ItemDetailReport = latest_report(&state, DataKind::ReportItem).await?;
    let items: Vec<ItemDetail> = report
        .items
        .into_iter()
        .filter(|d| d.item_id == item_id)
        .filter(|d| params.level.map_or(true, |l| d.enhancement_level == l))
        .collect();

    if items.is_empty() {
        return Err(AppError::NotFound(format!("no detail for item {item_id}")));
    }
    Ok(Json(items))
}

async fn get_trends_report(
    State(state): State<ApiState>,
    Query(params): Query<TrendsQuery>,
) -> Result<Json<ActivityReport>, AppError> {
    let period = params.period.unwrap_or(DEFAULT_ACTIVITY_PERIOD_DAYS);
    let report = trade_activity(&state.store, Utc::now(), period, state.max_hours_back).await?;
    Ok(Json(report))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let to_ms = |us: Option<u64>| us.map(|v| v as f64 / 1000.0);
    let summary = state.latency.summary();
    Json(LatencyResponse {
        samples: summary.samples,
        p50_ms: to_ms(summary.p50_us),
        p95_ms: to_ms(summary.p95_us),
        p99_ms: to_ms(summary.p99_us),
        max_ms: to_ms(summary.max_us),
    })
}
