use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

/// 健康检查响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// 服务状态（目录未就绪时为 `degraded`）
    #[schema(example = "healthy")]
    pub status: String,
    /// 服务名称
    #[schema(example = "sekai-best30")]
    pub service: String,
    /// 当前版本（Cargo package version）
    #[schema(example = "0.1.0")]
    pub version: String,
    /// 当前目录快照中的谱面数
    pub chart_count: usize,
    /// 当前目录快照加载时间
    #[schema(value_type = Option<String>, format = DateTime)]
    pub catalog_loaded_at: Option<DateTime<Utc>>,
}

#[utoipa::path(
    get,
    path = "/health",
    summary = "健康检查",
    description = "用于探活的健康检查端点，返回服务状态、版本与曲目目录快照信息。",
    responses((status = 200, description = "服务存活", body = HealthResponse)),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = state.catalog.snapshot().ok();
    let status = if snapshot.is_some() {
        "healthy"
    } else {
        "degraded"
    };
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: status.to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            chart_count: snapshot.as_deref().map_or(0, |c| c.len()),
            catalog_loaded_at: snapshot.and_then(|c| c.loaded_at),
        }),
    )
}
