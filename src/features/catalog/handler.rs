use std::collections::HashMap;

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Json},
    routing::get,
};

use crate::error::AppError;
use crate::state::AppState;

use super::models::Chart;

/// `/songData` 响应：谱面唯一键 -> 谱面（仅用于文档）
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct SongDataResponse(HashMap<String, Chart>);

#[utoipa::path(
    get,
    path = "/songData",
    summary = "当前曲目目录",
    description = "返回当前内存中的曲目目录快照，键为谱面唯一键（歌曲 ID + 小写难度分类，如 `1append`）。",
    responses(
        (status = 200, description = "目录快照", body = SongDataResponse),
        (status = 500, description = "目录尚未加载或为空", body = crate::error::ErrorBody)
    ),
    tag = "Catalog"
)]
pub async fn get_song_data(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let catalog = state.catalog.snapshot()?;
    Ok(Json(catalog))
}

pub fn create_catalog_router() -> Router<AppState> {
    Router::new().route("/songData", get(get_song_data))
}
