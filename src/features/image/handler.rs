use std::time::Instant;

use axum::body::Bytes;
use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use sha2::{Digest, Sha256};

use crate::{
    error::AppError,
    features::ranking::{Ranking, handler::ranking_from_query},
    state::AppState,
};

use super::layout::build_scene;
use super::renderer::{self, ResolvedImages};

/// 成品图缓存键：目录版本 + 排名条目（唯一键与通关类型）
///
/// 同一组条目在同一份目录快照下渲染结果一致；目录刷新后版本变化，旧条目自然失效。
pub(crate) fn cache_key(catalog_version: i64, ranking: &Ranking) -> String {
    let mut hasher = Sha256::new();
    hasher.update(catalog_version.to_le_bytes());
    for e in &ranking.entries {
        hasher.update(e.chart.uid.as_bytes());
        hasher.update([b'=']);
        hasher.update(e.clear_kind.label().as_bytes());
        hasher.update([b';']);
    }
    hex::encode(hasher.finalize())
}

fn png_response(bytes: Bytes) -> impl IntoResponse {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    (StatusCode::OK, headers, bytes)
}

#[utoipa::path(
    get,
    path = "/img",
    summary = "生成 Best 30 排名图片",
    description = "查询参数形如 `?1append=ap&7master=fc`：键为谱面唯一键，值只接受 `fc` / `ap`。按有效定数取前 30 张谱面绘制 3×10 网格（PNG）。",
    params(
        ("uid" = Option<crate::features::ranking::ClearKind>, Query, description = "以谱面唯一键作参数名，如 `1append=ap`，可重复多个")
    ),
    responses(
        (status = 200, description = "PNG bytes of the Best 30 image"),
        (status = 500, description = "目录不可用或渲染失败", body = crate::error::ErrorBody)
    ),
    tag = "Image"
)]
pub async fn render_best30(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let t_total = Instant::now();

    let (ranking, version) = ranking_from_query(&state, &pairs)?;
    let key = cache_key(version, &ranking);

    if let Some(cache) = state.image_cache.as_ref()
        && let Some(bytes) = cache.get(&key).await
    {
        tracing::info!(target: "best30_performance", "缓存命中，条目数: {}, 总耗时: {:?}ms", ranking.entries.len(), t_total.elapsed().as_millis());
        return Ok(png_response(bytes));
    }

    let t_layout = Instant::now();
    let scene = build_scene(&ranking);
    let jacket_ids = scene.jacket_ids();
    tracing::info!(target: "best30_performance", "布局完成，绘制指令: {}, 耗时: {:?}µs", scene.ops.len(), t_layout.elapsed().as_micros());

    let t_fetch = Instant::now();
    let (jackets, background) = tokio::join!(
        state.jackets.fetch_jackets(&jacket_ids),
        state.background.get()
    );
    tracing::info!(target: "best30_performance", "图片资源就绪，曲绘 {}/{}, 背景: {}, 耗时: {:?}ms",
                   jackets.len(), jacket_ids.len(), background.is_some(), t_fetch.elapsed().as_millis());

    // 背景或曲绘缺失的成品不入缓存，资源补齐后下次请求重新渲染
    let complete = background.is_some() && jackets.len() == jacket_ids.len();
    let images = ResolvedImages {
        background,
        jackets,
    };
    let svg = renderer::scene_to_svg(&scene, &images, &state.render_options.font_family)?;

    let sem = state.render_semaphore.clone();
    let permits_avail = sem.available_permits();
    let t_wait = Instant::now();
    let _permit = sem
        .acquire_owned()
        .await
        .map_err(|e| AppError::Internal(format!("获取渲染信号量失败: {e}")))?;
    tracing::info!(target: "best30_performance", "信号量获取完成，可用许可: {}, 等待时间: {:?}ms", permits_avail, t_wait.elapsed().as_millis());

    let t_render = Instant::now();
    let bytes = Bytes::from(renderer::render_png(svg, state.render_options.clone()).await?);
    tracing::info!(target: "best30_performance", "图片渲染完成，字节大小: {}, 耗时: {:?}ms", bytes.len(), t_render.elapsed().as_millis());

    if complete && let Some(cache) = state.image_cache.as_ref() {
        cache.insert(key, bytes.clone()).await;
    }

    tracing::info!(target: "best30_performance", "Best 30 图片生成完成，总耗时: {:?}ms", t_total.elapsed().as_millis());
    Ok(png_response(bytes))
}

pub fn create_image_router() -> Router<AppState> {
    Router::new().route("/img", get(render_best30))
}
