use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::catalog::handler::get_song_data,
        crate::features::ranking::handler::get_ranking,
        crate::features::image::handler::render_best30,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::features::health::HealthResponse,
            crate::features::catalog::Chart,
            crate::features::catalog::DifficultyCategory,
            crate::features::catalog::handler::SongDataResponse,
            crate::features::ranking::ClearKind,
            crate::features::ranking::handler::RankingResponse,
            crate::features::ranking::handler::RankedEntryView,
        )
    ),
    tags(
        (
            name = "Image",
            description = "图片渲染：按通关记录生成 Best 30 排名图（PNG）。"
        ),
        (name = "Ranking", description = "排名：与图片同一套计算，以 JSON 返回。"),
        (name = "Catalog", description = "曲目目录：当前快照的完整转储。"),
        (name = "Health", description = "健康检查：服务探活。"),
    ),
    info(
        title = "Sekai Best 30 API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Best 30 排名图片服务（Axum + utoipa）。图片与排名接口的查询参数以谱面唯一键（如 `1append`）为键，`fc` / `ap` 为值。"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in ["/health", "/songData", "/ranking", "/img"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemas = doc.components.expect("components").schemas;
        assert!(schemas.contains_key("ErrorBody"));
        assert!(schemas.contains_key("Chart"));
    }
}
