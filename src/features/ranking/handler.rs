use axum::{
    Router,
    extract::{Query, State},
    response::Json,
    routing::get,
};
use serde::Serialize;

use crate::error::AppError;
use crate::features::catalog::models::DifficultyCategory;
use crate::state::AppState;

use super::{
    clear_state::{ClearKind, ClearStates},
    engine::{Ranking, compute_ranking},
};

/// 单条排名
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntryView {
    /// 名次（从 0 开始）
    pub rank: usize,
    #[schema(example = "1append")]
    pub uid: String,
    pub song_id: String,
    pub song_name_en: String,
    pub difficulty: DifficultyCategory,
    pub diff_constant: f64,
    /// 有效定数（FC 扣减后）
    pub effective_difficulty: f64,
    pub clear_kind: ClearKind,
}

/// `/ranking` 响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RankingResponse {
    /// 综合分
    #[schema(example = 0.5)]
    pub score: f64,
    /// 综合分（两位小数）
    #[schema(example = "0.50")]
    pub formatted_score: String,
    pub entries: Vec<RankedEntryView>,
}

impl From<&Ranking> for RankingResponse {
    fn from(r: &Ranking) -> Self {
        Self {
            score: r.score,
            formatted_score: r.formatted_score(),
            entries: r
                .entries
                .iter()
                .enumerate()
                .map(|(rank, e)| RankedEntryView {
                    rank,
                    uid: e.chart.uid.clone(),
                    song_id: e.chart.song_id.clone(),
                    song_name_en: e.chart.song_name_en.clone(),
                    difficulty: e.chart.difficulty,
                    diff_constant: e.chart.diff_constant,
                    effective_difficulty: e.effective_difficulty,
                    clear_kind: e.clear_kind,
                })
                .collect(),
        }
    }
}

/// 从查询参数计算排名（`/img` 与 `/ranking` 共用）
pub(crate) fn ranking_from_query(
    state: &AppState,
    pairs: &[(String, String)],
) -> Result<(Ranking, i64), AppError> {
    let catalog = state.catalog.snapshot()?;
    let clears = ClearStates::from_pairs(pairs.iter().map(|(k, v)| (k, v)));
    Ok((compute_ranking(&catalog, &clears), catalog.version()))
}

#[utoipa::path(
    get,
    path = "/ranking",
    summary = "计算 Best 30 排名（JSON）",
    description = "查询参数形如 `?1append=ap&7master=fc`：键为谱面唯一键，值只接受 `fc` / `ap`，其余值与未知键会被忽略。",
    params(
        ("uid" = Option<ClearKind>, Query, description = "以谱面唯一键作参数名，如 `1append=ap`，可重复多个")
    ),
    responses(
        (status = 200, description = "排名结果", body = RankingResponse),
        (status = 500, description = "目录尚未加载或为空", body = crate::error::ErrorBody)
    ),
    tag = "Ranking"
)]
pub async fn get_ranking(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<RankingResponse>, AppError> {
    let (ranking, _) = ranking_from_query(&state, &pairs)?;
    Ok(Json(RankingResponse::from(&ranking)))
}

pub fn create_ranking_router() -> Router<AppState> {
    Router::new().route("/ranking", get(get_ranking))
}
