use std::sync::Arc;

use crate::features::catalog::models::{Chart, ChartCatalog};

use super::clear_state::{ClearKind, ClearStates};

/// 参与排名的谱面数
pub const TOP_N: usize = 30;

/// Full Combo 相对 All Perfect 的定数扣减
pub const FULL_COMBO_PENALTY: f64 = 1.0;

/// 单条排名结果
#[derive(Debug, Clone)]
pub struct RankedEntry {
    pub chart: Arc<Chart>,
    /// 计入排名的有效定数
    pub effective_difficulty: f64,
    pub clear_kind: ClearKind,
}

/// 排名结果
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    /// 按有效定数降序，最多 [`TOP_N`] 条
    pub entries: Vec<RankedEntry>,
    /// 综合分 = 有效定数之和 / 30（不足 30 条时同样除以 30）
    pub score: f64,
}

impl Ranking {
    /// 综合分（保留两位小数）
    pub fn formatted_score(&self) -> String {
        format!("{:.2}", self.score)
    }
}

/// 计算有效定数
pub fn effective_difficulty(diff_constant: f64, kind: ClearKind) -> f64 {
    match kind {
        ClearKind::Ap => diff_constant,
        ClearKind::Fc => diff_constant - FULL_COMBO_PENALTY,
    }
}

/// 根据通关状态与曲目目录计算 Best 30 与综合分
///
/// 目录中不存在的键直接忽略；排序稳定，有效定数相同时保持提交顺序。
pub fn compute_ranking(catalog: &ChartCatalog, clears: &ClearStates) -> Ranking {
    let mut entries: Vec<RankedEntry> = clears
        .iter()
        .filter_map(|(uid, kind)| {
            let chart = catalog.get(uid)?;
            Some(RankedEntry {
                chart: Arc::clone(chart),
                effective_difficulty: effective_difficulty(chart.diff_constant, kind),
                clear_kind: kind,
            })
        })
        .collect();

    // sort_by 为稳定排序
    entries.sort_by(|a, b| b.effective_difficulty.total_cmp(&a.effective_difficulty));
    entries.truncate(TOP_N);

    let sum: f64 = entries.iter().map(|e| e.effective_difficulty).sum();
    Ranking {
        entries,
        score: sum / TOP_N as f64,
    }
}
