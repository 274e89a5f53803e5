use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 谱面难度分类（仅影响徽章/角标样式）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, utoipa::ToSchema,
)]
pub enum DifficultyCategory {
    #[default]
    Expert,
    Master,
    Append,
}

impl DifficultyCategory {
    /// 全部分类（按样式表顺序）
    pub const ALL: [DifficultyCategory; 3] = [
        DifficultyCategory::Expert,
        DifficultyCategory::Master,
        DifficultyCategory::Append,
    ];

    /// 严格解析表格中的分类名（区分大小写，与表格一致）
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Expert" => Some(Self::Expert),
            "Master" => Some(Self::Master),
            "Append" => Some(Self::Append),
            _ => None,
        }
    }

    /// 用于拼接唯一键的小写名
    pub fn key(self) -> &'static str {
        match self {
            Self::Expert => "expert",
            Self::Master => "master",
            Self::Append => "append",
        }
    }

    /// 样式表下标
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Expert => 0,
            Self::Master => 1,
            Self::Append => 2,
        }
    }
}

impl fmt::Display for DifficultyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Expert => "Expert",
            Self::Master => "Master",
            Self::Append => "Append",
        };
        f.write_str(s)
    }
}

/// 由歌曲 ID 与难度分类拼出谱面唯一键（如 `1append`），整体小写
pub fn chart_uid(song_id: &str, category: DifficultyCategory) -> String {
    format!("{}{}", song_id.to_ascii_lowercase(), category.key())
}

/// 单张谱面（来源：曲目表格的一行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    /// 英文曲名
    #[schema(example = "Tell Your World")]
    pub song_name_en: String,
    /// 日文曲名
    pub song_name_jp: String,
    /// 难度定数
    #[schema(example = 31.5)]
    pub diff_constant: f64,
    /// 难度标签（如 "APD 30"）
    pub diff_level: String,
    /// 物量（表格缺失时为空）
    pub note_count: Option<u32>,
    /// 难度分类
    pub difficulty: DifficultyCategory,
    /// 歌曲 ID（同时用于查找曲绘）
    #[schema(example = "1")]
    pub song_id: String,
    /// 谱面唯一键 = 歌曲 ID + 难度分类
    #[schema(example = "1append")]
    pub uid: String,
}

/// 表格导入统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// 数据行数（不含表头）
    pub rows: usize,
    /// 因定数无法解析或歌曲 ID 为空而跳过的行
    pub skipped: usize,
    /// 难度分类未知、回退为 Expert 的行
    pub unknown_category: usize,
}

/// 曲目目录快照（整体替换，不原地修改）
#[derive(Debug, Default, Serialize)]
pub struct ChartCatalog {
    /// 谱面唯一键 -> 谱面
    #[serde(flatten)]
    pub by_uid: HashMap<String, Arc<Chart>>,
    /// 快照加载时间
    #[serde(skip)]
    pub loaded_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub stats: IngestStats,
}

impl ChartCatalog {
    /// 由谱面列表构建目录，重复的唯一键以后出现者为准
    pub fn from_charts(charts: impl IntoIterator<Item = Chart>) -> Self {
        let by_uid = charts
            .into_iter()
            .map(|c| (c.uid.clone(), Arc::new(c)))
            .collect();
        Self {
            by_uid,
            loaded_at: Some(Utc::now()),
            stats: IngestStats::default(),
        }
    }

    pub fn with_stats(mut self, stats: IngestStats) -> Self {
        self.stats = stats;
        self
    }

    /// 按唯一键查找谱面（ASCII 大小写不敏感，兼容 `1Append` 形式的旧链接）
    pub fn get(&self, uid: &str) -> Option<&Arc<Chart>> {
        self.by_uid
            .get(uid)
            .or_else(|| self.by_uid.get(&uid.to_ascii_lowercase()))
    }

    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }

    /// 快照版本标识（用于缓存键）
    pub fn version(&self) -> i64 {
        self.loaded_at
            .map(|t| t.timestamp_nanos_opt().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) fn test_chart(song_id: &str, category: DifficultyCategory, constant: f64) -> Chart {
    Chart {
        song_name_en: format!("Song {song_id}"),
        song_name_jp: format!("曲 {song_id}"),
        diff_constant: constant,
        diff_level: format!("{category} {}", constant.floor()),
        note_count: Some(1000),
        difficulty: category,
        song_id: song_id.to_string(),
        uid: chart_uid(song_id, category),
    }
}
