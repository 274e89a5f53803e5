use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 通关类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClearKind {
    /// Full Combo
    Fc,
    /// All Perfect
    Ap,
}

impl ClearKind {
    /// 全部通关类型（按样式表顺序）
    pub const ALL: [ClearKind; 2] = [ClearKind::Fc, ClearKind::Ap];

    /// 只接受精确的 `fc` / `ap`，其余值（含大写、带空白）返回 `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fc" => Some(Self::Fc),
            "ap" => Some(Self::Ap),
            _ => None,
        }
    }

    /// 角标文字
    pub fn label(self) -> &'static str {
        match self {
            Self::Fc => "FC",
            Self::Ap => "AP",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Fc => 0,
            Self::Ap => 1,
        }
    }
}

/// 玩家提交的通关状态（有序，保留查询参数中的先后顺序）
///
/// 键统一转为 ASCII 小写；同一键重复出现时保留首次出现的位置，取最后一个有效值。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearStates {
    entries: Vec<(String, ClearKind)>,
    /// 键 -> entries 下标
    index: HashMap<String, usize>,
}

impl ClearStates {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut states = Self::default();
        for (key, value) in pairs {
            let Some(kind) = ClearKind::parse(value.as_ref()) else {
                continue;
            };
            let key = key.as_ref().trim();
            if key.is_empty() {
                continue;
            }
            states.insert(key.to_ascii_lowercase(), kind);
        }
        states
    }

    fn insert(&mut self, key: String, kind: ClearKind) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = kind,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, kind));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ClearKind)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
