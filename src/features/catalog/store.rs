use std::sync::{Arc, RwLock};

use crate::error::AppError;

use super::models::ChartCatalog;

/// 进程级曲目目录
///
/// 读者拿到的是某一时刻的完整快照（`Arc` 克隆），刷新任务只做整体替换；
/// 锁内只有指针的克隆/替换，不会跨 await 持有。
#[derive(Clone, Default)]
pub struct CatalogStore {
    inner: Arc<RwLock<Option<Arc<ChartCatalog>>>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已加载的目录初始化
    pub fn with_catalog(catalog: ChartCatalog) -> Self {
        let store = Self::new();
        store.replace(catalog);
        store
    }

    /// 当前快照；未加载或为空时返回 `CatalogUnavailable`
    pub fn snapshot(&self) -> Result<Arc<ChartCatalog>, AppError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| AppError::Internal("曲目目录锁已中毒".to_string()))?;
        match guard.as_ref() {
            Some(catalog) if !catalog.is_empty() => Ok(Arc::clone(catalog)),
            Some(_) => Err(AppError::CatalogUnavailable("目录为空".to_string())),
            None => Err(AppError::CatalogUnavailable("目录尚未加载".to_string())),
        }
    }

    /// 整体替换快照，返回旧快照（若有）
    pub fn replace(&self, catalog: ChartCatalog) -> Option<Arc<ChartCatalog>> {
        let next = Arc::new(catalog);
        match self.inner.write() {
            Ok(mut guard) => guard.replace(next),
            Err(poisoned) => poisoned.into_inner().replace(next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::catalog::models::{DifficultyCategory, test_chart};

    #[test]
    fn unloaded_and_empty_catalogs_are_unavailable() {
        let store = CatalogStore::new();
        assert!(matches!(
            store.snapshot(),
            Err(AppError::CatalogUnavailable(_))
        ));

        store.replace(ChartCatalog::default());
        assert!(matches!(
            store.snapshot(),
            Err(AppError::CatalogUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn readers_keep_their_snapshot_across_replace() {
        let store = CatalogStore::with_catalog(ChartCatalog::from_charts([test_chart(
            "1",
            DifficultyCategory::Master,
            30.0,
        )]));
        let held = store.snapshot().expect("snapshot");

        let reader = {
            let store = store.clone();
            tokio::spawn(async move { store.snapshot().map(|c| c.len()) })
        };

        let old = store.replace(ChartCatalog::from_charts([
            test_chart("2", DifficultyCategory::Expert, 25.0),
            test_chart("3", DifficultyCategory::Append, 28.0),
        ]));

        assert!(old.is_some_and(|c| Arc::ptr_eq(&c, &held)));
        assert_eq!(held.len(), 1);
        assert!(held.get("1master").is_some());

        let seen = reader.await.expect("join").expect("snapshot");
        assert!(seen == 1 || seen == 2);
        assert_eq!(store.snapshot().expect("snapshot").len(), 2);
    }
}
