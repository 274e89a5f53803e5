use axum::body::Bytes;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::AppConfig;
use crate::features::catalog::CatalogStore;
use crate::features::image::{BackgroundImage, JacketProvider, RenderOptions};

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// 曲目目录快照
    pub catalog: CatalogStore,
    pub jackets: Arc<JacketProvider>,
    pub background: BackgroundImage,
    /// 控制并发渲染的信号量（限制 CPU 密集型任务数量）
    pub render_semaphore: Arc<Semaphore>,
    /// 成品图片缓存（按图片字节大小加权）；关闭缓存时为 `None`
    pub image_cache: Option<Cache<String, Bytes>>,
    pub render_options: Arc<RenderOptions>,
}

impl AppState {
    pub fn from_config(config: &AppConfig, catalog: CatalogStore) -> Self {
        let image = &config.image;
        let image_cache = image.cache_enabled.then(|| {
            Cache::builder()
                .weigher(|_k: &String, v: &Bytes| v.len().try_into().unwrap_or(u32::MAX))
                .max_capacity(image.cache_max_bytes)
                .time_to_live(Duration::from_secs(image.cache_ttl_secs))
                .time_to_idle(Duration::from_secs(image.cache_tti_secs))
                .build()
        });
        let permits = image.effective_parallelism().max(1);
        tracing::info!(
            "渲染并发许可: {}, 图片缓存: {}",
            permits,
            if image.cache_enabled { "开启" } else { "关闭" }
        );

        Self {
            catalog,
            jackets: Arc::new(JacketProvider::from_config(config)),
            background: BackgroundImage::from_config(config),
            render_semaphore: Arc::new(Semaphore::new(permits)),
            image_cache,
            render_options: Arc::new(RenderOptions::from_config(config)),
        }
    }
}
