//! 曲绘与背景图
//!
//! 图片统一解码后按目标尺寸裁剪填充，再编码为 JPEG Data URI 嵌入 SVG。

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as base64_engine};
use futures_util::future::join_all;
use image::ColorType;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use lru::LruCache;

use super::layout::{CANVAS_HEIGHT, CANVAS_WIDTH, JACKET_SIZE};
use crate::config::AppConfig;
use crate::error::JacketError;

const JACKET_CACHE_SIZE: usize = 512;
const JPEG_QUALITY: u8 = 85;

/// 曲绘文件名：歌曲 ID 左侧补零到 3 位
pub fn jacket_file_name(song_id: &str) -> String {
    format!("jacket_s_{song_id:0>3}.png")
}

/// 解码 -> 裁剪填充（xMidYMid slice）-> JPEG Data URI
fn encode_data_uri(
    bytes: &[u8],
    target_w: u32,
    target_h: u32,
    speed: bool,
) -> Result<String, JacketError> {
    let filter = if speed {
        FilterType::Triangle
    } else {
        FilterType::Lanczos3
    };
    let img = image::load_from_memory(bytes)?;
    let rgb = img.resize_to_fill(target_w, target_h, filter).to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode(
        &rgb,
        target_w,
        target_h,
        ColorType::Rgb8.into(),
    )?;
    Ok(format!(
        "data:image/jpeg;base64,{}",
        base64_engine.encode(out)
    ))
}

async fn encode_blocking(
    bytes: Vec<u8>,
    target_w: u32,
    target_h: u32,
    speed: bool,
) -> Result<String, JacketError> {
    tokio::task::spawn_blocking(move || encode_data_uri(&bytes, target_w, target_h, speed))
        .await
        .map_err(|e| JacketError::Io(format!("解码任务失败: {e}")))?
}

/// 曲绘来源
#[derive(Debug, Clone)]
pub enum JacketSource {
    /// 本地目录
    Disk { dir: PathBuf },
    /// HTTP 静态资源（`{base_url}/jacket_s_007.png`）
    Http { base_url: String, timeout: Duration },
}

impl JacketSource {
    pub fn from_config(config: &AppConfig) -> Self {
        match &config.resources.jacket_base_url {
            Some(url) if !url.trim().is_empty() => Self::Http {
                base_url: url.trim_end_matches('/').to_string(),
                timeout: Duration::from_secs(config.image.jacket_timeout_secs.max(1)),
            },
            _ => Self::Disk {
                dir: config.jacket_path(),
            },
        }
    }

    async fn read(&self, song_id: &str) -> Result<Vec<u8>, JacketError> {
        // ID 只允许字母数字，防止拼出目录穿越路径
        if song_id.is_empty() || !song_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(JacketError::NotFound(song_id.to_string()));
        }
        let name = jacket_file_name(song_id);
        match self {
            Self::Disk { dir } => Ok(tokio::fs::read(dir.join(name)).await?),
            Self::Http { base_url, timeout } => {
                let client = crate::http::client_jacket(*timeout)?;
                let resp = client.get(format!("{base_url}/{name}")).send().await?;
                if resp.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(JacketError::NotFound(name));
                }
                Ok(resp.error_for_status()?.bytes().await?.to_vec())
            }
        }
    }
}

/// 曲绘加载器（进程内共享，缩放结果按歌曲 ID 缓存）
pub struct JacketProvider {
    source: JacketSource,
    side: u32,
    optimize_speed: bool,
    cache: Mutex<LruCache<String, Arc<str>>>,
}

impl JacketProvider {
    pub fn new(source: JacketSource, optimize_speed: bool) -> Self {
        let cap = NonZeroUsize::new(JACKET_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            side: JACKET_SIZE.ceil() as u32,
            optimize_speed,
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(JacketSource::from_config(config), config.image.optimize_speed)
    }

    fn cached(&self, song_id: &str) -> Option<Arc<str>> {
        self.cache.lock().ok()?.get(song_id).cloned()
    }

    /// 加载单张曲绘
    pub async fn load_jacket(&self, song_id: &str) -> Result<Arc<str>, JacketError> {
        if let Some(uri) = self.cached(song_id) {
            return Ok(uri);
        }
        let bytes = self.source.read(song_id).await?;
        let uri: Arc<str> =
            Arc::from(encode_blocking(bytes, self.side, self.side, self.optimize_speed).await?);
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(song_id.to_string(), uri.clone());
        }
        Ok(uri)
    }

    /// 并发加载一组曲绘；失败的条目只记录日志，不影响其它条目
    pub async fn fetch_jackets(&self, song_ids: &[String]) -> HashMap<String, Arc<str>> {
        let results = join_all(song_ids.iter().map(|id| async move {
            (id, self.load_jacket(id).await)
        }))
        .await;

        let mut out = HashMap::with_capacity(results.len());
        for (id, res) in results {
            match res {
                Ok(uri) => {
                    out.insert(id.clone(), uri);
                }
                Err(e) => tracing::warn!("加载曲绘失败: song_id={}, {}", id, e),
            }
        }
        out
    }
}

/// 背景图：首次成功加载后进程内常驻
///
/// 并发的首次加载各自读取，先写入者生效；失败不缓存，下次请求重试。
#[derive(Clone)]
pub struct BackgroundImage {
    path: PathBuf,
    optimize_speed: bool,
    cached: Arc<OnceLock<Arc<str>>>,
}

impl BackgroundImage {
    pub fn new(path: impl Into<PathBuf>, optimize_speed: bool) -> Self {
        Self {
            path: path.into(),
            optimize_speed,
            cached: Arc::new(OnceLock::new()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.background_path(), config.image.optimize_speed)
    }

    pub async fn get(&self) -> Option<Arc<str>> {
        if let Some(uri) = self.cached.get() {
            return Some(uri.clone());
        }
        let loaded = match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                encode_blocking(
                    bytes,
                    CANVAS_WIDTH as u32,
                    CANVAS_HEIGHT as u32,
                    self.optimize_speed,
                )
                .await
            }
            Err(e) => Err(e.into()),
        };
        match loaded {
            Ok(uri) => {
                let uri = self.cached.get_or_init(|| Arc::from(uri)).clone();
                tracing::info!("背景图已缓存: {}", self.path.display());
                Some(uri)
            }
            Err(e) => {
                tracing::warn!(
                    "背景图加载失败，使用纯色背景: {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sekai-best30-jacket-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn write_png(path: &Path, w: u32, h: u32) {
        RgbImage::from_pixel(w, h, Rgb([200, 40, 120]))
            .save(path)
            .expect("write png");
    }

    #[test]
    fn file_name_is_zero_padded() {
        assert_eq!(jacket_file_name("7"), "jacket_s_007.png");
        assert_eq!(jacket_file_name("42"), "jacket_s_042.png");
        assert_eq!(jacket_file_name("512"), "jacket_s_512.png");
    }

    #[test]
    fn encoded_jacket_is_resized_to_target() {
        let dir = temp_dir("encode");
        let path = dir.join("src.png");
        write_png(&path, 120, 60);
        let bytes = std::fs::read(&path).expect("read png");
        let uri = encode_data_uri(&bytes, 79, 79, true).expect("encode");
        let b64 = uri
            .strip_prefix("data:image/jpeg;base64,")
            .expect("jpeg data uri");
        let jpeg = base64_engine.decode(b64).expect("base64");
        let img = image::load_from_memory(&jpeg).expect("decode jpeg");
        assert_eq!((img.width(), img.height()), (79, 79));
    }

    #[test]
    fn invalid_bytes_are_rejected() {
        assert!(matches!(
            encode_data_uri(b"not an image", 10, 10, true),
            Err(JacketError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn fan_out_skips_failed_jackets() {
        let dir = temp_dir("fanout");
        write_png(&dir.join("jacket_s_001.png"), 32, 32);
        write_png(&dir.join("jacket_s_012.png"), 32, 32);
        let provider = JacketProvider::new(JacketSource::Disk { dir }, true);

        let ids = ["1", "404", "12", "../1"].map(String::from);
        let jackets = provider.fetch_jackets(&ids).await;
        assert_eq!(jackets.len(), 2);
        assert!(jackets.contains_key("1"));
        assert!(jackets.contains_key("12"));

        assert!(matches!(
            provider.load_jacket("404").await,
            Err(JacketError::NotFound(_))
        ));
        // 第二次命中缓存
        assert!(Arc::ptr_eq(
            &provider.load_jacket("1").await.expect("cached"),
            &jackets["1"]
        ));
    }

    #[tokio::test]
    async fn background_is_cached_after_first_load() {
        let dir = temp_dir("background");
        let path = dir.join("bg.png");
        let _ = std::fs::remove_file(&path);
        let bg = BackgroundImage::new(&path, true);
        assert!(bg.get().await.is_none());

        write_png(&path, 50, 75);
        let first = bg.get().await.expect("background");
        std::fs::remove_file(&path).expect("remove background");
        let second = bg.clone().get().await.expect("cached background");
        assert!(Arc::ptr_eq(&first, &second));
    }
}
