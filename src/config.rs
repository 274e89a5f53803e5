use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 默认曲目表格（Google Sheets CSV 导出地址）
pub const DEFAULT_CATALOG_URL: &str = "https://docs.google.com/spreadsheets/d/1B8tX9VL2PcSJKyuHFVd2UT_8kYlY4ZdwHwg9MfWOPug/export?format=csv&gid=610789839";

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }
    fn default_port() -> u16 {
        3000
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// 曲目数据源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// 远程 CSV 地址
    #[serde(default = "CatalogConfig::default_source_url")]
    pub source_url: String,
    /// 本地 CSV 文件（设置后优先于远程地址，便于离线部署）
    #[serde(default)]
    pub source_path: Option<String>,
    /// 刷新间隔（秒），默认 12 小时
    #[serde(default = "CatalogConfig::default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// 拉取超时（秒）
    #[serde(default = "CatalogConfig::default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl CatalogConfig {
    fn default_source_url() -> String {
        DEFAULT_CATALOG_URL.to_string()
    }
    fn default_refresh_interval() -> u64 {
        60 * 60 * 12
    }
    fn default_fetch_timeout() -> u64 {
        30
    }

    /// 获取刷新间隔
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    /// 获取拉取超时
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source_url: Self::default_source_url(),
            source_path: None,
            refresh_interval_secs: Self::default_refresh_interval(),
            fetch_timeout_secs: Self::default_fetch_timeout(),
        }
    }
}

/// 资源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// 静态资源根目录（同时对外提供静态文件服务）
    #[serde(default = "ResourcesConfig::default_base_path")]
    pub base_path: String,
    /// 曲绘目录（相对 base_path）
    #[serde(default = "ResourcesConfig::default_jacket_dir")]
    pub jacket_dir: String,
    /// 曲绘外部资源基地址（HTTP）；设置后按 URL 回源而不是读本地目录
    #[serde(default)]
    pub jacket_base_url: Option<String>,
    /// 背景图（相对 base_path）
    #[serde(default = "ResourcesConfig::default_background")]
    pub background: String,
    /// 字体目录
    #[serde(default = "ResourcesConfig::default_fonts_dir")]
    pub fonts_dir: String,
}

impl ResourcesConfig {
    fn default_base_path() -> String {
        "./assets".to_string()
    }
    fn default_jacket_dir() -> String {
        "jackets".to_string()
    }
    fn default_background() -> String {
        "backgrounds/hug.png".to_string()
    }
    fn default_fonts_dir() -> String {
        "./assets/fonts".to_string()
    }
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            base_path: Self::default_base_path(),
            jacket_dir: Self::default_jacket_dir(),
            jacket_base_url: None,
            background: Self::default_background(),
            fonts_dir: Self::default_fonts_dir(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// 日志格式（full / compact）
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
    fn default_format() -> String {
        "full".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: Self::default_format(),
        }
    }
}

/// 图片渲染配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRenderConfig {
    /// 渲染字体族
    #[serde(default = "ImageRenderConfig::default_font_family")]
    pub font_family: String,
    /// 是否优先速度渲染（OptimizeSpeed），提升栅格化性能，可能略降画质
    #[serde(default)]
    pub optimize_speed: bool,
    /// 是否启用成品图片缓存
    #[serde(default = "ImageRenderConfig::default_cache_enabled")]
    pub cache_enabled: bool,
    /// 缓存最大容量（字节），按图片字节大小加权
    #[serde(default = "ImageRenderConfig::default_cache_max_bytes")]
    pub cache_max_bytes: u64,
    /// 缓存 TTL（秒）
    #[serde(default = "ImageRenderConfig::default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// 缓存 TTI（秒）
    #[serde(default = "ImageRenderConfig::default_cache_tti")]
    pub cache_tti_secs: u64,
    /// 并发渲染许可数（0=自动，取 CPU 核心数）
    #[serde(default)]
    pub max_parallel: u32,
    /// 单张曲绘拉取超时（秒，仅 HTTP 曲绘源生效）
    #[serde(default = "ImageRenderConfig::default_jacket_timeout")]
    pub jacket_timeout_secs: u64,
}

impl ImageRenderConfig {
    fn default_font_family() -> String {
        "Itim".to_string()
    }
    fn default_cache_enabled() -> bool {
        true
    }
    fn default_cache_max_bytes() -> u64 {
        64 * 1024 * 1024
    }
    fn default_cache_ttl() -> u64 {
        300
    }
    fn default_cache_tti() -> u64 {
        60
    }
    fn default_jacket_timeout() -> u64 {
        10
    }

    /// 实际渲染并发数
    pub fn effective_parallelism(&self) -> usize {
        if self.max_parallel == 0 {
            num_cpus::get()
        } else {
            self.max_parallel as usize
        }
    }
}

impl Default for ImageRenderConfig {
    fn default() -> Self {
        Self {
            font_family: Self::default_font_family(),
            optimize_speed: false,
            cache_enabled: Self::default_cache_enabled(),
            cache_max_bytes: Self::default_cache_max_bytes(),
            cache_ttl_secs: Self::default_cache_ttl(),
            cache_tti_secs: Self::default_cache_tti(),
            max_parallel: 0,
            jacket_timeout_secs: Self::default_jacket_timeout(),
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 优雅退出超时时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }

    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// 曲目数据源
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 图片渲染配置
    #[serde(default)]
    pub image: ImageRenderConfig,
    /// 优雅退出配置
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖
    ///
    /// 配置文件不存在时完全使用默认值。
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            .add_source(File::from(config_path).required(false))
            // 支持环境变量覆盖，例如：APP_SERVER__PORT、APP_CATALOG__SOURCE_PATH
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        builder.try_deserialize()
    }

    /// 获取全局配置单例
    ///
    /// 未初始化时回退到默认配置（测试与工具场景）。
    pub fn global() -> &'static AppConfig {
        CONFIG.get_or_init(AppConfig::default)
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(())
    }

    /// 获取配置文件路径
    fn get_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 获取资源文件夹路径
    pub fn resources_path(&self) -> PathBuf {
        PathBuf::from(&self.resources.base_path)
    }

    /// 获取曲绘文件夹完整路径
    pub fn jacket_path(&self) -> PathBuf {
        self.resources_path().join(&self.resources.jacket_dir)
    }

    /// 获取背景图完整路径
    pub fn background_path(&self) -> PathBuf {
        self.resources_path().join(&self.resources.background)
    }

    /// 获取字体目录
    pub fn fonts_path(&self) -> PathBuf {
        PathBuf::from(&self.resources.fonts_dir)
    }
}
