use crate::config::AppConfig;
use crate::error::AppError;
use std::fs;
use std::path::Path;

/// 执行启动检查
///
/// 只有资源根目录无法创建时才失败；曲绘/背景/字体缺失仅告警，
/// 对应位置在渲染时留空或回退。
pub fn run_startup_checks(config: &AppConfig) -> Result<(), AppError> {
    tracing::info!("开始执行启动检查...");

    ensure_resources_folder(config)?;

    if config.resources.jacket_base_url.is_none() {
        check_dir("曲绘目录", &config.jacket_path());
    } else {
        tracing::info!(
            "曲绘来源: {}",
            config.resources.jacket_base_url.as_deref().unwrap_or_default()
        );
    }

    let background = config.background_path();
    if background.is_file() {
        tracing::info!("背景图存在: {:?}", background);
    } else {
        tracing::warn!("未找到背景图 {:?}，将使用纯色背景", background);
    }

    ensure_font_resources(&config.fonts_path());

    tracing::info!("启动检查完成");
    Ok(())
}

/// 确保资源根目录存在
fn ensure_resources_folder(config: &AppConfig) -> Result<(), AppError> {
    let resources_path = config.resources_path();

    if !resources_path.exists() {
        tracing::warn!("未找到资源目录，正在创建: {:?}", resources_path);
        fs::create_dir_all(&resources_path)
            .map_err(|e| AppError::Internal(format!("创建资源目录失败: {e}")))?;
    }
    Ok(())
}

fn check_dir(what: &str, path: &Path) {
    if path.is_dir() {
        tracing::info!("{}存在: {:?}", what, path);
    } else {
        tracing::warn!("未找到{} {:?}，曲绘位置将留空", what, path);
    }
}

/// 统计字体目录下的字体文件（仅告警，不阻断启动）
fn ensure_font_resources(font_dir: &Path) -> usize {
    let count = fs::read_dir(font_dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| {
                    e.path()
                        .extension()
                        .and_then(|x| x.to_str())
                        .is_some_and(|x| {
                            matches!(x.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc")
                        })
                })
                .count()
        })
        .unwrap_or(0);
    if count == 0 {
        tracing::warn!("字体目录 {:?} 中没有字体文件，将回退到系统字体", font_dir);
    } else {
        tracing::info!("字体目录 {:?} 中有 {} 个字体文件", font_dir, count);
    }
    count
}
