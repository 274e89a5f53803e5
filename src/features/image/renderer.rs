use crate::config::AppConfig;
use crate::error::AppError;
use resvg::usvg::{self, Options as UsvgOptions, fontdb};
use resvg::{
    render,
    tiny_skia::{Pixmap, Transform},
};
use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use super::layout::{
    DrawOp, HAlign, ImageSource, LinearGradient, Paint, Point, Scene, Shadow, Stroke, TextBox,
    VAlign,
};

mod text;

/// 字体基线相对行中心的下移比例（em）
const BASELINE_SHIFT_EM: f64 = 0.35;
/// 背景图缺失时的纯色回退
const FALLBACK_BACKGROUND: &str = "#e8eefc";

// 全局字体数据库单例
static GLOBAL_FONT_DB: OnceLock<Arc<fontdb::Database>> = OnceLock::new();

/// 栅格化选项（由配置构造后显式传入，渲染阶段不读全局配置）
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub font_family: String,
    pub optimize_speed: bool,
    pub fonts_dir: PathBuf,
}

impl RenderOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            font_family: config.image.font_family.clone(),
            optimize_speed: config.image.optimize_speed,
            fonts_dir: config.fonts_path(),
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// 渲染阶段已解析的图片（data URI）
#[derive(Debug, Default, Clone)]
pub struct ResolvedImages {
    pub background: Option<Arc<str>>,
    /// 歌曲 ID -> 曲绘
    pub jackets: HashMap<String, Arc<str>>,
}

/// 初始化全局字体数据库
fn init_global_font_db(fonts_dir: &Path) -> Arc<fontdb::Database> {
    let mut font_db = fontdb::Database::new();
    font_db.load_system_fonts();

    if let Ok(entries) = fs::read_dir(fonts_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let is_font = path
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| matches!(x.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"));
            if path.is_file()
                && is_font
                && let Err(e) = font_db.load_font_file(&path)
            {
                tracing::error!("加载字体文件失败 '{}': {}", path.display(), e);
            }
        }
    }
    tracing::info!("字体数据库初始化完成，共 {} 个字体", font_db.len());

    Arc::new(font_db)
}

/// 获取全局字体数据库（首次调用时按传入目录加载）
pub fn get_global_font_db(fonts_dir: &Path) -> Arc<fontdb::Database> {
    GLOBAL_FONT_DB
        .get_or_init(|| init_global_font_db(fonts_dir))
        .clone()
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// 场景中用到的渐变与阴影（去重后写入 `<defs>`）
#[derive(Default)]
struct Defs {
    gradients: Vec<&'static LinearGradient>,
    shadows: Vec<Shadow>,
}

impl Defs {
    fn collect(scene: &Scene) -> Self {
        let mut defs = Self::default();
        let paint = |p: Paint, defs: &mut Self| {
            if let Paint::Linear(g) = p
                && !defs.gradients.iter().any(|x| x.id == g.id)
            {
                defs.gradients.push(g);
            }
        };
        for op in &scene.ops {
            let (fill, stroke, shadow) = match op {
                DrawOp::Rect {
                    fill,
                    stroke,
                    shadow,
                    ..
                }
                | DrawOp::Polygon {
                    fill,
                    stroke,
                    shadow,
                    ..
                } => (*fill, *stroke, *shadow),
                _ => continue,
            };
            paint(fill, &mut defs);
            if let Some(s) = stroke {
                paint(s.paint, &mut defs);
            }
            if let Some(s) = shadow.filter(|s| s.opacity > 0.0)
                && !defs.shadows.contains(&s)
            {
                defs.shadows.push(s);
            }
        }
        defs
    }

    fn shadow_id(&self, shadow: Option<Shadow>) -> Option<usize> {
        let s = shadow?;
        self.shadows.iter().position(|x| *x == s)
    }

    fn write(&self, svg: &mut String) -> std::fmt::Result {
        if self.gradients.is_empty() && self.shadows.is_empty() {
            return Ok(());
        }
        svg.push_str("<defs>");
        for g in &self.gradients {
            write!(
                svg,
                r#"<linearGradient id="{}" gradientUnits="userSpaceOnUse" x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}">"#,
                g.id, g.from.x, g.from.y, g.to.x, g.to.y
            )?;
            for (offset, color) in g.stops {
                write!(svg, r#"<stop offset="{offset}" stop-color="{color}"/>"#)?;
            }
            svg.push_str("</linearGradient>");
        }
        for (i, s) in self.shadows.iter().enumerate() {
            write!(
                svg,
                r#"<filter id="shadow-{i}" x="-20%" y="-20%" width="140%" height="160%"><feDropShadow dx="{}" dy="{}" stdDeviation="{}" flood-color="{}" flood-opacity="{}"/></filter>"#,
                s.offset.x,
                s.offset.y,
                s.blur / 2.0,
                s.color,
                s.opacity
            )?;
        }
        svg.push_str("</defs>");
        Ok(())
    }
}

fn paint_attr(p: Paint) -> String {
    match p {
        Paint::Solid(c) => c.to_string(),
        Paint::Linear(g) => format!("url(#{})", g.id),
    }
}

fn shape_attrs(fill: Paint, stroke: Option<Stroke>, filter: Option<usize>) -> String {
    let mut attrs = format!(r#"fill="{}""#, paint_attr(fill));
    if let Some(s) = stroke {
        let _ = write!(
            attrs,
            r#" stroke="{}" stroke-width="{}""#,
            paint_attr(s.paint),
            s.width
        );
    }
    if let Some(i) = filter {
        let _ = write!(attrs, r#" filter="url(#shadow-{i})""#);
    }
    attrs
}

fn write_text(svg: &mut String, tb: &TextBox, font_family: &str) -> std::fmt::Result {
    let lines = if tb.wrap {
        text::fit_lines(&tb.text, tb.width, tb.height, tb.font_size, tb.line_height)
    } else {
        vec![tb.text.clone()]
    };
    let line_px = tb.font_size * tb.line_height;
    let block = line_px * lines.len() as f64;
    let top = match tb.valign {
        VAlign::Top => tb.origin.y,
        VAlign::Middle => tb.origin.y + (tb.height - block) / 2.0,
    };
    let (x, anchor) = match tb.align {
        HAlign::Left => (tb.origin.x, "start"),
        HAlign::Center => (tb.origin.x + tb.width / 2.0, "middle"),
        HAlign::Right => (tb.origin.x + tb.width, "end"),
    };
    for (i, line) in lines.iter().enumerate() {
        let baseline = top + line_px * (i as f64 + 0.5) + tb.font_size * BASELINE_SHIFT_EM;
        write!(
            svg,
            r#"<text x="{x:.2}" y="{baseline:.2}" font-family="{}" font-size="{}" fill="{}" text-anchor="{anchor}">{}</text>"#,
            escape_xml(font_family),
            tb.font_size,
            tb.fill,
            escape_xml(line)
        )?;
    }
    Ok(())
}

fn write_op(
    svg: &mut String,
    op: &DrawOp,
    defs: &Defs,
    images: &ResolvedImages,
    font_family: &str,
) -> std::fmt::Result {
    match op {
        DrawOp::Rect {
            origin,
            width,
            height,
            corner_radius,
            fill,
            stroke,
            shadow,
        } => write!(
            svg,
            r#"<g transform="translate({:.2} {:.2})"><rect width="{width:.2}" height="{height:.2}" rx="{corner_radius}" {}/></g>"#,
            origin.x,
            origin.y,
            shape_attrs(*fill, *stroke, defs.shadow_id(*shadow))
        ),
        DrawOp::Polygon {
            origin,
            points,
            fill,
            stroke,
            shadow,
        } => {
            let pts = points
                .iter()
                .map(|Point { x, y }| format!("{x:.2},{y:.2}"))
                .collect::<Vec<_>>()
                .join(" ");
            write!(
                svg,
                r#"<g transform="translate({:.2} {:.2})"><polygon points="{pts}" {}/></g>"#,
                origin.x,
                origin.y,
                shape_attrs(*fill, *stroke, defs.shadow_id(*shadow))
            )
        }
        DrawOp::Text(tb) => write_text(svg, tb, font_family),
        DrawOp::Image {
            origin,
            width,
            height,
            source,
        } => {
            let href = match source {
                ImageSource::Background => images.background.as_deref(),
                ImageSource::Jacket { song_id } => images.jackets.get(song_id).map(|s| &**s),
            };
            match (href, source) {
                (Some(href), _) => write!(
                    svg,
                    r#"<image x="{:.2}" y="{:.2}" width="{width:.2}" height="{height:.2}" preserveAspectRatio="xMidYMid slice" href="{href}"/>"#,
                    origin.x, origin.y
                ),
                (None, ImageSource::Background) => write!(
                    svg,
                    r#"<rect x="{:.2}" y="{:.2}" width="{width:.2}" height="{height:.2}" fill="{FALLBACK_BACKGROUND}"/>"#,
                    origin.x, origin.y
                ),
                // 曲绘缺失：留空
                (None, ImageSource::Jacket { .. }) => Ok(()),
            }
        }
    }
}

/// 场景 -> SVG 文本
pub fn scene_to_svg(
    scene: &Scene,
    images: &ResolvedImages,
    font_family: &str,
) -> Result<String, AppError> {
    let defs = Defs::collect(scene);
    let mut svg = String::with_capacity(
        64 * 1024 + images.jackets.values().map(|s| s.len()).sum::<usize>(),
    );
    let build = |svg: &mut String| -> std::fmt::Result {
        write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = scene.width,
            h = scene.height
        )?;
        defs.write(svg)?;
        for op in &scene.ops {
            write_op(svg, op, &defs, images, font_family)?;
        }
        svg.push_str("</svg>");
        Ok(())
    };
    build(&mut svg).map_err(|e| AppError::ImageRendererError(format!("SVG 生成失败: {e}")))?;
    Ok(svg)
}

pub fn render_svg_to_png(svg_data: &str, options: &RenderOptions) -> Result<Vec<u8>, AppError> {
    // 分段计时，定位瓶颈
    let t0 = std::time::Instant::now();

    let speed = options.optimize_speed;
    let opts = UsvgOptions {
        fontdb: get_global_font_db(&options.fonts_dir),
        font_family: options.font_family.clone(),
        font_size: 16.0,
        languages: vec!["en".to_string(), "ja".to_string()],
        shape_rendering: if speed {
            usvg::ShapeRendering::OptimizeSpeed
        } else {
            usvg::ShapeRendering::GeometricPrecision
        },
        text_rendering: if speed {
            usvg::TextRendering::OptimizeSpeed
        } else {
            usvg::TextRendering::OptimizeLegibility
        },
        image_rendering: if speed {
            usvg::ImageRendering::OptimizeSpeed
        } else {
            usvg::ImageRendering::OptimizeQuality
        },
        ..Default::default()
    };

    let tree = usvg::Tree::from_data(svg_data.as_bytes(), &opts)
        .map_err(|e| AppError::ImageRendererError(format!("Failed to parse SVG: {e}")))?;
    let t_parse = t0.elapsed();

    let pixmap_size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(pixmap_size.width(), pixmap_size.height())
        .ok_or_else(|| AppError::ImageRendererError("Failed to create pixmap".to_string()))?;

    render(&tree, Transform::default(), &mut pixmap.as_mut());
    let t_raster = t0.elapsed();

    let mut out = Vec::with_capacity((pixmap_size.width() * pixmap_size.height()) as usize);
    {
        let mut encoder = png::Encoder::new(&mut out, pixmap_size.width(), pixmap_size.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        if speed {
            encoder.set_compression(png::Compression::Fast);
            encoder.set_filter(png::FilterType::NoFilter);
        } else {
            encoder.set_compression(png::Compression::Default);
            encoder.set_filter(png::FilterType::Paeth);
        }
        let mut writer = encoder
            .write_header()
            .map_err(|e| AppError::ImageRendererError(format!("PNG write_header error: {e}")))?;
        writer.write_image_data(pixmap.data()).map_err(|e| {
            AppError::ImageRendererError(format!("PNG write_image_data error: {e}"))
        })?;
        writer
            .finish()
            .map_err(|e| AppError::ImageRendererError(format!("PNG finish error: {e}")))?;
    }
    let t_encode = t0.elapsed();

    tracing::info!(
        target: "best30_performance",
        "PNG渲染内部分段: 解析={:?}, 栅格化={:?}, 编码={:?}, 总计={:?}",
        t_parse,
        t_raster - t_parse,
        t_encode - t_raster,
        t_encode
    );

    Ok(out)
}

/// 在阻塞线程池中栅格化，避免占用 tokio worker
pub async fn render_png(svg: String, options: Arc<RenderOptions>) -> Result<Vec<u8>, AppError> {
    tokio::task::spawn_blocking(move || render_svg_to_png(&svg, &options))
        .await
        .map_err(|e| AppError::Internal(format!("阻塞渲染任务执行失败: {e}")))?
}
