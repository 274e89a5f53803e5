use std::{io::Read, path::PathBuf, time::Duration};

use crate::{
    config::AppConfig,
    error::AppError,
    features::catalog::{
        models::{Chart, ChartCatalog, DifficultyCategory, IngestStats, chart_uid},
        store::CatalogStore,
    },
    shutdown::ShutdownManager,
};

// 表格列位置（首行为表头，按位置取值）
const COL_NAME_EN: usize = 0;
const COL_NAME_JP: usize = 1;
const COL_DIFF_CONSTANT: usize = 2;
const COL_DIFF_LEVEL: usize = 3;
const COL_NOTE_COUNT: usize = 4;
const COL_DIFFICULTY: usize = 5;
const COL_SONG_ID: usize = 6;

/// 曲目表格来源
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// 远程 CSV 导出地址
    Remote { url: String, timeout: Duration },
    /// 本地 CSV 文件
    File { path: PathBuf },
}

impl CatalogSource {
    /// 按配置选择来源：设置了本地文件时优先使用本地文件
    pub fn from_config(config: &AppConfig) -> Self {
        match &config.catalog.source_path {
            Some(path) if !path.trim().is_empty() => Self::File {
                path: PathBuf::from(path),
            },
            _ => Self::Remote {
                url: config.catalog.source_url.clone(),
                timeout: config.catalog.fetch_timeout(),
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Remote { url, .. } => url.clone(),
            Self::File { path } => path.display().to_string(),
        }
    }
}

/// 解析曲目表格
///
/// 定数无法解析或歌曲 ID 为空的行会被跳过并记录；未知难度分类回退为 Expert。
/// 只有表格整体不可读时才返回错误。
pub fn parse_catalog_csv<R: Read>(reader: R) -> Result<ChartCatalog, AppError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut stats = IngestStats::default();
    let mut charts = Vec::new();

    for (idx, rec) in rdr.records().enumerate() {
        // 表头占第 1 行
        let line = idx + 2;
        let record = match rec {
            Ok(r) => r,
            // 编码错误只影响当前行；其余错误（如 I/O）说明表格整体不可读
            Err(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => {
                tracing::warn!("第 {} 行不是合法 UTF-8，已跳过: {}", line, e);
                stats.rows += 1;
                stats.skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        stats.rows += 1;

        let field = |i: usize| record.get(i).map(str::trim).unwrap_or("");

        let song_id = field(COL_SONG_ID);
        if song_id.is_empty() {
            tracing::debug!("第 {} 行缺少歌曲 ID，已跳过", line);
            stats.skipped += 1;
            continue;
        }

        let diff_constant = match field(COL_DIFF_CONSTANT).parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                tracing::warn!(
                    "第 {} 行定数无法解析 ({:?})，已跳过: song_id={}",
                    line,
                    field(COL_DIFF_CONSTANT),
                    song_id
                );
                stats.skipped += 1;
                continue;
            }
        };

        let raw_category = field(COL_DIFFICULTY);
        let difficulty = DifficultyCategory::parse(raw_category).unwrap_or_else(|| {
            tracing::warn!(
                "第 {} 行难度分类未知 ({:?})，回退为 Expert: song_id={}",
                line,
                raw_category,
                song_id
            );
            stats.unknown_category += 1;
            DifficultyCategory::Expert
        });

        charts.push(Chart {
            song_name_en: field(COL_NAME_EN).to_string(),
            song_name_jp: field(COL_NAME_JP).to_string(),
            diff_constant,
            diff_level: field(COL_DIFF_LEVEL).to_string(),
            note_count: field(COL_NOTE_COUNT).parse::<u32>().ok(),
            difficulty,
            song_id: song_id.to_string(),
            uid: chart_uid(song_id, difficulty),
        });
    }

    Ok(ChartCatalog::from_charts(charts).with_stats(stats))
}

/// 拉取并解析曲目表格
pub async fn fetch_catalog(source: &CatalogSource) -> Result<ChartCatalog, AppError> {
    let t0 = std::time::Instant::now();
    let bytes = match source {
        CatalogSource::Remote { url, timeout } => {
            let client = crate::http::client_catalog(*timeout)
                .map_err(|e| AppError::Internal(format!("创建 HTTP Client 失败: {e}")))?;
            let resp = client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| AppError::CatalogSource(format!("拉取曲目表格失败: {e}")))?;
            resp.bytes()
                .await
                .map_err(|e| AppError::CatalogSource(format!("读取曲目表格失败: {e}")))?
                .to_vec()
        }
        CatalogSource::File { path } => tokio::fs::read(path).await.map_err(|e| {
            AppError::CatalogSource(format!("读取曲目文件失败 {}: {e}", path.display()))
        })?,
    };

    let catalog = tokio::task::spawn_blocking(move || parse_catalog_csv(bytes.as_slice()))
        .await
        .map_err(|e| AppError::Internal(format!("解析任务失败: {e}")))??;

    let s = catalog.stats;
    tracing::info!(
        "曲目表格已加载: 来源={}, 行数={}, 谱面数={}, 跳过={}, 未知分类={}, 耗时={}ms",
        source.describe(),
        s.rows,
        catalog.len(),
        s.skipped,
        s.unknown_category,
        t0.elapsed().as_millis()
    );
    Ok(catalog)
}

/// 启动定时刷新任务
///
/// 刷新失败时保留旧快照；收到退出信号后任务结束。
pub fn spawn_refresh_task(
    store: CatalogStore,
    source: CatalogSource,
    period: Duration,
    shutdown: ShutdownManager,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.wait_for_shutdown() => {
                    tracing::info!("曲目刷新任务已停止");
                    break;
                }
                _ = ticker.tick() => {
                    refresh_once(&store, &source).await;
                }
            }
        }
    })
}

/// 执行一次刷新，返回是否替换了快照
pub async fn refresh_once(store: &CatalogStore, source: &CatalogSource) -> bool {
    match fetch_catalog(source).await {
        Ok(catalog) if !catalog.is_empty() => {
            let old = store.replace(catalog);
            tracing::info!(
                "曲目目录已刷新（旧快照 {} 张谱面）",
                old.as_deref().map(ChartCatalog::len).unwrap_or(0)
            );
            true
        }
        Ok(_) => {
            tracing::warn!("刷新得到空目录，保留旧快照");
            false
        }
        Err(e) => {
            tracing::warn!("曲目刷新失败，保留旧快照: {}", e);
            false
        }
    }
}

/// 首次加载（失败或为空则返回错误，由调用方决定是否退出）
pub async fn load_initial(source: &CatalogSource) -> Result<ChartCatalog, AppError> {
    let catalog = fetch_catalog(source).await?;
    if catalog.is_empty() {
        return Err(AppError::CatalogUnavailable(format!(
            "曲目表格中没有有效谱面: {}",
            source.describe()
        )));
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Song (EN),Song (JP),Constant,Level,Notes,Difficulty,ID\n";

    #[test]
    fn parses_rows_by_position_and_skips_header() {
        let csv = format!(
            "{HEADER}Tell Your World,Tell Your World,31.5,APD 31,1234,Append,1\n\
             \"Hello, World\",ハロー,28.2,MAS 28,900,Master,7\n"
        );
        let catalog = parse_catalog_csv(csv.as_bytes()).expect("parse");
        assert_eq!(catalog.len(), 2);

        let c = catalog.get("1append").expect("1append");
        assert_eq!(c.song_name_en, "Tell Your World");
        assert_eq!(c.diff_constant, 31.5);
        assert_eq!(c.note_count, Some(1234));
        assert_eq!(c.difficulty, DifficultyCategory::Append);

        let c = catalog.get("7master").expect("7master");
        assert_eq!(c.song_name_en, "Hello, World");
        assert_eq!(catalog.stats.rows, 2);
        assert_eq!(catalog.stats.skipped, 0);
    }

    #[test]
    fn malformed_rows_are_skipped_without_aborting() {
        let csv = format!(
            "{HEADER}A,A,not-a-number,EXP 20,100,Expert,1\n\
             B,B,25.0,EXP 25,100,Expert,\n\
             C,C,26.0,EXP 26,n/a,Expert,3\n\
             short,row\n"
        );
        let catalog = parse_catalog_csv(csv.as_bytes()).expect("parse");
        assert_eq!(catalog.len(), 1);
        let c = catalog.get("3expert").expect("3expert");
        assert_eq!(c.note_count, None);
        assert_eq!(catalog.stats.rows, 4);
        assert_eq!(catalog.stats.skipped, 3);
    }

    #[test]
    fn non_utf8_row_is_skipped_and_neighbours_survive() {
        let mut bytes = HEADER.as_bytes().to_vec();
        bytes.extend_from_slice(b"Good,Good,30.0,MAS 30,1,Master,1\n");
        bytes.extend_from_slice(b"Bad\xff,Bad,29.0,MAS 29,1,Master,2\n");
        bytes.extend_from_slice(b"Good2,Good2,31.0,APD 31,1,Append,3\n");

        let catalog = parse_catalog_csv(bytes.as_slice()).expect("parse");
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("1master").is_some());
        assert!(catalog.get("3append").is_some());
        assert!(catalog.get("2master").is_none());
        assert_eq!(catalog.stats.rows, 3);
        assert_eq!(catalog.stats.skipped, 1);
    }

    #[test]
    fn unknown_category_falls_back_to_expert() {
        let csv = format!("{HEADER}X,X,20.0,HARD 20,500,Hard,9\n");
        let catalog = parse_catalog_csv(csv.as_bytes()).expect("parse");
        let c = catalog.get("9expert").expect("9expert");
        assert_eq!(c.difficulty, DifficultyCategory::Expert);
        assert_eq!(catalog.stats.unknown_category, 1);
    }

    fn temp_csv(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sekai-best30-loader-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("charts.csv");
        std::fs::write(&path, body).expect("write csv");
        path
    }

    #[tokio::test]
    async fn refresh_keeps_old_snapshot_on_failure() {
        let path = temp_csv("refresh", &format!("{HEADER}A,A,30.0,MAS 30,1,Master,1\n"));
        let source = CatalogSource::File { path: path.clone() };

        let store = CatalogStore::with_catalog(load_initial(&source).await.expect("initial load"));

        std::fs::remove_file(&path).expect("remove csv");
        assert!(!refresh_once(&store, &source).await);
        assert!(store.snapshot().expect("snapshot").get("1master").is_some());

        std::fs::write(
            &path,
            format!("{HEADER}A,A,30.0,MAS 30,1,Master,1\nB,B,31.0,APD 31,1,Append,2\n"),
        )
        .expect("rewrite csv");
        assert!(refresh_once(&store, &source).await);
        assert_eq!(store.snapshot().expect("snapshot").len(), 2);
    }

    #[tokio::test]
    async fn initial_load_fails_fast_on_empty_table() {
        let path = temp_csv("empty", HEADER);
        let source = CatalogSource::File { path };
        assert!(matches!(
            load_initial(&source).await,
            Err(AppError::CatalogUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn refresh_task_stops_on_shutdown() {
        let path = temp_csv("task", &format!("{HEADER}A,A,30.0,MAS 30,1,Master,1\n"));
        let shutdown = ShutdownManager::new();
        let handle = spawn_refresh_task(
            CatalogStore::new(),
            CatalogSource::File { path },
            Duration::from_secs(3600),
            shutdown.clone(),
        );
        shutdown.trigger_shutdown(crate::shutdown::ShutdownReason::Application);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("task should stop")
            .expect("join");
    }
}
