use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    routing::get,
};
use tower::ServiceExt;

use sekai_best30::{
    config::AppConfig,
    features::{
        catalog::{CatalogStore, create_catalog_router},
        health::health_check,
        image::create_image_router,
        ranking::create_ranking_router,
    },
    startup::catalog_loader::parse_catalog_csv,
    state::AppState,
};

const CATALOG_CSV: &str = "\
Song (EN),Song (JP),Constant,Level,Notes,Difficulty,ID
Tell Your World,Tell Your World,15.0,APD 15,900,Append,1
Tell Your World,Tell Your World,28.0,MAS 28,800,Master,1
\"Hello, Worker\",ハローワーカー,24.5,EXP 24,700,Expert,12
";

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    // 指向不存在的目录：曲绘与背景都走回退路径
    config.resources.base_path = std::env::temp_dir()
        .join(format!("sekai-best30-it-{}", std::process::id()))
        .to_string_lossy()
        .into_owned();
    config.image.max_parallel = 1;
    config
}

fn loaded_store() -> CatalogStore {
    CatalogStore::with_catalog(parse_catalog_csv(CATALOG_CSV.as_bytes()).expect("parse csv"))
}

fn build_app(store: CatalogStore) -> Router {
    let state = AppState::from_config(&test_config(), store);
    Router::<AppState>::new()
        .route("/health", get(health_check))
        .merge(create_catalog_router())
        .merge(create_ranking_router())
        .merge(create_image_router())
        .with_state(state)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .expect("request");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).expect("parse json"))
}

#[tokio::test]
async fn song_data_dumps_catalog_with_camel_case_fields() {
    let (status, v) = get_json(build_app(loaded_store()), "/songData").await;
    assert_eq!(status, StatusCode::OK);

    let obj = v.as_object().expect("object");
    assert_eq!(obj.len(), 3);
    let chart = &v["12expert"];
    assert_eq!(chart["songNameEn"], "Hello, Worker");
    assert_eq!(chart["songNameJp"], "ハローワーカー");
    assert_eq!(chart["diffConstant"], 24.5);
    assert_eq!(chart["noteCount"], 700);
    assert_eq!(chart["difficulty"], "Expert");
    assert_eq!(chart["songId"], "12");
    assert_eq!(chart["uid"], "12expert");
    assert!(chart.get("song_name_en").is_none());
}

#[tokio::test]
async fn ranking_applies_penalty_and_divides_by_thirty() {
    let (status, v) = get_json(
        build_app(loaded_store()),
        "/ranking?1append=fc&1master=ap&12expert=ap&99master=ap&1append=bogus",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let entries = v["entries"].as_array().expect("entries");
    let uids: Vec<_> = entries.iter().map(|e| e["uid"].as_str().unwrap()).collect();
    assert_eq!(uids, vec!["1master", "12expert", "1append"]);
    assert_eq!(entries[2]["effectiveDifficulty"], 14.0);
    assert_eq!(entries[2]["clearKind"], "fc");
    assert_eq!(entries[0]["rank"], 0);

    let score = v["score"].as_f64().expect("score");
    assert!((score - (28.0 + 24.5 + 14.0) / 30.0).abs() < 1e-9);
    assert_eq!(v["formattedScore"], "2.22");
}

#[tokio::test]
async fn empty_query_yields_empty_ranking() {
    let (status, v) = get_json(build_app(loaded_store()), "/ranking").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["entries"].as_array().map(Vec::len), Some(0));
    assert_eq!(v["score"], 0.0);
    assert_eq!(v["formattedScore"], "0.00");
}

#[tokio::test]
async fn unloaded_catalog_returns_error_body() {
    for uri in ["/img?1append=ap", "/ranking?1append=ap", "/songData"] {
        let (status, v) = get_json(build_app(CatalogStore::new()), uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        assert!(v["error"].as_str().unwrap_or_default().contains("曲目数据不可用"));
        assert!(v["stack"].is_string());
    }
}

#[tokio::test]
async fn image_endpoint_returns_png() {
    let app = build_app(loaded_store());
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/img?1append=ap&12expert=fc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

async fn get_png(app: Router, uri: &str) -> axum::body::Bytes {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::OK);
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body")
}

#[tokio::test]
async fn image_rendered_with_missing_assets_is_not_cached() {
    let base = std::env::temp_dir().join(format!("sekai-best30-it-cache-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&base);
    std::fs::create_dir_all(&base).expect("create base dir");

    let mut config = test_config();
    config.resources.base_path = base.to_string_lossy().into_owned();
    let app = Router::<AppState>::new()
        .merge(create_image_router())
        .with_state(AppState::from_config(&config, loaded_store()));

    let degraded = get_png(app.clone(), "/img?1append=ap").await;

    // 资源补齐后同一请求应重新渲染，而不是命中缓存里的回退图
    let background = config.background_path();
    std::fs::create_dir_all(background.parent().expect("background dir")).expect("mkdir");
    image::RgbImage::from_pixel(40, 60, image::Rgb([20, 160, 90]))
        .save(&background)
        .expect("write background");
    let jackets = config.jacket_path();
    std::fs::create_dir_all(&jackets).expect("mkdir jackets");
    image::RgbImage::from_pixel(32, 32, image::Rgb([200, 40, 120]))
        .save(jackets.join("jacket_s_001.png"))
        .expect("write jacket");

    let complete = get_png(app, "/img?1append=ap").await;
    assert_eq!(&complete[..8], b"\x89PNG\r\n\x1a\n");
    assert_ne!(degraded, complete);

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn health_reports_catalog_state() {
    let (status, v) = get_json(build_app(loaded_store()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "healthy");
    assert_eq!(v["service"], "sekai-best30");
    assert_eq!(v["chartCount"], 3);
    assert!(v["catalogLoadedAt"].is_string());

    let (status, v) = get_json(build_app(CatalogStore::new()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "degraded");
    assert_eq!(v["chartCount"], 0);
}
