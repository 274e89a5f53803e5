/// 曲目表格加载与定时刷新
pub mod catalog_loader;
/// 启动检查工具模块
pub mod checks;

pub use checks::run_startup_checks;
