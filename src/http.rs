use once_cell::sync::OnceCell;
use reqwest::Client;
use std::time::Duration;

/// 全局复用的 HTTP Client（统一连接池/Keep-Alive），按用途拆分以使用不同的 timeout。
///
/// timeout 以首次初始化时传入的值为准（配置在进程内不变）。
static CLIENT_CATALOG: OnceCell<Client> = OnceCell::new();
static CLIENT_JACKET: OnceCell<Client> = OnceCell::new();

const USER_AGENT: &str = concat!("sekai-best30/", env!("CARGO_PKG_VERSION"));

fn build(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// 拉取曲目表格用的 Client（表格导出较慢，超时较长）
pub fn client_catalog(timeout: Duration) -> Result<&'static Client, reqwest::Error> {
    CLIENT_CATALOG.get_or_try_init(|| build(timeout))
}

/// 拉取曲绘/背景用的 Client
pub fn client_jacket(timeout: Duration) -> Result<&'static Client, reqwest::Error> {
    CLIENT_JACKET.get_or_try_init(|| build(timeout))
}
