//! 优雅退出
//!
//! 信号（SIGINT/SIGTERM，Windows 下 Ctrl+C）或应用自身触发退出，
//! HTTP 服务与后台刷新任务共同等待同一个退出通知。

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// 退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C / SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
    /// 应用请求退出
    Application,
}

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("信号设置失败: {0}")]
    SignalSetup(String),
}

/// 退出协调器，可随意克隆
#[derive(Debug, Clone)]
pub struct ShutdownManager {
    tx: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// 触发退出；只有第一次生效
    pub fn trigger_shutdown(&self, reason: ShutdownReason) {
        let first = self.tx.send_if_modified(|cur| {
            if cur.is_some() {
                return false;
            }
            *cur = Some(reason);
            true
        });
        if first {
            info!("触发优雅退出: {:?}", reason);
        } else {
            debug!("重复的退出信号被忽略");
        }
    }

    /// 等待退出；已触发时立即返回
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).unwrap_or(ShutdownReason::Application),
            // 发送端与 self 同生命周期，不会提前关闭
            Err(_) => ShutdownReason::Application,
        }
    }

    /// 启动信号监听任务
    pub fn start_signal_handler(&self) -> Result<(), ShutdownError> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigint = signal(SignalKind::interrupt())
                .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;
            let mut sigterm = signal(SignalKind::terminate())
                .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;

            let manager = self.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = sigint.recv() => manager.trigger_shutdown(ShutdownReason::Interrupt),
                    _ = sigterm.recv() => manager.trigger_shutdown(ShutdownReason::Terminate),
                }
            });
        }

        #[cfg(windows)]
        {
            let manager = self.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => manager.trigger_shutdown(ShutdownReason::Interrupt),
                    Err(e) => tracing::error!("监听 Ctrl+C 失败: {}", e),
                }
            });
        }

        info!("信号处理器已启动");
        Ok(())
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
