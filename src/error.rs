use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用统一错误类型
///
/// 仅用于“整张图失败”的致命错误；单张曲绘失败见 [`JacketError`]，不会上抛到调用方。
#[derive(Error, Debug, utoipa::ToSchema)]
pub enum AppError {
    /// 曲目目录尚未加载或为空
    #[error("曲目数据不可用: {0}")]
    CatalogUnavailable(String),

    /// 曲目数据源拉取/解析失败
    #[error("曲目数据源错误: {0}")]
    CatalogSource(String),

    /// 图像渲染错误
    #[error("图像渲染错误: {0}")]
    ImageRendererError(String),

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 单张曲绘加载错误（仅记录日志，对应卡片留空）
#[derive(Error, Debug)]
pub enum JacketError {
    /// 曲绘不存在
    #[error("曲绘不存在: {0}")]
    NotFound(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(String),

    /// 网络请求错误
    #[error("网络错误: {0}")]
    Network(String),

    /// 超时
    #[error("超时")]
    Timeout,

    /// 图片无法解码/编码
    #[error("无效的图片: {0}")]
    InvalidImage(String),
}

/// 错误响应体：`{ error, stack }`
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// 人类可读的错误描述
    #[schema(example = "曲目数据不可用: 目录尚未加载")]
    pub error: String,
    /// 错误链（调试信息）
    pub stack: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::CatalogUnavailable(_)
            | AppError::CatalogSource(_)
            | AppError::ImageRendererError(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn stack(&self) -> String {
        let mut lines = vec![format!("{self:?}")];
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            lines.push(format!("caused by: {err}"));
            source = err.source();
        }
        lines.join("\n")
    }

    /// 构造错误响应体
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            stack: self.stack(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("请求失败: {}", self);
        let status = self.status_code();
        let mut res = Json(self.to_body()).into_response();
        *res.status_mut() = status;
        res
    }
}

// =============== Error conversions for common external errors ===============

impl From<reqwest::Error> for JacketError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            JacketError::Timeout
        } else {
            JacketError::Network(err.to_string())
        }
    }
}

impl From<std::io::Error> for JacketError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            JacketError::NotFound(err.to_string())
        } else {
            JacketError::Io(err.to_string())
        }
    }
}

impl From<image::ImageError> for JacketError {
    fn from(err: image::ImageError) -> Self {
        JacketError::InvalidImage(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::CatalogSource(format!("CSV 解析失败: {err}"))
    }
}
