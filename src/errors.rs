use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoError {
    InvalidInput(String),
    AccessDenied(String),
    Configuration(String),
    Upstream(String),
    Unavailable(String),
}

/// 错误响应体：`{"error": "..."}`
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

impl GeoError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            GeoError::InvalidInput(_) => "E001",
            GeoError::AccessDenied(_) => "E002",
            GeoError::Configuration(_) => "E003",
            GeoError::Upstream(_) => "E004",
            GeoError::Unavailable(_) => "E005",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            GeoError::InvalidInput(_) => "Invalid Input",
            GeoError::AccessDenied(_) => "Access Denied",
            GeoError::Configuration(_) => "Configuration Error",
            GeoError::Upstream(_) => "Upstream Error",
            GeoError::Unavailable(_) => "Service Unavailable",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            GeoError::InvalidInput(msg) => msg,
            GeoError::AccessDenied(msg) => msg,
            GeoError::Configuration(msg) => msg,
            GeoError::Upstream(msg) => msg,
            GeoError::Unavailable(msg) => msg,
        }
    }

    /// Client-caused errors are never worth an `error!` line.
    pub fn is_client_error(&self) -> bool {
        matches!(self, GeoError::InvalidInput(_) | GeoError::AccessDenied(_))
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for GeoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for GeoError {}

// 便捷的构造函数
impl GeoError {
    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        GeoError::InvalidInput(msg.into())
    }

    pub fn access_denied<T: Into<String>>(msg: T) -> Self {
        GeoError::AccessDenied(msg.into())
    }

    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        GeoError::Configuration(msg.into())
    }

    pub fn upstream<T: Into<String>>(msg: T) -> Self {
        GeoError::Upstream(msg.into())
    }

    pub fn unavailable<T: Into<String>>(msg: T) -> Self {
        GeoError::Unavailable(msg.into())
    }
}

impl ResponseError for GeoError {
    fn status_code(&self) -> StatusCode {
        match self {
            GeoError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GeoError::AccessDenied(_) => StatusCode::FORBIDDEN,
            GeoError::Configuration(_) | GeoError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GeoError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    // 响应体只带 message，不带错误类型前缀
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.message(),
        })
    }
}

// 为常见的错误类型实现 From trait
impl From<ureq::Error> for GeoError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => {
                GeoError::Upstream(format!("HTTP error! status: {}", status))
            }
            other => GeoError::Upstream(other.to_string()),
        }
    }
}

impl From<maxminddb::MaxMindDbError> for GeoError {
    fn from(err: maxminddb::MaxMindDbError) -> Self {
        GeoError::Upstream(err.to_string())
    }
}

impl From<tokio::task::JoinError> for GeoError {
    fn from(err: tokio::task::JoinError) -> Self {
        GeoError::Upstream(format!("upstream task failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;
